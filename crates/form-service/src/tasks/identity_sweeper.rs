//! Identity store sweeper.
//!
//! Lookups already ignore expired entries; the sweeper only reclaims memory
//! held by credentials that are never presented again.
//!
//! # Graceful Shutdown
//!
//! The task exits when the cancellation token is cancelled. A sweep in
//! progress runs to completion first.

use crate::auth::IdentityStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Run the sweeper loop until `cancel_token` is cancelled.
///
/// # Arguments
///
/// * `store` - The shared identity store
/// * `interval` - Time between sweeps
/// * `cancel_token` - Token for graceful shutdown
pub async fn start_identity_sweeper(
    store: Arc<IdentityStore>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "form.task.identity_sweeper",
        interval_seconds = interval.as_secs(),
        "Starting identity sweeper"
    );

    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately and the store is empty at startup
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = store.purge_expired().await;
                if removed > 0 {
                    debug!(
                        target: "form.task.identity_sweeper",
                        removed,
                        "Purged expired identities"
                    );
                }
            }
            _ = cancel_token.cancelled() => {
                info!(
                    target: "form.task.identity_sweeper",
                    "Identity sweeper received shutdown signal, exiting"
                );
                break;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::ResolvedIdentity;
    use uuid::Uuid;

    fn identity(user_id: i32) -> Arc<ResolvedIdentity> {
        Arc::new(ResolvedIdentity {
            user_id,
            uuid: Uuid::new_v4(),
            email: format!("user{}@example.com", user_id),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_expired_entries() {
        let store = Arc::new(IdentityStore::new(Duration::from_secs(10)));
        store.set("a", identity(1)).await;
        store.set("b", identity(2)).await;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(start_identity_sweeper(
            Arc::clone(&store),
            Duration::from_secs(30),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(store.len().await, 0);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_keeps_live_entries() {
        let store = Arc::new(IdentityStore::new(Duration::from_secs(120)));
        store.set("a", identity(1)).await;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(start_identity_sweeper(
            Arc::clone(&store),
            Duration::from_secs(30),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(store.len().await, 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_exits_on_cancel() {
        let store = Arc::new(IdentityStore::new(Duration::from_secs(60)));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(start_identity_sweeper(
            store,
            Duration::from_secs(3600),
            cancel.clone(),
        ));

        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweeper should exit promptly")
            .unwrap();
    }
}
