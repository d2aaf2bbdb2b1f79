//! In-memory identity store.
//!
//! Maps a credential digest to a resolved identity with an absolute expiry.
//! One instance is created at startup and shared by every request through an
//! `Arc`; all synchronization is internal.
//!
//! # Expiry
//!
//! An entry is never returned once `now >= expires_at`. Expired entries are
//! removed lazily on lookup and in bulk by [`IdentityStore::purge_expired`],
//! which the identity sweeper task calls periodically.
//!
//! # Consistency
//!
//! Entries are replaced whole under the write lock and values are immutable
//! `Arc<ResolvedIdentity>` snapshots, so concurrent readers see either the old
//! or the new entry, never a mixture. Writes are last-writer-wins.

use crate::auth::identity::ResolvedIdentity;
use crate::observability::metrics;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::instrument;

/// Default identity TTL (2 hours).
pub const DEFAULT_IDENTITY_TTL: Duration = Duration::from_secs(2 * 60 * 60);

struct CacheEntry {
    identity: Arc<ResolvedIdentity>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Time-bounded store of resolved identities.
pub struct IdentityStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    /// Optional hard bound on the number of entries.
    max_entries: Option<usize>,
}

impl IdentityStore {
    /// Create an unbounded store applying `ttl` to every written entry.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: None,
        }
    }

    /// Create a store that holds at most `max_entries` entries.
    ///
    /// When full, inserting a new key first drops expired entries and then,
    /// if still full, evicts the entry closest to expiry.
    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(max_entries.min(1024))),
            ttl,
            max_entries: Some(max_entries.max(1)),
        }
    }

    /// The TTL applied to every write.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live identity.
    ///
    /// Returns `None` when the key is absent or its entry has expired. An
    /// expired entry is removed before returning.
    pub async fn get(&self, key: &str) -> Option<Arc<ResolvedIdentity>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return None,
                Some(entry) if entry.is_live(Instant::now()) => {
                    return Some(Arc::clone(&entry.identity));
                }
                Some(_) => {}
            }
        }

        // Expired. Re-check under the write lock: a concurrent set may have
        // refreshed the entry since the read lock was released.
        let mut entries = self.entries.write().await;
        let live = entries.get(key).map(|entry| entry.is_live(Instant::now()));
        match live {
            Some(true) => entries.get(key).map(|entry| Arc::clone(&entry.identity)),
            Some(false) => {
                entries.remove(key);
                metrics::record_identity_cache_eviction("expired", 1);
                metrics::set_identity_cache_entries(entries.len());
                tracing::debug!(target: "form.auth.store", "Dropped expired identity on lookup");
                None
            }
            None => None,
        }
    }

    /// Insert or overwrite the identity for `key`.
    ///
    /// The entry expires `ttl` after this call regardless of any previous
    /// entry for the same key.
    pub async fn set(&self, key: impl Into<String>, identity: Arc<ResolvedIdentity>) {
        let key = key.into();
        let expires_at = Instant::now() + self.ttl;

        let mut entries = self.entries.write().await;

        if let Some(max) = self.max_entries {
            if !entries.contains_key(&key) && entries.len() >= max {
                make_room(&mut entries, max);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                identity,
                expires_at,
            },
        );
        metrics::set_identity_cache_entries(entries.len());
    }

    /// Remove the entry for `key`. Absent keys are ignored.
    pub async fn invalidate(&self, key: &str) {
        let mut entries = self.entries.write().await;
        if entries.remove(key).is_some() {
            metrics::record_identity_cache_eviction("invalidated", 1);
            metrics::set_identity_cache_entries(entries.len());
            tracing::debug!(target: "form.auth.store", "Identity invalidated");
        }
    }

    /// Remove every expired entry and return how many were removed.
    #[instrument(skip_all, name = "form.auth.store.purge")]
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let removed = before - entries.len();

        if removed > 0 {
            metrics::record_identity_cache_eviction("expired", removed as u64);
            metrics::set_identity_cache_entries(entries.len());
        }
        removed
    }

    /// Number of entries physically held, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Drop expired entries, then the entry with the earliest expiry if still full.
fn make_room(entries: &mut HashMap<String, CacheEntry>, max: usize) {
    let now = Instant::now();
    let before = entries.len();
    entries.retain(|_, entry| entry.is_live(now));
    let expired = before - entries.len();
    if expired > 0 {
        metrics::record_identity_cache_eviction("expired", expired as u64);
    }

    if entries.len() < max {
        return;
    }

    let oldest = entries
        .iter()
        .min_by_key(|(_, entry)| entry.expires_at)
        .map(|(key, _)| key.clone());

    if let Some(key) = oldest {
        entries.remove(&key);
        metrics::record_identity_cache_eviction("capacity", 1);
        tracing::debug!(target: "form.auth.store", max_entries = max, "Evicted identity at capacity");
    }
}
