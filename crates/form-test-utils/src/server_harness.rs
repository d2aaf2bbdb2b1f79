//! Test server harness for end-to-end tests.
//!
//! Provides `TestFormServer` for spawning real form service instances.

use form_service::auth::IdentityStore;
use form_service::config::Config;
use form_service::repositories::PgUserLookup;
use form_service::routes::{self, AppState};
use sqlx::PgPool;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Spawns the real router over an isolated database.
///
/// # Example
/// ```rust,ignore
/// #[sqlx::test(migrations = "../../migrations")]
/// async fn test_health(pool: PgPool) -> Result<()> {
///     let server = TestFormServer::spawn(pool).await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestFormServer {
    addr: SocketAddr,
    pool: PgPool,
    config: Config,
    identity_store: Arc<IdentityStore>,
    _handle: JoinHandle<()>,
}

impl TestFormServer {
    /// Spawn a server with default test configuration.
    pub async fn spawn(pool: PgPool) -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(pool, HashMap::new()).await
    }

    /// Spawn a server, overriding configuration variables.
    ///
    /// `overrides` are applied on top of the test defaults, e.g.
    /// `IDENTITY_CACHE_TTL_SECONDS`.
    pub async fn spawn_with_vars(
        pool: PgPool,
        overrides: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgresql://test/test".to_string(),
            ),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ]);
        vars.extend(overrides);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let identity_store = Arc::new(IdentityStore::new(config.identity_cache_ttl()));

        let state = Arc::new(AppState {
            pool: pool.clone(),
            config: config.clone(),
            identity_store: Arc::clone(&identity_store),
            user_lookup: Arc::new(PgUserLookup::new(pool.clone())),
        });

        // A handle without a globally installed recorder; /metrics renders empty
        let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle();

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            pool,
            config,
            identity_store,
            _handle: handle,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The identity store shared by the server's guards.
    pub fn identity_store(&self) -> &Arc<IdentityStore> {
        &self.identity_store
    }
}

impl Drop for TestFormServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
