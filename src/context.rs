/// Application context and dependency injection
use crate::{
    config::ServerConfig,
    db,
    downloads::DownloadManager,
    error::GateResult,
    license::LicenseManager,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub licenses: Arc<LicenseManager>,
    pub downloads: Arc<DownloadManager>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> GateResult<Self> {
        config.validate()?;

        let pool = db::create_pool(
            &config.storage.database,
            db::DatabaseOptions {
                max_connections: config.storage.max_connections,
                ..Default::default()
            },
        )
        .await?;

        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        Ok(Self::with_pool(config, pool))
    }

    /// Build the context around an already migrated pool
    pub fn with_pool(config: ServerConfig, pool: SqlitePool) -> Self {
        Self {
            config: Arc::new(config),
            licenses: Arc::new(LicenseManager::new(pool.clone())),
            downloads: Arc::new(DownloadManager::new(pool.clone())),
            db: pool,
        }
    }
}
