use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use super::error::StorageError;
use crate::config::DatabaseConfig;

/// Connection pool lifecycle for the application database
pub struct DatabaseManager;

impl DatabaseManager {
    /// Open the pool described by `config`
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, StorageError> {
        if config.url.is_empty() {
            return Err(StorageError::Misuse("DATABASE_URL is not set".to_string()));
        }

        let pool = Self::pool_options(config)
            .connect(&config.url)
            .await
            .map_err(|e| StorageError::from(e).with_path("DatabaseManager->connect()"))?;

        info!(max_connections = config.max_connections, "database pool ready");
        Ok(pool)
    }

    /// Same pool settings without dialling until first use
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<PgPool, StorageError> {
        Self::pool_options(config)
            .connect_lazy(&config.url)
            .map_err(|e| StorageError::from(e).with_path("DatabaseManager->connect_lazy()"))
    }

    fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(pool)
            .await
            .map_err(|e| StorageError::from(e).with_path("DatabaseManager->health_check()"))?;
        Ok(())
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(pool: &PgPool) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations").run(pool).await?;
        info!("migrations applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> DatabaseConfig {
        DatabaseConfig {
            url: url.to_string(),
            max_connections: 2,
            connection_timeout: 1,
            enable_query_logging: false,
            enable_slow_query_warning: false,
            slow_query_threshold_ms: 0,
            placeholder_budget: 100,
        }
    }

    #[tokio::test]
    async fn refuses_an_empty_url() {
        let err = DatabaseManager::connect(&config("")).await.unwrap_err();
        assert!(matches!(err, StorageError::Misuse(_)));
    }

    #[tokio::test]
    async fn lazy_pool_does_not_dial() {
        let pool = DatabaseManager::connect_lazy(&config("postgres://u:p@127.0.0.1:1/none")).unwrap();
        assert_eq!(pool.size(), 0);
    }
}
