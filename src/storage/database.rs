// Database connection and pool management

use serde::{Deserialize, Serialize};
use sqlx::{migrate::MigrateDatabase, Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::domain::{ClipOpsError, Result};

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL: "sqlite://path/to/db.db" or "sqlite::memory:"
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Run migrations on startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_run_migrations() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: default_max_connections(),
            connection_timeout_secs: default_connection_timeout(),
            run_migrations: default_run_migrations(),
        }
    }
}

impl DatabaseConfig {
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            url: format!("sqlite://{}", path.into()),
            ..Default::default()
        }
    }

    pub fn sqlite_memory() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(ClipOpsError::config("Database URL cannot be empty"));
        }
        if self.max_connections == 0 {
            return Err(ClipOpsError::config(
                "Max connections must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// SQLite connection pool manager
#[derive(Clone)]
pub struct DatabasePool {
    pool: Pool<Sqlite>,
}

impl DatabasePool {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        config.validate()?;

        info!("Creating SQLite connection pool: {}", config.url);

        if !config.url.contains(":memory:") && !Sqlite::database_exists(&config.url).await? {
            info!("Creating SQLite database: {}", config.url);
            Sqlite::create_database(&config.url).await?;
        }

        let options = sqlx::sqlite::SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(config.connection_timeout_secs))
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true);

        // Every pooled connection to ":memory:" would open its own
        // database, so in-memory URLs get a single shared connection.
        let max_connections = if config.url.contains(":memory:") {
            1
        } else {
            config.max_connections
        };

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let instance = Self { pool };

        if config.run_migrations {
            instance.run_migrations().await?;
        }

        info!("SQLite pool created successfully");
        Ok(instance)
    }

    /// In-memory pool with migrations applied. Used heavily by tests.
    pub async fn new_in_memory() -> Result<Self> {
        Self::new(&DatabaseConfig::sqlite_memory()).await
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running SQLite migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ClipOpsError::internal(format!("Migration failed: {}", e)))?;
        info!("Migrations completed successfully");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            connections: self.pool.size(),
            idle_connections: self.pool.num_idle() as u32,
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Pool statistics
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoolStats {
    pub connections: u32,
    pub idle_connections: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_validation() {
        let mut config = DatabaseConfig::default();
        assert!(config.validate().is_ok());

        config.url = String::new();
        assert!(config.validate().is_err());

        config = DatabaseConfig::default();
        config.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sqlite_config_creation() {
        let config = DatabaseConfig::sqlite("test.db");
        assert_eq!(config.url, "sqlite://test.db");

        let config = DatabaseConfig::sqlite_memory();
        assert_eq!(config.url, "sqlite::memory:");
    }

    #[tokio::test]
    async fn test_pool_creation_and_health() {
        let pool = DatabasePool::new_in_memory().await.unwrap();
        assert!(pool.health_check().await.is_ok());
        assert!(pool.stats().connections > 0);
    }

    #[tokio::test]
    async fn test_file_backed_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip-ops-test.db");
        let config = DatabaseConfig::sqlite(path.to_string_lossy());

        let pool = DatabasePool::new(&config).await.unwrap();
        assert!(pool.health_check().await.is_ok());
        pool.close().await;

        assert!(path.exists());
    }
}
