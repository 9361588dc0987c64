//! SQLite-backed persistence: pool management, row types and the
//! repository traits the services depend on.

pub mod database;
pub mod models;
pub mod repository;

pub use database::{DatabaseConfig, DatabasePool, PoolStats};
pub use repository::{
    CallLogRepository, CatalogRepository, QuotaRepository, SqliteCallLogRepository,
    SqliteCatalogRepository, SqliteQuotaRepository, SqliteSummaryCacheRepository,
    SqliteTagRepository, SummaryCacheRepository, TagRepository,
};
