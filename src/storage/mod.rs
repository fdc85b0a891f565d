//! Storage abstractions for previously seen notices.
//!
//! The store is append-only from the crawler's point of view: it answers
//! whether a publication date (or a notice under it) was already processed,
//! and records new notices once they have been announced.

pub mod local;
#[cfg(feature = "mysql")]
pub mod mysql;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{Config, NoticeBatch, StorageBackend};

// Re-export for convenience
pub use local::LocalStorage;
#[cfg(feature = "mysql")]
pub use mysql::MySqlStore;

/// Snapshot of what a store holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSummary {
    /// Human-readable location (file path or table name)
    pub location: String,
    pub row_count: usize,
    pub latest_date: Option<NaiveDate>,
}

/// Trait for notice storage backends.
#[async_trait]
pub trait NoticeStore: Send + Sync {
    /// Whether any stored notice has this publication date.
    async fn contains_date(&self, date: NaiveDate) -> Result<bool>;

    /// Download links of stored notices with this publication date.
    async fn known_links(&self, date: NaiveDate) -> Result<HashSet<String>>;

    /// Append every notice of the batch as a new row. Returns rows written.
    async fn append(&self, batch: &NoticeBatch) -> Result<usize>;

    /// Describe the store contents.
    async fn summary(&self) -> Result<StoreSummary>;
}

/// Open the store selected by the configuration.
pub async fn open(config: &Config) -> Result<Box<dyn NoticeStore>> {
    match config.storage.backend {
        StorageBackend::Local => Ok(Box::new(LocalStorage::new(&config.storage.path))),
        #[cfg(feature = "mysql")]
        StorageBackend::MySql => Ok(Box::new(MySqlStore::connect(&config.storage).await?)),
        #[cfg(not(feature = "mysql"))]
        StorageBackend::MySql => Err(crate::error::AppError::config(
            "storage.backend = \"mysql\" requires the `mysql` feature",
        )),
    }
}
