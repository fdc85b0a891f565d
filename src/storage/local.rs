//! Local filesystem storage implementation.
//!
//! Keeps every seen notice in a single JSON array. Records are matched by
//! field name, so hand-edited files with reordered or extra fields load fine.
//!
//! ```text
//! storage/
//! └── notices.json      # [{"Date": "2025-10-17", "Issue": ..., "Title": ...}, ...]
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{GazetteNotice, NoticeBatch};
use crate::storage::{NoticeStore, StoreSummary};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
}

impl LocalStorage {
    /// Create a LocalStorage backed by the JSON file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Read bytes, returning None if the file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Load all stored notices; a missing file is an empty store.
    pub async fn load_all(&self) -> Result<Vec<GazetteNotice>> {
        match self.read_bytes().await? {
            Some(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AppError::store(format!("{} is not a notice list: {e}", self.path.display()))
            }),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl NoticeStore for LocalStorage {
    async fn contains_date(&self, date: NaiveDate) -> Result<bool> {
        Ok(self
            .load_all()
            .await?
            .iter()
            .any(|n| n.publication_date == date))
    }

    async fn known_links(&self, date: NaiveDate) -> Result<HashSet<String>> {
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .filter(|n| n.publication_date == date)
            .map(|n| n.download_link)
            .collect())
    }

    async fn append(&self, batch: &NoticeBatch) -> Result<usize> {
        let mut notices = self.load_all().await?;
        notices.extend(batch.notices().iter().cloned());

        let bytes = serde_json::to_vec_pretty(&notices)?;
        self.write_bytes(&bytes).await?;

        log::info!(
            "Appended {} notice(s) to {}",
            batch.len(),
            self.path.display()
        );
        Ok(batch.len())
    }

    async fn summary(&self) -> Result<StoreSummary> {
        let notices = self.load_all().await?;
        Ok(StoreSummary {
            location: self.path.display().to_string(),
            row_count: notices.len(),
            latest_date: notices.iter().map(|n| n.publication_date).max(),
        })
    }
}
