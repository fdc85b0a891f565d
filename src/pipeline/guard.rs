// src/pipeline/guard.rs

//! Duplicate guard.

use crate::error::Result;
use crate::models::{DedupMode, NoticeBatch};
use crate::storage::NoticeStore;

/// Decides whether a batch was already processed.
pub struct DuplicateGuard<'a> {
    store: &'a dyn NoticeStore,
    mode: DedupMode,
}

impl<'a> DuplicateGuard<'a> {
    pub fn new(store: &'a dyn NoticeStore, mode: DedupMode) -> Self {
        Self { store, mode }
    }

    /// Whether any stored notice shares this batch's publication date.
    pub async fn is_known(&self, batch: &NoticeBatch) -> Result<bool> {
        self.store.contains_date(batch.publication_date()).await
    }

    /// Reduce the batch to what has not been processed yet.
    ///
    /// In `Date` mode a batch whose date is stored is dropped entirely, even
    /// if it holds notices the store has never seen. In `Notice` mode only
    /// notices whose download link is already stored for that date are
    /// removed. Returns `None` when nothing new remains.
    pub async fn filter_new(&self, mut batch: NoticeBatch) -> Result<Option<NoticeBatch>> {
        match self.mode {
            DedupMode::Date => {
                if self.is_known(&batch).await? {
                    return Ok(None);
                }
            }
            DedupMode::Notice => {
                let known = self.store.known_links(batch.publication_date()).await?;
                let before = batch.len();
                batch.retain(|n| !known.contains(&n.download_link));
                if batch.len() < before {
                    log::info!(
                        "{} of {} notice(s) dated {} already stored",
                        before - batch.len(),
                        before,
                        batch.publication_date()
                    );
                }
            }
        }

        Ok((!batch.is_empty()).then_some(batch))
    }
}
