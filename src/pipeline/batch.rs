// src/pipeline/batch.rs

//! Notice set builder.

use crate::models::{Classification, ListingPage, NoticeBatch};
use crate::services::DocumentClassifier;

/// Classify every listing row, in order, into a batch.
///
/// Documents are inspected one at a time. A document that cannot be fetched
/// or read turns into an `Error: ...` tag on its own row; the batch always
/// has one notice per listing row.
pub async fn build_batch(page: ListingPage, classifier: &dyn DocumentClassifier) -> NoticeBatch {
    let total = page.rows.len();
    let mut batch = NoticeBatch::new(page.publication_date);

    for (i, row) in page.rows.into_iter().enumerate() {
        let result = classifier.classify(&row.download_link).await;
        if let Err(error) = &result {
            log::warn!("Failed to classify {}: {}", row.download_link, error);
        }
        let classification = Classification::from(result);
        log::info!(
            "[{}/{}] {} -> '{}'",
            i + 1,
            total,
            row.title,
            classification
        );
        batch.push(row, classification);
    }

    batch
}
