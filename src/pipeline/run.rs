// src/pipeline/run.rs

//! Single-pass discovery and reconciliation run.
//!
//! Listing → classify each row → duplicate guard → notify → persist.
//!
//! ## Delivery guarantee
//!
//! Notification happens before persistence and no transaction spans the
//! two. If the notification fails nothing is stored, so the next run retries
//! it. If persisting fails after a successful notification the error is
//! returned and the store is left without the batch: the next run sees the
//! date as new and notifies again. Notifications are therefore delivered
//! at least once per publication date.

use std::fmt;

use chrono::NaiveDate;

use super::batch::build_batch;
use super::guard::DuplicateGuard;
use crate::error::Result;
use crate::models::{Config, DedupMode, NoticeBatch};
use crate::services::{
    DocumentClassifier, ListingReader, ListingSource, MailNotifier, Notifier, PdfClassifier,
};
use crate::storage::{self, NoticeStore};
use crate::utils::http::create_async_client;

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The listing exposed no year archive or no dated rows.
    NotFound,
    /// The latest date had no qualifying rows.
    Empty { date: NaiveDate },
    /// The batch was already processed; nothing sent or stored.
    AlreadyKnown { date: NaiveDate },
    /// Notification sent and `count` notices stored.
    Published { date: NaiveDate, count: usize },
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no gazette listing found"),
            Self::Empty { date } => write!(f, "no notices listed for {date}"),
            Self::AlreadyKnown { date } => write!(f, "notices for {date} already processed"),
            Self::Published { date, count } => {
                write!(f, "published {count} notice(s) for {date}")
            }
        }
    }
}

/// Read the listing and classify its rows.
///
/// `Ok(None)` when the listing has nothing to offer.
pub async fn discover(
    listing: &dyn ListingSource,
    classifier: &dyn DocumentClassifier,
) -> Result<Option<NoticeBatch>> {
    let Some(page) = listing.fetch_latest_notices().await? else {
        return Ok(None);
    };
    Ok(Some(build_batch(page, classifier).await))
}

/// The collaborators of one run.
pub struct Pipeline<'a> {
    pub listing: &'a dyn ListingSource,
    pub classifier: &'a dyn DocumentClassifier,
    pub store: &'a dyn NoticeStore,
    pub notifier: &'a dyn Notifier,
    pub dedup: DedupMode,
}

impl Pipeline<'_> {
    /// Run discovery, reconciliation, notification and persistence once.
    pub async fn run(&self) -> Result<RunOutcome> {
        log::info!("Step 1/3: Discovering latest notices");
        let Some(batch) = discover(self.listing, self.classifier).await? else {
            log::warn!("Gazette listing had no dated notices");
            return Ok(RunOutcome::NotFound);
        };

        let date = batch.publication_date();
        if batch.is_empty() {
            log::warn!("No notices listed for {}", date);
            return Ok(RunOutcome::Empty { date });
        }
        if batch.error_count() > 0 {
            log::warn!(
                "{} of {} document(s) could not be classified",
                batch.error_count(),
                batch.len()
            );
        }

        log::info!("Step 2/3: Checking store for {}", date);
        let guard = DuplicateGuard::new(self.store, self.dedup);
        let Some(batch) = guard.filter_new(batch).await? else {
            log::info!("Notices for {} already processed, nothing to do", date);
            return Ok(RunOutcome::AlreadyKnown { date });
        };

        log::info!("Step 3/3: Notifying and storing {} notice(s)", batch.len());
        self.notifier.notify(&batch).await?;

        let count = self.store.append(&batch).await.inspect_err(|e| {
            log::error!(
                "Notified for {} but failed to store the batch: {}. The next run will notify again.",
                date,
                e
            );
        })?;

        Ok(RunOutcome::Published { date, count })
    }
}

/// Build every collaborator from the configuration and run once.
pub async fn run_pipeline(config: &Config) -> Result<RunOutcome> {
    config.validate()?;
    let notifier = MailNotifier::new(&config.mail)?;
    let client = create_async_client(&config.crawler)?;
    let listing = ListingReader::new(client.clone(), config.site.clone())?;
    let classifier = PdfClassifier::new(client, config.site.download_dir.clone())?;
    let store = storage::open(config).await?;

    Pipeline {
        listing: &listing,
        classifier: &classifier,
        store: store.as_ref(),
        notifier: &notifier,
        dedup: config.storage.dedup,
    }
    .run()
    .await
}

/// What a run would do, computed without notifying or storing.
#[derive(Debug, Clone)]
pub struct Preview {
    /// Every notice listed under the latest date.
    pub listed: NoticeBatch,
    /// The part a real run would publish; `None` when nothing is new.
    pub pending: Option<NoticeBatch>,
}

/// Discover and reconcile against the store, with no side effects.
///
/// Uses the same duplicate mode as a real run, so in `Notice` mode the
/// pending batch may be a subset of the listed one.
pub async fn dry_run(
    listing: &dyn ListingSource,
    classifier: &dyn DocumentClassifier,
    store: &dyn NoticeStore,
    dedup: DedupMode,
) -> Result<Option<Preview>> {
    let Some(listed) = discover(listing, classifier).await? else {
        return Ok(None);
    };
    let pending = DuplicateGuard::new(store, dedup)
        .filter_new(listed.clone())
        .await?;
    Ok(Some(Preview { listed, pending }))
}

/// Build the discovery collaborators from the configuration and preview once.
pub async fn preview(config: &Config) -> Result<Option<Preview>> {
    config.validate()?;
    let client = create_async_client(&config.crawler)?;
    let listing = ListingReader::new(client.clone(), config.site.clone())?;
    let classifier = PdfClassifier::new(client, config.site.download_dir.clone())?;
    let store = storage::open(config).await?;

    dry_run(&listing, &classifier, store.as_ref(), config.storage.dedup).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::error::AppError;
    use crate::models::{ListingPage, ListingRow, MarkerMatch};
    use crate::storage::{LocalStorage, StoreSummary};

    struct FixedListing(Option<ListingPage>);

    #[async_trait]
    impl ListingSource for FixedListing {
        async fn fetch_latest_notices(&self) -> Result<Option<ListingPage>> {
            Ok(self.0.clone())
        }
    }

    /// Every document mentions both markers unless its link says "broken".
    struct BothMarkers;

    #[async_trait]
    impl DocumentClassifier for BothMarkers {
        async fn classify(&self, download_link: &str) -> Result<MarkerMatch> {
            if download_link.contains("broken") {
                return Err(AppError::document(download_link, "connection reset"));
            }
            Ok(MarkerMatch {
                epra: true,
                energy_act: true,
            })
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<NoticeBatch>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn sent(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, batch: &NoticeBatch) -> Result<()> {
            if self.fail {
                return Err(AppError::mail("535 authentication failed"));
            }
            self.sent.lock().unwrap().push(batch.clone());
            Ok(())
        }
    }

    /// Reads through to a real store but refuses to append.
    struct ReadOnlyStore(LocalStorage);

    #[async_trait]
    impl NoticeStore for ReadOnlyStore {
        async fn contains_date(&self, date: NaiveDate) -> Result<bool> {
            self.0.contains_date(date).await
        }
        async fn known_links(&self, date: NaiveDate) -> Result<HashSet<String>> {
            self.0.known_links(date).await
        }
        async fn append(&self, _batch: &NoticeBatch) -> Result<usize> {
            Err(AppError::store("disk full"))
        }
        async fn summary(&self) -> Result<StoreSummary> {
            self.0.summary().await
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 17).unwrap()
    }

    fn listing(slugs: &[&str]) -> FixedListing {
        FixedListing(Some(ListingPage {
            publication_date: date(),
            rows: slugs
                .iter()
                .map(|slug| ListingRow {
                    issue_category: "Weekly Issue".to_string(),
                    title: slug.to_string(),
                    page_link: format!("https://new.kenyalaw.org/akn/{slug}"),
                    download_link: format!("https://new.kenyalaw.org/akn/{slug}/source"),
                })
                .collect(),
        }))
    }

    fn pipeline<'a>(
        listing: &'a FixedListing,
        store: &'a dyn NoticeStore,
        notifier: &'a RecordingNotifier,
    ) -> Pipeline<'a> {
        Pipeline {
            listing,
            classifier: &BothMarkers,
            store,
            notifier,
            dedup: DedupMode::Date,
        }
    }

    #[tokio::test]
    async fn test_new_date_is_notified_and_stored() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStorage::new(tmp.path().join("notices.json"));
        let notifier = RecordingNotifier::default();
        let listing = listing(&["199", "200"]);

        let outcome = pipeline(&listing, &store, &notifier).run().await.unwrap();

        assert_eq!(outcome, RunOutcome::Published { date: date(), count: 2 });
        assert_eq!(notifier.sent(), 1);

        let stored = store.load_all().await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|n| n.publication_date == date()));
        assert!(stored.iter().all(|n| n.classification.label() == "EPRA & The Energy Act"));
    }

    #[tokio::test]
    async fn test_known_date_skips_notify_and_persist() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStorage::new(tmp.path().join("notices.json"));
        let seed = listing(&["199"]);
        let seed_batch = discover(&seed, &BothMarkers).await.unwrap().unwrap();
        store.append(&seed_batch).await.unwrap();

        let notifier = RecordingNotifier::default();
        let listing = listing(&["199", "200"]);
        let outcome = pipeline(&listing, &store, &notifier).run().await.unwrap();

        assert_eq!(outcome, RunOutcome::AlreadyKnown { date: date() });
        assert_eq!(notifier.sent(), 0);
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStorage::new(tmp.path().join("notices.json"));
        let notifier = RecordingNotifier::default();
        let listing = listing(&["199", "200", "201"]);

        let first = pipeline(&listing, &store, &notifier).run().await.unwrap();
        let second = pipeline(&listing, &store, &notifier).run().await.unwrap();

        assert!(matches!(first, RunOutcome::Published { count: 3, .. }));
        assert_eq!(second, RunOutcome::AlreadyKnown { date: date() });
        assert_eq!(notifier.sent(), 1);
        assert_eq!(store.load_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_notification_is_not_persisted() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStorage::new(tmp.path().join("notices.json"));
        let notifier = RecordingNotifier::failing();
        let listing = listing(&["199"]);

        let result = pipeline(&listing, &store, &notifier).run().await;

        assert!(matches!(result, Err(AppError::Mail(_))));
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persist_failure_renotifies_on_retry() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notices.json");
        let notifier = RecordingNotifier::default();
        let listing = listing(&["199"]);

        let broken = ReadOnlyStore(LocalStorage::new(&path));
        let result = pipeline(&listing, &broken, &notifier).run().await;
        assert!(matches!(result, Err(AppError::Store(_))));
        assert_eq!(notifier.sent(), 1);

        // At-least-once: the retry notifies a second time, then stores.
        let store = LocalStorage::new(&path);
        let outcome = pipeline(&listing, &store, &notifier).run().await.unwrap();
        assert!(matches!(outcome, RunOutcome::Published { count: 1, .. }));
        assert_eq!(notifier.sent(), 2);
    }

    #[tokio::test]
    async fn test_broken_document_keeps_row() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStorage::new(tmp.path().join("notices.json"));
        let notifier = RecordingNotifier::default();
        let listing = listing(&["199", "broken", "201"]);

        pipeline(&listing, &store, &notifier).run().await.unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent[0].len(), 3);
        assert_eq!(sent[0].error_count(), 1);
        assert_eq!(
            sent[0].notices()[1].classification.label(),
            "Error: Document error for https://new.kenyalaw.org/akn/broken/source: connection reset"
        );
    }

    #[tokio::test]
    async fn test_missing_listing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStorage::new(tmp.path().join("notices.json"));
        let notifier = RecordingNotifier::default();
        let listing = FixedListing(None);

        let outcome = pipeline(&listing, &store, &notifier).run().await.unwrap();
        assert_eq!(outcome, RunOutcome::NotFound);
        assert_eq!(notifier.sent(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_is_not_notified() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStorage::new(tmp.path().join("notices.json"));
        let notifier = RecordingNotifier::default();
        let listing = listing(&[]);

        let outcome = pipeline(&listing, &store, &notifier).run().await.unwrap();
        assert_eq!(outcome, RunOutcome::Empty { date: date() });
        assert_eq!(notifier.sent(), 0);
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_reports_only_unseen_notices() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStorage::new(tmp.path().join("notices.json"));
        let notifier = RecordingNotifier::default();
        pipeline(&listing(&["199"]), &store, &notifier).run().await.unwrap();

        let listing = listing(&["199", "200"]);
        let by_notice = dry_run(&listing, &BothMarkers, &store, DedupMode::Notice)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_notice.listed.len(), 2);
        let pending = by_notice.pending.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.notices()[0].title, "200");

        let by_date = dry_run(&listing, &BothMarkers, &store, DedupMode::Date)
            .await
            .unwrap()
            .unwrap();
        assert!(by_date.pending.is_none());

        assert_eq!(store.load_all().await.unwrap().len(), 1);
        assert_eq!(notifier.sent(), 1);
    }
}
