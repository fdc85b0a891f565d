// src/models/mod.rs

//! Domain models for the gazette crawler.

mod config;
mod notice;

// Re-export all public types
pub use config::{
    Config, CrawlerConfig, DATABASE_URL_ENV, DedupMode, MailConfig, SMTP_PASSWORD_ENV,
    SiteConfig, StorageBackend, StorageConfig,
};
pub use notice::{
    Classification, GazetteNotice, ListingPage, ListingRow, MarkerMatch, NoticeBatch,
};
