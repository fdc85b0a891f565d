//! Service layer for the gazette crawler.
//!
//! This module contains the collaborators of a run:
//! - Listing discovery (`ListingReader`)
//! - Document classification (`PdfClassifier`)
//! - Notification (`MailNotifier`)

mod classifier;
mod listing;
mod notifier;

pub use classifier::{
    DocumentClassifier, ENERGY_ACT_MARKER, EPRA_MARKER, MarkerScanner, PdfClassifier,
};
pub use listing::{ListingReader, ListingSource, locate_year_archive, parse_year_page};
pub use notifier::{MailNotifier, Notifier, render_report};
