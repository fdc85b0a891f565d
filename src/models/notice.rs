//! Gazette notice data structures.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Regulatory markers found on the first page of a notice's document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerMatch {
    /// "Energy and Petroleum Regulatory Authority" appears
    pub epra: bool,
    /// "The Energy Act" appears
    pub energy_act: bool,
}

/// Classification tag attached to a notice after document inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Classification {
    Both,
    Epra,
    EnergyAct,
    Neither,
    /// Document could not be fetched or read
    Error(String),
}

impl Classification {
    pub const BOTH: &'static str = "EPRA & The Energy Act";
    pub const EPRA: &'static str = "EPRA";
    pub const ENERGY_ACT: &'static str = "The Energy Act";
    const ERROR_PREFIX: &'static str = "Error: ";

    /// Tag shown in reports and stored in the `EPRA/Energy Act` column.
    pub fn label(&self) -> String {
        match self {
            Self::Both => Self::BOTH.to_string(),
            Self::Epra => Self::EPRA.to_string(),
            Self::EnergyAct => Self::ENERGY_ACT.to_string(),
            Self::Neither => String::new(),
            Self::Error(message) => format!("{}{}", Self::ERROR_PREFIX, message),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl From<MarkerMatch> for Classification {
    fn from(m: MarkerMatch) -> Self {
        match (m.epra, m.energy_act) {
            (true, true) => Self::Both,
            (true, false) => Self::Epra,
            (false, true) => Self::EnergyAct,
            (false, false) => Self::Neither,
        }
    }
}

impl<E: fmt::Display> From<Result<MarkerMatch, E>> for Classification {
    fn from(result: Result<MarkerMatch, E>) -> Self {
        match result {
            Ok(m) => m.into(),
            Err(e) => Self::Error(e.to_string()),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl From<Classification> for String {
    fn from(c: Classification) -> Self {
        c.label()
    }
}

impl TryFrom<String> for Classification {
    type Error = String;

    fn try_from(s: String) -> Result<Self, String> {
        match s.as_str() {
            Self::BOTH => Ok(Self::Both),
            Self::EPRA => Ok(Self::Epra),
            Self::ENERGY_ACT => Ok(Self::EnergyAct),
            "" => Ok(Self::Neither),
            other => other
                .strip_prefix(Self::ERROR_PREFIX)
                .map(|message| Classification::Error(message.to_string()))
                .ok_or_else(|| format!("unknown classification '{other}'")),
        }
    }
}

/// A listing row for the latest date, before its document is inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    pub issue_category: String,
    pub title: String,
    pub page_link: String,
    pub download_link: String,
}

/// Result of reading the listing: the latest date and its rows in page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    pub publication_date: NaiveDate,
    pub rows: Vec<ListingRow>,
}

/// One classified gazette notice.
///
/// Field names follow the store's column names so rows round-trip by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GazetteNotice {
    #[serde(rename = "Date")]
    pub publication_date: NaiveDate,

    #[serde(rename = "Issue")]
    pub issue_category: String,

    #[serde(rename = "Title")]
    pub title: String,

    #[serde(rename = "Page Link")]
    pub page_link: String,

    #[serde(rename = "Download Link")]
    pub download_link: String,

    #[serde(rename = "EPRA/Energy Act")]
    pub classification: Classification,
}

impl GazetteNotice {
    pub fn new(publication_date: NaiveDate, row: ListingRow, classification: Classification) -> Self {
        Self {
            publication_date,
            issue_category: row.issue_category,
            title: row.title,
            page_link: row.page_link,
            download_link: row.download_link,
            classification,
        }
    }
}

/// All notices of one run; every member shares `publication_date`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeBatch {
    publication_date: NaiveDate,
    notices: Vec<GazetteNotice>,
}

impl NoticeBatch {
    pub fn new(publication_date: NaiveDate) -> Self {
        Self {
            publication_date,
            notices: Vec::new(),
        }
    }

    /// Append a notice built from a listing row.
    pub fn push(&mut self, row: ListingRow, classification: Classification) {
        self.notices
            .push(GazetteNotice::new(self.publication_date, row, classification));
    }

    /// Keep only notices matching the predicate, preserving order.
    pub fn retain(&mut self, f: impl FnMut(&GazetteNotice) -> bool) {
        self.notices.retain(f);
    }

    pub fn publication_date(&self) -> NaiveDate {
        self.publication_date
    }

    pub fn notices(&self) -> &[GazetteNotice] {
        &self.notices
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.notices
            .iter()
            .filter(|n| n.classification.is_error())
            .count()
    }
}
