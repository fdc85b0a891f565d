// src/services/listing.rs

//! Listing reader.
//!
//! Walks the gazette index in two hops: the root listing links to a year
//! archive, and the year archive is a table whose `td.cell-date` and
//! `td.cell-title` cells describe one notice per row. Only rows published on
//! the most recent date (the first date cell on the page) are returned.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ListingPage, ListingRow, SiteConfig};
use crate::utils::http::fetch_text;
use crate::utils::{normalize_whitespace, resolve_url};

const DATE_CELL: &str = "td.cell-date";
const TITLE_CELL: &str = "td.cell-title";

/// Source of the latest listing rows.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Read the rows of the most recent publication date.
    ///
    /// `Ok(None)` means the site did not expose a year archive or a date
    /// cell; unreachable pages and unparseable dates are errors.
    async fn fetch_latest_notices(&self) -> Result<Option<ListingPage>>;
}

/// Reads the gazette listing over HTTP.
pub struct ListingReader {
    client: Client,
    site: SiteConfig,
    base_url: Url,
}

impl ListingReader {
    pub fn new(client: Client, site: SiteConfig) -> Result<Self> {
        let base_url = Url::parse(&site.base_url)?;
        Ok(Self {
            client,
            site,
            base_url,
        })
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        fetch_text(&self.client, url)
            .await
            .map_err(|e| AppError::discovery(format!("{url} unreachable: {e}")))
    }
}

#[async_trait]
impl ListingSource for ListingReader {
    async fn fetch_latest_notices(&self) -> Result<Option<ListingPage>> {
        log::info!("Fetching gazette index {}", self.base_url);
        let root = self.fetch(self.base_url.as_str()).await?;
        let year_url = locate_year_archive(
            &Html::parse_document(&root),
            &self.base_url,
            &self.site.year_prefix,
        );

        let Some(year_url) = year_url else {
            log::warn!("No year archive found on {}", self.base_url);
            return Ok(None);
        };

        log::info!("Fetching year archive {}", year_url);
        let year_page = self.fetch(&year_url).await?;
        let page_base = Url::parse(&year_url)?;
        parse_year_page(&Html::parse_document(&year_page), &page_base, &self.site)
    }
}

/// Find the URL of the current year's archive on the root listing.
///
/// Prefers a link whose text is a bare year (e.g. `<a href="/gazettes/2025">2025</a>`).
/// If the page has no such link, falls back to the first text node that
/// starts with `prefix` and forms a single token, appended to `base`.
/// The fallback assumes the first year-looking text on the page is the
/// current year; it is logged whenever it is used.
pub fn locate_year_archive(document: &Html, base: &Url, prefix: &str) -> Option<String> {
    let anchors = Selector::parse("a[href]").ok()?;
    let linked = document.select(&anchors).find_map(|a| {
        let text = a.text().collect::<String>();
        let href = a.value().attr("href")?;
        is_year_label(text.trim(), prefix).then(|| resolve_url(base, href))
    });
    if linked.is_some() {
        return linked;
    }

    let token = document
        .root_element()
        .text()
        .filter(|t| t.starts_with(prefix))
        .map(str::trim)
        .find(|t| !t.is_empty() && !t.contains(char::is_whitespace))?;

    log::debug!("Year archive located by text fallback: '{}'", token);
    Some(resolve_url(base, token))
}

fn is_year_label(text: &str, prefix: &str) -> bool {
    text.len() == 4 && text.starts_with(prefix) && text.chars().all(|c| c.is_ascii_digit())
}

/// Extract the latest date and its rows from a year archive page.
pub fn parse_year_page(
    document: &Html,
    base: &Url,
    site: &SiteConfig,
) -> Result<Option<ListingPage>> {
    let date_sel = parse_selector(DATE_CELL)?;
    let title_sel = parse_selector(TITLE_CELL)?;
    let row_sel = parse_selector("tr")?;
    let cell_sel = parse_selector("td")?;
    let link_sel = parse_selector("a[href]")?;

    let Some(latest) = document
        .select(&date_sel)
        .map(cell_text)
        .find(|t| !t.is_empty())
    else {
        log::warn!("Year archive has no {} cell", DATE_CELL);
        return Ok(None);
    };

    let publication_date = NaiveDate::parse_from_str(&latest, &site.date_format)
        .map_err(|e| AppError::date(latest.as_str(), e))?;

    let mut rows = Vec::new();
    for row in document.select(&row_sel) {
        let Some(date_cell) = row.select(&date_sel).next() else {
            continue;
        };
        if cell_text(date_cell) != latest {
            continue;
        }
        let Some(title_cell) = row.select(&title_sel).next() else {
            continue;
        };
        let Some(anchor) = title_cell.select(&link_sel).next() else {
            log::warn!("Row dated {} has a title cell without a link, skipping", latest);
            continue;
        };

        let href = anchor.value().attr("href").unwrap_or_default();
        let page_link = resolve_url(base, href);
        let issue_category = row
            .select(&cell_sel)
            .nth(1)
            .map(cell_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| site.default_issue.clone());

        rows.push(ListingRow {
            issue_category,
            title: normalize_whitespace(&anchor.text().collect::<String>()),
            download_link: format!("{}{}", page_link, site.download_suffix),
            page_link,
        });
    }

    log::info!("Found {} notice(s) dated {}", rows.len(), latest);
    Ok(Some(ListingPage {
        publication_date,
        rows,
    }))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
