// src/services/classifier.rs

//! Document classifier.
//!
//! Downloads a notice's source PDF into a scoped temporary file, extracts the
//! text of its first page and reports which regulatory markers it mentions.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use reqwest::Client;
use tempfile::NamedTempFile;

use crate::error::{AppError, Result};
use crate::models::MarkerMatch;

/// Phrase identifying the regulator.
pub const EPRA_MARKER: &str = "Energy and Petroleum Regulatory Authority";

/// Phrase identifying the statute.
pub const ENERGY_ACT_MARKER: &str = "The Energy Act";

/// Inspects a notice's source document.
#[async_trait]
pub trait DocumentClassifier: Send + Sync {
    /// Report which markers the document at `download_link` mentions.
    async fn classify(&self, download_link: &str) -> Result<MarkerMatch>;
}

/// Case-insensitive search for both markers.
///
/// Words of a marker may be separated by any run of whitespace, since PDF
/// text extraction breaks lines wherever the layout did.
#[derive(Debug, Clone)]
pub struct MarkerScanner {
    epra: Regex,
    energy_act: Regex,
}

impl MarkerScanner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            epra: marker_regex(EPRA_MARKER)?,
            energy_act: marker_regex(ENERGY_ACT_MARKER)?,
        })
    }

    pub fn scan(&self, text: &str) -> MarkerMatch {
        MarkerMatch {
            epra: self.epra.is_match(text),
            energy_act: self.energy_act.is_match(text),
        }
    }
}

fn marker_regex(phrase: &str) -> Result<Regex> {
    let pattern = phrase
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| AppError::config(format!("invalid marker '{phrase}': {e}")))
}

/// Classifies gazette PDFs fetched over HTTP.
pub struct PdfClassifier {
    client: Client,
    scanner: MarkerScanner,
    download_dir: Option<PathBuf>,
}

impl PdfClassifier {
    /// `download_dir` holds the scoped files; the system temp dir is used
    /// when it is `None`.
    pub fn new(client: Client, download_dir: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = &download_dir {
            std::fs::create_dir_all(dir)?;
        }
        Ok(Self {
            client,
            scanner: MarkerScanner::new()?,
            download_dir,
        })
    }

    /// Stream the document into a fresh temporary file.
    async fn download(&self, url: &str) -> Result<NamedTempFile> {
        let mut response = self.client.get(url).send().await?.error_for_status()?;
        let mut file = scoped_file(self.download_dir.as_deref())?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)?;
        }
        file.flush()?;
        Ok(file)
    }
}

#[async_trait]
impl DocumentClassifier for PdfClassifier {
    async fn classify(&self, download_link: &str) -> Result<MarkerMatch> {
        log::debug!("Downloading {}", download_link);
        // Deleted on drop, before the next document is fetched.
        let file = self.download(download_link).await?;
        let text = first_page_text(file.path(), download_link)?;
        Ok(self.scanner.scan(&text))
    }
}

/// Create a temporary file that is removed when dropped.
fn scoped_file(dir: Option<&Path>) -> Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("gazette-").suffix(".pdf");
    let file = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    Ok(file)
}

/// Extract the text of the first page of the PDF at `path`.
fn first_page_text(path: &Path, url: &str) -> Result<String> {
    let doc = lopdf::Document::load(path).map_err(|e| AppError::document(url, e))?;
    let first = doc
        .get_pages()
        .keys()
        .next()
        .copied()
        .ok_or_else(|| AppError::document(url, "document has no pages"))?;
    doc.extract_text(&[first])
        .map_err(|e| AppError::document(url, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};
    use tempfile::TempDir;

    fn write_pdf(path: &Path, pages: &[&str]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_scanner_is_case_insensitive() {
        let scanner = MarkerScanner::new().unwrap();
        let upper = scanner.scan("NOTICE BY THE ENERGY AND PETROLEUM REGULATORY AUTHORITY");
        let lower = scanner.scan("notice by the energy and petroleum regulatory authority");
        assert_eq!(upper, lower);
        assert!(upper.epra);
        assert!(!upper.energy_act);
    }

    #[test]
    fn test_scanner_finds_both_markers() {
        let scanner = MarkerScanner::new().unwrap();
        let found = scanner.scan(
            "IN EXERCISE of the powers conferred by section 11 of the Energy Act, \
             the Energy and Petroleum Regulatory Authority gives notice",
        );
        assert_eq!(
            found,
            MarkerMatch {
                epra: true,
                energy_act: true
            }
        );
    }

    #[test]
    fn test_scanner_tolerates_line_breaks() {
        let scanner = MarkerScanner::new().unwrap();
        assert!(scanner.scan("Energy and Petroleum\nRegulatory  Authority").epra);
        assert!(!scanner.scan("Energy Act").energy_act);
    }

    #[test]
    fn test_first_page_only() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notice.pdf");
        write_pdf(&path, &["GAZETTE NOTICE NO. 1234", "THE ENERGY ACT"]);

        let text = first_page_text(&path, "https://example.com/source").unwrap();
        let scanner = MarkerScanner::new().unwrap();
        assert!(text.contains("GAZETTE NOTICE"));
        assert_eq!(scanner.scan(&text), MarkerMatch::default());
    }

    #[test]
    fn test_first_page_markers() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notice.pdf");
        write_pdf(
            &path,
            &["The Energy Act and the Energy and Petroleum Regulatory Authority"],
        );

        let text = first_page_text(&path, "https://example.com/source").unwrap();
        let found = MarkerScanner::new().unwrap().scan(&text);
        assert!(found.epra && found.energy_act);
    }

    #[test]
    fn test_corrupt_document_is_error_and_file_is_removed() {
        let tmp = TempDir::new().unwrap();
        {
            let mut file = scoped_file(Some(tmp.path())).unwrap();
            file.write_all(b"<html>not a pdf</html>").unwrap();
            let result = first_page_text(file.path(), "https://example.com/source");
            assert!(matches!(result, Err(AppError::Document { .. })));
        }
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    // ===== Download path against a mock server =====

    fn classifier(dir: &Path) -> PdfClassifier {
        PdfClassifier::new(Client::new(), Some(dir.to_path_buf())).unwrap()
    }

    fn leftover_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_classify_downloaded_pdf() {
        let fixture = TempDir::new().unwrap();
        let pdf_path = fixture.path().join("notice.pdf");
        write_pdf(&pdf_path, &["Notice under The Energy Act"]);
        let body = std::fs::read(&pdf_path).unwrap();

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/akn/1/source")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body(body)
            .create_async()
            .await;

        let downloads = TempDir::new().unwrap();
        let found = classifier(downloads.path())
            .classify(&format!("{}/akn/1/source", server.url()))
            .await
            .unwrap();

        assert!(found.energy_act);
        assert!(!found.epra);
        assert_eq!(leftover_files(downloads.path()), 0);
    }

    #[tokio::test]
    async fn test_missing_document_is_error_and_leaves_no_file() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/akn/1/source")
            .with_status(404)
            .create_async()
            .await;

        let downloads = TempDir::new().unwrap();
        let result = classifier(downloads.path())
            .classify(&format!("{}/akn/1/source", server.url()))
            .await;

        assert!(matches!(result, Err(AppError::Http(_))));
        assert_eq!(leftover_files(downloads.path()), 0);
    }

    #[tokio::test]
    async fn test_corrupt_download_is_error_and_leaves_no_file() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/akn/1/source")
            .with_status(200)
            .with_body("<html>Document unavailable</html>")
            .create_async()
            .await;

        let downloads = TempDir::new().unwrap();
        let result = classifier(downloads.path())
            .classify(&format!("{}/akn/1/source", server.url()))
            .await;

        assert!(matches!(result, Err(AppError::Document { .. })));
        assert_eq!(leftover_files(downloads.path()), 0);
    }
}
