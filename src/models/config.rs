//! Application configuration structures.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Environment variable holding the SMTP password.
pub const SMTP_PASSWORD_ENV: &str = "GAZETTE_SMTP_PASSWORD";

/// Environment variable holding the store connection string.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Dotenv files read for secrets, in order, relative to the working directory.
const ENV_FILES: [&str; 2] = ["config.env", ".env"];

/// Root application configuration.
///
/// Built once per run and passed down explicitly; nothing in the crate reads
/// credentials from process-wide state after loading.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP client settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Listing site layout
    #[serde(default)]
    pub site: SiteConfig,

    /// Notification settings
    #[serde(default)]
    pub mail: MailConfig,

    /// Persisted store settings
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Fill secrets from the environment.
    ///
    /// `config.env` and `.env` are loaded first when present; variables
    /// already set in the environment win.
    pub fn with_env_secrets(mut self) -> Self {
        for name in ENV_FILES {
            if let Err(e) = load_env_file(Path::new(name)) {
                log::warn!("Ignoring env file: {}", e);
            }
        }

        if let Ok(password) = env::var(SMTP_PASSWORD_ENV) {
            self.mail.password = Some(password);
        }
        if let Ok(url) = env::var(DATABASE_URL_ENV) {
            self.storage.database_url = Some(url);
        }
        self
    }

    /// Validate configuration values needed for discovery and storage.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.site.base_url)
            .map_err(|e| AppError::validation(format!("site.base_url is invalid: {e}")))?;
        if self.site.year_prefix.is_empty() {
            return Err(AppError::validation("site.year_prefix is empty"));
        }
        if self.site.date_format.trim().is_empty() {
            return Err(AppError::validation("site.date_format is empty"));
        }
        if self.storage.backend == StorageBackend::Local && self.storage.path.trim().is_empty() {
            return Err(AppError::validation("storage.path is empty"));
        }
        if self.storage.backend == StorageBackend::MySql && self.storage.table.trim().is_empty() {
            return Err(AppError::validation("storage.table is empty"));
        }
        Ok(())
    }
}

/// Load a dotenv file into the process environment.
///
/// Returns `Ok(false)` when the file does not exist; a file that exists but
/// cannot be read or parsed is an error.
fn load_env_file(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(AppError::config(format!("{}: {e}", path.display()))),
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Layout of the gazette listing site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Root listing URL; the year archive path is appended to it
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Prefix identifying a year label on the root listing
    #[serde(default = "defaults::year_prefix")]
    pub year_prefix: String,

    /// chrono format of the date cells
    #[serde(default = "defaults::date_format")]
    pub date_format: String,

    /// Appended to a notice page link to reach its source document
    #[serde(default = "defaults::download_suffix")]
    pub download_suffix: String,

    /// Issue category used when the listing cell is blank
    #[serde(default = "defaults::default_issue")]
    pub default_issue: String,

    /// Directory for scoped document downloads (system temp dir if unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            year_prefix: defaults::year_prefix(),
            date_format: defaults::date_format(),
            download_suffix: defaults::download_suffix(),
            default_issue: defaults::default_issue(),
            download_dir: None,
        }
    }
}

/// Outbound notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Sender address, also used as the SMTP login
    #[serde(default)]
    pub from: String,

    /// Recipient addresses
    #[serde(default)]
    pub to: Vec<String>,

    /// Message subject
    #[serde(default = "defaults::subject")]
    pub subject: String,

    /// SMTP relay host
    #[serde(default = "defaults::smtp_host")]
    pub smtp_host: String,

    /// SMTP submission port (STARTTLS)
    #[serde(default = "defaults::smtp_port")]
    pub smtp_port: u16,

    /// SMTP password, only ever taken from the environment
    #[serde(skip)]
    pub password: Option<String>,
}

impl MailConfig {
    /// Validate that a message can be addressed and authenticated.
    pub fn validate(&self) -> Result<()> {
        if self.from.trim().is_empty() {
            return Err(AppError::validation("mail.from is empty"));
        }
        if self.to.is_empty() {
            return Err(AppError::validation("mail.to has no recipients"));
        }
        if self.smtp_host.trim().is_empty() {
            return Err(AppError::validation("mail.smtp_host is empty"));
        }
        if self.password.as_deref().is_none_or(str::is_empty) {
            return Err(AppError::validation(format!(
                "{SMTP_PASSWORD_ENV} is not set"
            )));
        }
        Ok(())
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: String::new(),
            to: Vec::new(),
            subject: defaults::subject(),
            smtp_host: defaults::smtp_host(),
            smtp_port: defaults::smtp_port(),
            password: None,
        }
    }
}

/// Which store implementation holds previously seen notices.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON file on the local filesystem
    #[default]
    Local,
    /// MySQL table (requires the `mysql` feature)
    #[serde(rename = "mysql")]
    MySql,
}

/// What makes a batch a repeat of already processed data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DedupMode {
    /// Any stored row with the same publication date
    #[default]
    Date,
    /// Same publication date and same download link
    Notice,
}

/// Persisted store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// JSON file used by the local backend
    #[serde(default = "defaults::storage_path")]
    pub path: String,

    /// Table used by the MySQL backend
    #[serde(default = "defaults::table")]
    pub table: String,

    #[serde(default)]
    pub dedup: DedupMode,

    /// Connection string, only ever taken from the environment
    #[serde(skip)]
    pub database_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: defaults::storage_path(),
            table: defaults::table(),
            dedup: DedupMode::default(),
            database_url: None,
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; gazette-crawler/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Site defaults
    pub fn base_url() -> String {
        "https://new.kenyalaw.org/gazettes/".into()
    }
    pub fn year_prefix() -> String {
        "20".into()
    }
    pub fn date_format() -> String {
        "%d %B %Y".into()
    }
    pub fn download_suffix() -> String {
        "/source".into()
    }
    pub fn default_issue() -> String {
        "Weekly Issue".into()
    }

    // Mail defaults
    pub fn subject() -> String {
        "Recent Kenya Law Weekly Notice".into()
    }
    pub fn smtp_host() -> String {
        "smtp.gmail.com".into()
    }
    pub fn smtp_port() -> u16 {
        587
    }

    // Storage defaults
    pub fn storage_path() -> String {
        "storage/notices.json".into()
    }
    pub fn table() -> String {
        "gazett notice db".into()
    }
}
