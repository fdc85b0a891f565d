//! MySQL storage implementation.
//!
//! Talks to the existing notice table by column name; the table is created
//! and owned elsewhere, so nothing here issues DDL. Columns used:
//! `Date`, `Issue`, `Title`, `Page Link`, `Download Link`, `EPRA/Energy Act`.

use std::collections::HashSet;
use std::env;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::Row;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};

use crate::error::{AppError, Result};
use crate::models::{NoticeBatch, StorageConfig};
use crate::storage::{NoticeStore, StoreSummary};

/// Database used with the legacy credential variables.
const LEGACY_DATABASE: &str = "legal";

/// MySQL-backed notice store.
pub struct MySqlStore {
    pool: MySqlPool,
    table: String,
}

impl MySqlStore {
    /// Connect using `DATABASE_URL`, or the legacy `USER_NAME`/`PASSWORD`
    /// (base64) and `HOST`/`PORT` variables when no URL is configured.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let options = match &config.database_url {
            Some(url) => url.parse::<MySqlConnectOptions>()?,
            None => legacy_options()?,
        };
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        log::info!("Connected to MySQL store, table `{}`", config.table);
        Ok(Self {
            pool,
            table: quote_ident(&config.table),
        })
    }
}

#[async_trait]
impl NoticeStore for MySqlStore {
    async fn contains_date(&self, date: NaiveDate) -> Result<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE `Date` = ? LIMIT 1", self.table);
        let row = sqlx::query(&sql)
            .bind(midnight(date))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn known_links(&self, date: NaiveDate) -> Result<HashSet<String>> {
        let sql = format!(
            "SELECT `Download Link` FROM {} WHERE `Date` = ?",
            self.table
        );
        let rows = sqlx::query(&sql)
            .bind(midnight(date))
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("Download Link").map_err(AppError::from))
            .collect()
    }

    async fn append(&self, batch: &NoticeBatch) -> Result<usize> {
        let sql = format!(
            "INSERT INTO {} (`Date`, `Issue`, `Title`, `Page Link`, `Download Link`, `EPRA/Energy Act`) \
             VALUES (?, ?, ?, ?, ?, ?)",
            self.table
        );

        let mut tx = self.pool.begin().await?;
        for notice in batch.notices() {
            sqlx::query(&sql)
                .bind(midnight(notice.publication_date))
                .bind(&notice.issue_category)
                .bind(&notice.title)
                .bind(&notice.page_link)
                .bind(&notice.download_link)
                .bind(notice.classification.label())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        log::info!("Inserted {} notice(s) into {}", batch.len(), self.table);
        Ok(batch.len())
    }

    async fn summary(&self) -> Result<StoreSummary> {
        let sql = format!(
            "SELECT COUNT(*) AS row_count, CAST(MAX(`Date`) AS DATE) AS latest FROM {}",
            self.table
        );
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
        let row_count: i64 = row.try_get("row_count")?;
        let latest_date: Option<NaiveDate> = row.try_get("latest")?;

        Ok(StoreSummary {
            location: format!("mysql table {}", self.table),
            row_count: usize::try_from(row_count).unwrap_or_default(),
            latest_date,
        })
    }
}

/// Stored dates carry a midnight time component.
fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Quote a table name for MySQL, which may contain spaces.
fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn legacy_options() -> Result<MySqlConnectOptions> {
    let user = decode_env("USER_NAME")?;
    let password = decode_env("PASSWORD")?;
    let host = env::var("HOST").map_err(|_| AppError::config("HOST must be set"))?;
    let port = env::var("PORT")
        .unwrap_or_else(|_| "3306".to_string())
        .parse::<u16>()
        .map_err(|_| AppError::config("PORT must be a valid number"))?;

    Ok(MySqlConnectOptions::new()
        .host(&host)
        .port(port)
        .username(&user)
        .password(&password)
        .database(LEGACY_DATABASE))
}

fn decode_env(name: &str) -> Result<String> {
    let encoded = env::var(name).map_err(|_| AppError::config(format!("{name} must be set")))?;
    decode_base64(&encoded).map_err(|e| AppError::config(format!("{name}: {e}")))
}

fn decode_base64(encoded: &str) -> std::result::Result<String, String> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("not base64: {e}"))?;
    String::from_utf8(bytes).map_err(|e| format!("not UTF-8: {e}"))
}
