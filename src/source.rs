//! Data-source collaborators: everything that fetches raw reading rows.
//!
//! Sources only fetch and decode. A record that cannot be decoded into a
//! `RawReading` is reported in the batch and skipped; validation of the
//! decoded rows is left to `ingest`.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::config::{Config, SourceConfig};
use crate::error::InputDataError;
use crate::ingest::{ingest_numbered, parse_timestamp, IngestReport};
use crate::models::RawReading;

// ---

/// Rows for `[start, end)`, optionally restricted to one device.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub device_id: Option<String>,
}

/// Result of one fetch. Rows keep their position in the fetched stream so
/// decode and validation failures share one numbering.
#[derive(Debug, Default)]
pub struct SourceBatch {
    pub rows: Vec<(usize, RawReading)>,
    pub undecodable: Vec<InputDataError>,
}

impl SourceBatch {
    /// Decode JSON records one by one, keeping the ones that fit.
    fn decode(items: Vec<serde_json::Value>, first_row: usize) -> Self {
        // ---
        let mut batch = SourceBatch::default();
        for (i, item) in items.into_iter().enumerate() {
            match serde_json::from_value::<RawReading>(item) {
                Ok(row) => batch.rows.push((first_row + i, row)),
                Err(e) => {
                    let err = InputDataError::Undecodable {
                        row: first_row + i,
                        reason: e.to_string(),
                    };
                    tracing::warn!("Skipping reading: {}", err);
                    batch.undecodable.push(err);
                }
            }
        }
        batch
    }

    fn extend(&mut self, other: SourceBatch) {
        self.rows.extend(other.rows);
        self.undecodable.extend(other.undecodable);
    }

    /// Validate the decoded rows. Rejections from both stages come back
    /// ordered by row position.
    pub fn ingest(self) -> IngestReport {
        // ---
        let mut report = ingest_numbered(self.rows);
        report.rejected.extend(self.undecodable);
        report.rejected.sort_by_key(InputDataError::row);
        report
    }
}

/// PostgREST endpoint in front of the hosted readings table.
#[derive(Debug, Clone)]
pub struct RestSource {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    table: String,
    page_size: u32,
    max_pages: u32,
}

/// Direct Postgres access to the readings table.
#[derive(Debug, Clone)]
pub struct PgSource {
    pool: PgPool,
    table: String,
}

#[derive(Debug, sqlx::FromRow)]
struct PgReadingRow {
    id: Option<String>,
    device_id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    pm25: Option<f64>,
    pm10: Option<f64>,
    co: Option<f64>,
    no2: Option<f64>,
}

impl From<PgReadingRow> for RawReading {
    fn from(row: PgReadingRow) -> Self {
        // ---
        RawReading {
            id: row.id,
            device_id: row.device_id,
            timestamp: row.timestamp.map(|ts| ts.to_rfc3339()),
            pm25: row.pm25,
            pm10: row.pm10,
            co: row.co,
            no2: row.no2,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ReadingSource {
    Rest(RestSource),
    Postgres(PgSource),
    File(PathBuf),
    /// Rows held in memory.
    Fixed(Vec<RawReading>),
}

impl ReadingSource {
    /// Build the source named by the configuration. Postgres connects here so
    /// that a bad connection string fails at startup.
    pub async fn connect(cfg: &Config) -> Result<Self> {
        // ---
        match &cfg.source {
            SourceConfig::Rest { api_url, api_key } => Ok(ReadingSource::Rest(RestSource {
                client: reqwest::Client::new(),
                api_url: api_url.trim_end_matches('/').to_string(),
                api_key: api_key.clone(),
                table: cfg.table.clone(),
                page_size: cfg.api_page_size,
                max_pages: cfg.api_max_pages,
            })),
            SourceConfig::Postgres { db_url, db_pool_max } => {
                let pool = PgPoolOptions::new()
                    .max_connections(*db_pool_max)
                    .connect(db_url)
                    .await
                    .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;
                info!("Successfully connected to database");
                Ok(ReadingSource::Postgres(PgSource {
                    pool,
                    table: cfg.table.clone(),
                }))
            }
            SourceConfig::File { path } => Ok(ReadingSource::File(path.clone())),
        }
    }

    pub async fn fetch(&self, query: &ReadingQuery) -> Result<SourceBatch> {
        // ---
        match self {
            ReadingSource::Rest(rest) => rest.fetch(query).await,
            ReadingSource::Postgres(pg) => pg.fetch(query).await,
            ReadingSource::File(path) => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| anyhow!("Failed to read '{}': {}", path.display(), e))?;
                let items: Vec<serde_json::Value> = serde_json::from_str(&text)
                    .map_err(|e| anyhow!("'{}' is not a JSON array: {}", path.display(), e))?;
                let mut batch = SourceBatch::decode(items, 0);
                batch.rows.retain(|(_, r)| in_query(r, query));
                Ok(batch)
            }
            ReadingSource::Fixed(rows) => Ok(SourceBatch {
                rows: rows
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| in_query(r, query))
                    .map(|(i, r)| (i, r.clone()))
                    .collect(),
                undecodable: Vec::new(),
            }),
        }
    }
}

/// Range/device check for sources that cannot filter server-side. Rows
/// whose timestamp does not parse are kept so `ingest` reports them.
fn in_query(row: &RawReading, query: &ReadingQuery) -> bool {
    // ---
    let in_range = match row.timestamp.as_deref().and_then(parse_timestamp) {
        Some(ts) => ts >= query.start && ts < query.end,
        None => true,
    };
    let device_ok = match (&query.device_id, &row.device_id) {
        (Some(wanted), Some(id)) => wanted == id,
        (Some(_), None) => false,
        (None, _) => true,
    };
    in_range && device_ok
}

impl RestSource {
    /// Fetch paginated rows, oldest first.
    async fn fetch(&self, query: &ReadingQuery) -> Result<SourceBatch> {
        // ---
        let url = format!("{}/rest/v1/{}", self.api_url, self.table);
        let mut all = SourceBatch::default();
        let mut page_count = 0;

        loop {
            if page_count >= self.max_pages {
                debug!(
                    "Hit page limit of {}, stopping pagination. Fetched {} records so far.",
                    self.max_pages,
                    all.rows.len()
                );
                break;
            }
            let offset = page_count * self.page_size;
            page_count += 1;

            let mut params: Vec<(&str, String)> = vec![
                ("select", "*".into()),
                ("timestamp", format!("gte.{}", rfc3339(query.start))),
                ("timestamp", format!("lt.{}", rfc3339(query.end))),
                ("order", "timestamp.asc".into()),
                ("limit", self.page_size.to_string()),
                ("offset", offset.to_string()),
            ];
            if let Some(device_id) = &query.device_id {
                params.push(("device_id", format!("eq.{}", device_id)));
            }

            debug!("Fetching page {} from: {}", page_count, url);

            let mut request = self.client.get(&url).query(&params);
            if !self.api_key.is_empty() {
                request = request.header("apikey", &self.api_key).bearer_auth(&self.api_key);
            }
            let items: Vec<serde_json::Value> = request
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let received = items.len();
            debug!("Page {} returned {} items", page_count, received);
            all.extend(SourceBatch::decode(items, offset as usize));

            if received < self.page_size as usize {
                break;
            }
        }

        info!(
            "Finished fetching {} records from {} pages",
            all.rows.len(),
            page_count
        );
        Ok(all)
    }
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl PgSource {
    async fn fetch(&self, query: &ReadingQuery) -> Result<SourceBatch> {
        // ---
        // Table name is validated as an identifier when the config loads.
        let sql = format!(
            r#"
            SELECT id::text              AS id,
                   device_id::text       AS device_id,
                   "timestamp"::timestamptz AS "timestamp",
                   pm25::float8          AS pm25,
                   pm10::float8          AS pm10,
                   co::float8            AS co,
                   no2::float8           AS no2
              FROM {}
             WHERE "timestamp" >= $1
               AND "timestamp" <  $2
               AND ($3::text IS NULL OR device_id::text = $3)
             ORDER BY "timestamp"
            "#,
            self.table
        );

        let rows: Vec<PgReadingRow> = sqlx::query_as(&sql)
            .bind(query.start)
            .bind(query.end)
            .bind(query.device_id.as_deref())
            .fetch_all(&self.pool)
            .await?;

        info!("Fetched {} records from table {}", rows.len(), self.table);
        Ok(SourceBatch {
            rows: rows.into_iter().map(RawReading::from).enumerate().collect(),
            undecodable: Vec::new(),
        })
    }
}
