//! Google Sheets source
//!
//! Reads one worksheet through the Sheets v4 `values.get` endpoint. Numbers
//! come back unformatted and dates come back as their formatted strings, so
//! the normalizer sees the same shapes it sees from a CSV export.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;

use crate::config::SheetConfig;
use crate::error::{Error, Result};
use crate::types::{RawTable, RawValue};

use super::ActivitySource;

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(500);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Response body of `GET /v4/spreadsheets/{key}/values/{range}`
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SheetValues {
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub major_dimension: Option<String>,
    /// Rows of cells; absent when the worksheet is empty
    #[serde(default)]
    pub values: Vec<Vec<RawValue>>,
}

impl SheetValues {
    /// First row is the header; the rest are data rows.
    pub fn into_table(self) -> RawTable {
        let mut rows = self.values.into_iter();
        let headers: Vec<String> = match rows.next() {
            Some(header) => header
                .into_iter()
                .map(|cell| cell.as_text().unwrap_or_default().trim().to_string())
                .collect(),
            None => return RawTable::new(),
        };

        let rows = rows
            .map(|row| row.into_iter().map(blank_to_null).collect())
            .collect();

        RawTable::from_rows(headers, rows)
    }
}

fn blank_to_null(cell: RawValue) -> RawValue {
    match cell {
        RawValue::Text(s) if s.trim().is_empty() => RawValue::Null,
        other => other,
    }
}

/// One failed attempt and whether it is worth repeating.
struct Failure {
    error: Error,
    retryable: bool,
}

impl Failure {
    fn transient(error: Error) -> Self {
        Self {
            error,
            retryable: true,
        }
    }

    fn fatal(error: Error) -> Self {
        Self {
            error,
            retryable: false,
        }
    }
}

/// Async HTTP client for the Sheets values endpoint
pub struct SheetClient {
    config: SheetConfig,
    http_client: reqwest::Client,
    url: String,
}

impl SheetClient {
    /// Create a new client from configuration
    ///
    /// Returns an error if the configuration is invalid or missing required fields.
    pub fn new(config: SheetConfig) -> Result<Self> {
        config.validate()?;

        let key = config
            .spreadsheet_key
            .clone()
            .ok_or_else(|| Error::Config("source.sheet.spreadsheet_key is required".to_string()))?;

        let mut url = format!(
            "{}/v4/spreadsheets/{}/values/{}?valueRenderOption=UNFORMATTED_VALUE&dateTimeRenderOption=FORMATTED_STRING",
            config.base_url.trim_end_matches('/'),
            urlencoding::encode(&key),
            urlencoding::encode(&config.worksheet)
        );
        if let Some(api_key) = &config.api_key {
            url.push_str("&key=");
            url.push_str(&urlencoding::encode(api_key));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = config.resolved_access_token() {
            let auth_value = format!("Bearer {}", token);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid access_token: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
            url,
        })
    }

    /// Request URL, including query parameters
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_once(&self) -> std::result::Result<SheetValues, Failure> {
        let response = self.http_client.get(&self.url).send().await.map_err(|e| {
            let error = Error::Source(format!("HTTP request failed: {}", e));
            if e.is_timeout() || e.is_connect() || e.is_request() {
                Failure::transient(error)
            } else {
                Failure::fatal(error)
            }
        })?;

        let status = response.status();

        if status.is_success() {
            let body = response.text().await.map_err(|e| {
                Failure::transient(Error::Source(format!("failed to read response: {}", e)))
            })?;
            serde_json::from_str::<SheetValues>(&body).map_err(|e| Failure::fatal(Error::from(e)))
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            let error = Error::Source(format!("API error ({}): {}", status, error_text));
            if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                Err(Failure::transient(error))
            } else {
                Err(Failure::fatal(error))
            }
        }
    }

    /// Fetch the worksheet with retry logic
    ///
    /// Retries transient failures (5xx, 429, timeouts, connection errors)
    /// with exponential backoff.
    pub async fn fetch_values(&self) -> Result<SheetValues> {
        let mut last_error = None;
        let mut delay = INITIAL_RETRY_DELAY;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    "Retrying sheet fetch (attempt {}/{}), waiting {:?}",
                    attempt + 1,
                    self.config.max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, MAX_RETRY_DELAY);
            }

            match self.fetch_once().await {
                Ok(values) => return Ok(values),
                Err(failure) if failure.retryable => {
                    tracing::warn!("Transient error fetching sheet: {}", failure.error);
                    last_error = Some(failure.error);
                }
                Err(failure) => return Err(failure.error),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Source("max retries exceeded".to_string())))
    }

    /// Fetch the worksheet as a raw table
    pub async fn fetch_table(&self) -> Result<RawTable> {
        Ok(self.fetch_values().await?.into_table())
    }
}

/// Synchronous sheet source
///
/// Owns a single-threaded runtime and blocks on the async client.
pub struct SheetSource {
    client: SheetClient,
    runtime: tokio::runtime::Runtime,
}

impl SheetSource {
    pub fn new(config: SheetConfig) -> Result<Self> {
        let client = SheetClient::new(config)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Source(format!("failed to create runtime: {}", e)))?;
        Ok(Self { client, runtime })
    }

    pub fn client(&self) -> &SheetClient {
        &self.client
    }
}

impl ActivitySource for SheetSource {
    fn load(&self) -> Result<RawTable> {
        let table = self.runtime.block_on(self.client.fetch_table())?;
        tracing::info!(
            worksheet = %self.client.config.worksheet,
            columns = table.columns().len(),
            rows = table.row_count(),
            "Loaded activities from sheet"
        );
        Ok(table)
    }

    fn describe(&self) -> String {
        format!(
            "sheet {}/{}",
            self.client.config.spreadsheet_key.as_deref().unwrap_or_default(),
            self.client.config.worksheet
        )
    }
}
