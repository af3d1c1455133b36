//! Data source loading.
//!
//! Fetches the comma-separated source over HTTP (or reads it from disk) and
//! parses it into a raw table. There is no cache: each call fetches anew, and
//! any failure aborts the run without retrying.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Public teaching copy of the Framingham Heart Study extract.
pub const DEFAULT_SOURCE_URL: &str = "https://raw.githubusercontent.com/LUCE-Blockchain/Databases-for-teaching/main/Framingham%20Dataset.csv";

/// Environment variable overriding [`DEFAULT_SOURCE_URL`].
pub const SOURCE_URL_ENV: &str = "FRAMINGHAM_DATA_URL";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Field contents read as missing, in addition to empty fields.
pub const MISSING_TOKENS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Where the raw table comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    /// CSV fetched with an HTTP GET.
    Url(String),
    /// CSV read from the local filesystem.
    File(PathBuf),
}

impl Default for DataSource {
    fn default() -> Self {
        Self::Url(DEFAULT_SOURCE_URL.to_string())
    }
}

impl DataSource {
    /// The default source, honouring [`SOURCE_URL_ENV`] when set.
    pub fn from_env() -> Self {
        match std::env::var(SOURCE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::Url(url),
            _ => Self::default(),
        }
    }

    /// Human-readable name used in errors and logs.
    pub fn display_name(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::File(path) => path.display().to_string(),
        }
    }

    /// Fetch the raw bytes of the source.
    pub fn fetch(&self) -> Result<Vec<u8>> {
        match self {
            Self::Url(url) => fetch_url(url),
            Self::File(path) => std::fs::read(path).map_err(|e| {
                PipelineError::data_load(path.display().to_string(), e.to_string())
            }),
        }
    }

    /// Fetch and parse the source into a raw table.
    pub fn load(&self) -> Result<DataFrame> {
        info!("Loading dataset from: {}", self.display_name());
        let bytes = self.fetch()?;
        let df = parse_csv(&bytes, &self.display_name())?;
        info!("Dataset loaded successfully: {:?}", df.shape());
        Ok(df)
    }
}

fn fetch_url(url: &str) -> Result<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| PipelineError::data_load(url, e.to_string()))?;

    check_status(url, response.status())?;

    let bytes = response
        .bytes()
        .map_err(|e| PipelineError::data_load(url, e.to_string()))?;
    debug!("Fetched {} bytes from {}", bytes.len(), url);
    Ok(bytes.to_vec())
}

fn check_status(url: &str, status: reqwest::StatusCode) -> Result<()> {
    if !status.is_success() {
        return Err(PipelineError::data_load(
            url,
            format!("server responded with {}", status),
        ));
    }
    Ok(())
}

/// Parse UTF-8 CSV with a header row. Empty fields and [`MISSING_TOKENS`]
/// are nulls.
pub fn parse_csv(bytes: &[u8], source_name: &str) -> Result<DataFrame> {
    if std::str::from_utf8(bytes).is_err() {
        return Err(PipelineError::data_load(source_name, "content is not valid UTF-8"));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_parse_options(
            CsvParseOptions::default()
                .with_quote_char(Some(b'"'))
                .with_null_values(Some(NullValues::AllColumns(
                    MISSING_TOKENS.iter().map(|t| (*t).into()).collect(),
                ))),
        )
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| PipelineError::data_load(source_name, e.to_string()))?;

    if df.height() == 0 {
        return Err(PipelineError::data_load(source_name, "no data rows"));
    }

    Ok(df)
}
