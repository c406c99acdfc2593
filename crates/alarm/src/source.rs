use crate::models::Reading;
use reqwest::{Client, StatusCode};
use std::{
    sync::{Arc, RwLock},
    time::Duration,
};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("reading source returned non-success status: {0}")]
    Status(StatusCode),
    #[error("reading source returned no entries")]
    EmptyPayload,
    #[error("invalid reading on line {line}: {reason}")]
    InvalidReading { line: usize, reason: String },
}

/// Produces the most recent reading on demand.
#[async_trait::async_trait]
pub trait ReadingSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Reading, FetchError>;
}

#[async_trait::async_trait]
impl<T: ReadingSource + ?Sized> ReadingSource for Box<T> {
    async fn fetch_latest(&self) -> Result<Reading, FetchError> {
        (**self).fetch_latest().await
    }
}

#[async_trait::async_trait]
impl<T: ReadingSource + ?Sized> ReadingSource for Arc<T> {
    async fn fetch_latest(&self) -> Result<Reading, FetchError> {
        (**self).fetch_latest().await
    }
}

/// Reads glucose entries from a Nightscout tab-separated entries endpoint.
#[derive(Debug, Clone)]
pub struct NightscoutSource {
    client: Client,
    url: Url,
}

impl NightscoutSource {
    pub fn new(url: Url) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait::async_trait]
impl ReadingSource for NightscoutSource {
    async fn fetch_latest(&self) -> Result<Reading, FetchError> {
        let response = self.client.get(self.url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.text().await?;
        parse_latest(&body)
    }
}

/// Parses every entry in a payload, most recent first.
pub fn parse_entries(payload: &str) -> Result<Vec<Reading>, FetchError> {
    let readings = entry_lines(payload)
        .map(|(line, text)| parse_line(line, text))
        .collect::<Result<Vec<_>, _>>()?;

    if readings.is_empty() {
        return Err(FetchError::EmptyPayload);
    }
    Ok(readings)
}

/// Parses only the first entry, so older malformed lines never block a tick.
pub fn parse_latest(payload: &str) -> Result<Reading, FetchError> {
    let (line, text) = entry_lines(payload)
        .next()
        .ok_or(FetchError::EmptyPayload)?;
    parse_line(line, text)
}

fn entry_lines(payload: &str) -> impl Iterator<Item = (usize, &str)> {
    payload
        .trim()
        .lines()
        .enumerate()
        .map(|(index, text)| (index + 1, text))
        .filter(|(_, text)| !text.trim().is_empty())
}

fn parse_line(line: usize, text: &str) -> Result<Reading, FetchError> {
    let invalid = |reason: String| FetchError::InvalidReading { line, reason };
    let mut fields = text.split('\t').map(strip_quotes);

    let timestamp = fields.next().unwrap_or_default().to_owned();

    let raw_ms = fields
        .next()
        .ok_or_else(|| invalid("missing timestamp milliseconds".to_owned()))?;
    let timestamp_ms = raw_ms
        .trim()
        .parse::<i64>()
        .map_err(|error| invalid(format!("timestamp milliseconds {raw_ms:?}: {error}")))?;

    let raw_value = fields
        .next()
        .ok_or_else(|| invalid("missing value".to_owned()))?;
    let value = raw_value
        .trim()
        .parse::<f64>()
        .map_err(|error| invalid(format!("value {raw_value:?}: {error}")))?;
    if !value.is_finite() {
        return Err(invalid(format!("value {raw_value:?} is not finite")));
    }

    let trend = fields.next().unwrap_or_default().to_owned();
    let source = fields.next().unwrap_or_default().to_owned();

    Ok(Reading {
        timestamp,
        timestamp_ms,
        value,
        trend,
        source,
    })
}

fn strip_quotes(field: &str) -> &str {
    let field = field.strip_prefix('"').unwrap_or(field);
    field.strip_suffix('"').unwrap_or(field)
}

/// Settable in-memory source used in testing mode.
///
/// Clones share the same value, so the admin surface can drive what the
/// scheduler sees.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    value: Arc<RwLock<f64>>,
}

impl SimulatedSource {
    pub fn new(initial: f64) -> Self {
        Self {
            value: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn value(&self) -> f64 {
        match self.value.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set(&self, value: f64) {
        let mut guard = match self.value.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = value;
    }
}

#[async_trait::async_trait]
impl ReadingSource for SimulatedSource {
    async fn fetch_latest(&self) -> Result<Reading, FetchError> {
        let now = chrono::Utc::now();
        Ok(Reading {
            timestamp: now.to_rfc3339(),
            timestamp_ms: now.timestamp_millis(),
            value: self.value(),
            trend: "Flat".to_owned(),
            source: "Simulated".to_owned(),
        })
    }
}
