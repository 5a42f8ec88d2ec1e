//! The data-fetch seam between report assembly and whatever produces raw
//! activity series.

use std::path::PathBuf;
use std::time::Instant;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Granularity, ReportingWindow, TimeSeriesPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    ActiveUsers,
    NewUsers,
}

impl Metric {
    /// Event type understood by the segmentation endpoint.
    pub fn event_type(self) -> &'static str {
        match self {
            Metric::ActiveUsers => "_active",
            Metric::NewUsers => "_new_user",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesQuery {
    pub metric: Metric,
    pub window: ReportingWindow,
}

impl SeriesQuery {
    pub fn active(window: ReportingWindow) -> Self {
        Self {
            metric: Metric::ActiveUsers,
            window,
        }
    }

    pub fn new_users(window: ReportingWindow) -> Self {
        Self {
            metric: Metric::NewUsers,
            window,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Request timeout")]
    Timeout,
    #[error("{0}")]
    Upstream(String),
    #[error("Invalid response: {0}")]
    Decode(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Unsupported metric: {0:?}")]
    UnsupportedMetric(Metric),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else {
            SourceError::Http(err.to_string())
        }
    }
}

/// Outcome of one connectivity probe.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub test: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ProbeResult {
    pub fn from_outcome(
        test: &str,
        started: Instant,
        outcome: Result<serde_json::Value, SourceError>,
    ) -> Self {
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(data) => Self {
                test: test.to_string(),
                success: true,
                data: Some(data),
                error: None,
                duration_ms,
            },
            Err(err) => Self {
                test: test.to_string(),
                success: false,
                data: None,
                error: Some(err.to_string()),
                duration_ms,
            },
        }
    }
}

#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Returns the raw bucketed series for the query window. Buckets are
    /// keyed by their first day: weekly buckets by their Monday, monthly
    /// buckets by the 1st. A provider that labels weeks from Sunday must
    /// relabel them, or the first complete week falls outside the window
    /// and the week in progress is kept instead.
    async fn fetch_series(&self, query: &SeriesQuery) -> Result<Vec<TimeSeriesPoint>, SourceError>;

    /// Runs the source's connectivity checks.
    async fn diagnostics(&self) -> Vec<ProbeResult>;
}

/// Reads pre-exported series from a `granularity,date,value` CSV file.
pub struct CsvSource {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    granularity: Granularity,
    date: NaiveDate,
    value: u64,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_rows(&self) -> Result<Vec<CsvRow>, SourceError> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut rows = Vec::new();
        for result in reader.deserialize::<CsvRow>() {
            rows.push(result?);
        }
        Ok(rows)
    }
}

#[async_trait]
impl ActivitySource for CsvSource {
    async fn fetch_series(&self, query: &SeriesQuery) -> Result<Vec<TimeSeriesPoint>, SourceError> {
        if query.metric != Metric::ActiveUsers {
            return Err(SourceError::UnsupportedMetric(query.metric));
        }

        let points = self
            .read_rows()?
            .into_iter()
            .filter(|row| row.granularity == query.window.granularity)
            .filter(|row| query.window.contains(row.date))
            .map(|row| TimeSeriesPoint::new(row.date, row.value))
            .collect();
        Ok(points)
    }

    async fn diagnostics(&self) -> Vec<ProbeResult> {
        let started = Instant::now();
        let outcome = self.read_rows().map(|rows| {
            serde_json::json!({
                "path": self.path.display().to_string(),
                "rows": rows.len(),
            })
        });
        vec![ProbeResult::from_outcome("CSV Read Test", started, outcome)]
    }
}
