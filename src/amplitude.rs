//! Authenticated client for the Amplitude dashboard REST API.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::AmplitudeConfig;
use crate::models::{Granularity, ReportingWindow, TimeSeriesPoint};
use crate::source::{ActivitySource, Metric, ProbeResult, SeriesQuery, SourceError};

pub struct AmplitudeClient {
    config: AmplitudeConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SegmentationResponse {
    data: SegmentationData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SegmentationData {
    #[serde(default)]
    series: Vec<Vec<f64>>,
    #[serde(default)]
    x_values: Vec<String>,
}

impl AmplitudeClient {
    pub fn new(config: AmplitudeConfig) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &AmplitudeConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value, SourceError> {
        let response = self
            .http
            .get(self.url(path))
            .basic_auth(&self.config.api_key, Some(&self.config.secret_key))
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().await.ok();
            let message = body
                .as_ref()
                .and_then(|body| body.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            tracing::warn!(%status, path, "amplitude request failed");
            return Err(SourceError::Upstream(message));
        }

        Ok(response.json::<Value>().await?)
    }

    async fn segmentation(
        &self,
        metric: Metric,
        window: &ReportingWindow,
    ) -> Result<SegmentationData, SourceError> {
        let body = self
            .get_json("events/segmentation", &segmentation_params(metric, window))
            .await?;
        let parsed: SegmentationResponse =
            serde_json::from_value(body).map_err(|err| SourceError::Decode(err.to_string()))?;
        Ok(parsed.data)
    }

    async fn probe_connection(&self) -> Result<Value, SourceError> {
        let body = self.get_json("events/list", &[]).await?;
        Ok(json!({ "eventCount": event_entries(&body).len() }))
    }

    async fn probe_event_query(&self) -> Result<Value, SourceError> {
        let end = Utc::now().date_naive();
        let start = end.checked_sub_days(Days::new(7)).unwrap_or(end);
        let window = ReportingWindow {
            start,
            end,
            granularity: Granularity::Day,
        };
        let data = self.segmentation(Metric::ActiveUsers, &window).await?;
        let daily = data.series.first().map(Vec::as_slice).unwrap_or_default();
        let unique_users: f64 = daily.iter().sum();
        Ok(json!({
            "uniqueUsers": unique_users.round() as u64,
            "period": "7d",
            "dailyBreakdown": daily.len(),
        }))
    }

    async fn probe_event_list(&self) -> Result<Value, SourceError> {
        let body = self.get_json("events/list", &[]).await?;
        let events = event_entries(&body);
        let names: Vec<&str> = events.iter().take(5).filter_map(event_name).collect();
        Ok(json!({
            "eventCount": events.len(),
            "events": names,
        }))
    }
}

#[async_trait]
impl ActivitySource for AmplitudeClient {
    async fn fetch_series(&self, query: &SeriesQuery) -> Result<Vec<TimeSeriesPoint>, SourceError> {
        tracing::debug!(
            metric = query.metric.event_type(),
            start = %query.window.start,
            end = %query.window.end,
            "fetching segmentation"
        );
        let data = self.segmentation(query.metric, &query.window).await?;
        points_from_segmentation(data)
    }

    async fn diagnostics(&self) -> Vec<ProbeResult> {
        let started = Instant::now();

        let (connection, query, list) = tokio::join!(
            self.probe_connection(),
            self.probe_event_query(),
            self.probe_event_list()
        );

        let results = vec![
            ProbeResult::from_outcome("Connection Test", started, connection),
            ProbeResult::from_outcome("Event Query Test", started, query),
            ProbeResult::from_outcome("Event List Test", started, list),
        ];
        let passed = results.iter().filter(|result| result.success).count();
        tracing::info!(passed, total = results.len(), "amplitude diagnostics finished");
        results
    }
}

fn segmentation_params(metric: Metric, window: &ReportingWindow) -> Vec<(&'static str, String)> {
    vec![
        ("e", json!({ "event_type": metric.event_type() }).to_string()),
        ("start", window.start.format("%Y%m%d").to_string()),
        ("end", window.end.format("%Y%m%d").to_string()),
        ("m", "uniques".to_string()),
        ("i", window.granularity.interval().to_string()),
    ]
}

fn points_from_segmentation(data: SegmentationData) -> Result<Vec<TimeSeriesPoint>, SourceError> {
    let Some(values) = data.series.into_iter().next() else {
        return Ok(Vec::new());
    };
    if values.len() != data.x_values.len() {
        return Err(SourceError::Decode(format!(
            "series has {} values for {} xValues",
            values.len(),
            data.x_values.len()
        )));
    }

    data.x_values
        .iter()
        .zip(values)
        .map(|(label, value)| {
            let date = NaiveDate::parse_from_str(label, "%Y-%m-%d")
                .map_err(|err| SourceError::Decode(format!("bad xValue {label:?}: {err}")))?;
            Ok(TimeSeriesPoint::new(date, value.max(0.0).round() as u64))
        })
        .collect()
}

fn event_entries(body: &Value) -> &[Value] {
    body.get("data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn event_name(event: &Value) -> Option<&str> {
    event
        .get("display")
        .or_else(|| event.get("value"))
        .and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn params_follow_segmentation_contract() {
        let window = ReportingWindow {
            start: date(2025, 5, 26),
            end: date(2025, 6, 8),
            granularity: Granularity::Week,
        };
        let params = segmentation_params(Metric::NewUsers, &window);
        assert_eq!(params[0], ("e", r#"{"event_type":"_new_user"}"#.to_string()));
        assert_eq!(params[1], ("start", "20250526".to_string()));
        assert_eq!(params[2], ("end", "20250608".to_string()));
        assert_eq!(params[3], ("m", "uniques".to_string()));
        assert_eq!(params[4], ("i", "7".to_string()));
    }

    #[test]
    fn segmentation_zips_dates_with_first_series() {
        let body = json!({
            "data": {
                "series": [[100.0, 120.0, 90.0], [1.0, 2.0, 3.0]],
                "xValues": ["2025-06-02", "2025-06-03", "2025-06-04"]
            }
        });
        let parsed: SegmentationResponse = serde_json::from_value(body).unwrap();
        let points = points_from_segmentation(parsed.data).unwrap();
        assert_eq!(
            points,
            vec![
                TimeSeriesPoint::new(date(2025, 6, 2), 100),
                TimeSeriesPoint::new(date(2025, 6, 3), 120),
                TimeSeriesPoint::new(date(2025, 6, 4), 90),
            ]
        );
    }

    #[test]
    fn empty_segmentation_is_empty_series() {
        let parsed: SegmentationResponse = serde_json::from_value(json!({ "data": {} })).unwrap();
        assert!(points_from_segmentation(parsed.data).unwrap().is_empty());
    }

    #[test]
    fn malformed_dates_are_decode_errors() {
        let data = SegmentationData {
            series: vec![vec![5.0]],
            x_values: vec!["June 2".to_string()],
        };
        assert!(matches!(
            points_from_segmentation(data),
            Err(SourceError::Decode(_))
        ));
    }

    #[test]
    fn mismatched_series_length_is_a_decode_error() {
        let data = SegmentationData {
            series: vec![vec![5.0, 6.0]],
            x_values: vec!["2025-06-02".to_string()],
        };
        let err = points_from_segmentation(data).unwrap_err();
        assert_eq!(err.to_string(), "Invalid response: series has 2 values for 1 xValues");
    }

    #[test]
    fn event_names_prefer_display() {
        let body = json!({
            "data": [
                { "value": "_active", "display": "Any Active Event" },
                { "value": "page_view" }
            ]
        });
        let names: Vec<&str> = event_entries(&body).iter().filter_map(event_name).collect();
        assert_eq!(names, vec!["Any Active Event", "page_view"]);
    }

    #[test]
    fn urls_join_without_double_slash() {
        let mut config = AmplitudeConfig::new("key", "secret");
        config.base_url = "http://localhost:9000/api/2/".to_string();
        let client = AmplitudeClient::new(config).unwrap();
        assert_eq!(
            client.url("events/list"),
            "http://localhost:9000/api/2/events/list"
        );
    }
}
