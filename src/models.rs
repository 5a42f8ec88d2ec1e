use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::compare::ComparisonResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    /// Bucket size understood by the segmentation API (`i` parameter).
    pub fn interval(self) -> u32 {
        match self {
            Granularity::Day => 1,
            Granularity::Week => 7,
            Granularity::Month => 30,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Granularity::Day => "DAU",
            Granularity::Week => "WAU",
            Granularity::Month => "MAU",
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub granularity: Granularity,
}

impl ReportingWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of day, week or month buckets the window spans.
    pub fn periods(&self) -> usize {
        if self.end < self.start {
            return 0;
        }
        let days = (self.end - self.start).num_days() + 1;
        let periods = match self.granularity {
            Granularity::Day => days,
            Granularity::Week => (days + 6) / 7,
            Granularity::Month => {
                let months = |date: NaiveDate| i64::from(date.year()) * 12 + i64::from(date.month0());
                months(self.end) - months(self.start) + 1
            }
        };
        usize::try_from(periods).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub value: u64,
}

impl TimeSeriesPoint {
    pub fn new(date: NaiveDate, value: u64) -> Self {
        Self { date, value }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairedPoint {
    pub date: NaiveDate,
    pub value: u64,
    pub comparison_date: NaiveDate,
    pub comparison_value: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesStats {
    pub count: usize,
    pub average: f64,
    pub max: u64,
    pub min: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionPoint {
    pub date: NaiveDate,
    pub new_users: u64,
    pub existing_users: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub users: u64,
    pub yoy_date: NaiveDate,
    pub yoy_users: Option<u64>,
    pub yoy_change: Option<f64>,
    pub two_years_back_date: NaiveDate,
    pub two_years_back_users: Option<u64>,
    pub two_years_back_change: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorReport {
    pub metric: String,
    pub granularity: Granularity,
    pub window: ReportingWindow,
    pub yoy_window: ReportingWindow,
    pub two_years_back_window: ReportingWindow,
    pub current_value: u64,
    pub period_over_period_change: Option<f64>,
    pub trend: Vec<TrendPoint>,
    pub has_yoy_data: bool,
    pub has_two_years_back_data: bool,
    pub summary: Option<SeriesStats>,
    pub yoy_summary: Option<SeriesStats>,
    pub two_years_back_summary: Option<SeriesStats>,
    pub anomaly: ComparisonResult,
    pub yoy: ComparisonResult,
    pub avg_yoy_change: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionReport {
    pub window: ReportingWindow,
    pub yoy_window: ReportingWindow,
    pub current: Vec<CompositionPoint>,
    pub yoy: Vec<CompositionPoint>,
}
