//! Turns one reporting window into a full monitor report: current series,
//! weekday- or month-aligned comparisons one and two years back, summary
//! statistics and classifications.

use crate::calendar;
use crate::compare::{self, Thresholds};
use crate::error::MonitorError;
use crate::models::{
    CompositionReport, MonitorReport, PairedPoint, ReportingWindow, TimeSeriesPoint, TrendPoint,
};
use crate::series;
use crate::source::{ActivitySource, SeriesQuery, SourceError};

pub const YOY_YEARS: u32 = 1;
pub const TWO_YEARS_BACK: u32 = 2;

/// Preceding buckets averaged as the anomaly baseline.
pub const BASELINE_PERIODS: usize = 3;

fn comparison_or_empty(
    result: Result<Vec<TimeSeriesPoint>, SourceError>,
    which: &str,
) -> Vec<TimeSeriesPoint> {
    match result {
        Ok(points) => series::normalize(points),
        Err(err) => {
            tracing::warn!(error = %err, comparison = which, "comparison fetch failed");
            Vec::new()
        }
    }
}

fn trend_points(yoy: &[PairedPoint], two_years_back: &[PairedPoint]) -> Vec<TrendPoint> {
    yoy.iter()
        .zip(two_years_back)
        .map(|(yoy, older)| TrendPoint {
            date: yoy.date,
            users: yoy.value,
            yoy_date: yoy.comparison_date,
            yoy_users: yoy.comparison_value,
            yoy_change: yoy
                .comparison_value
                .and_then(|base| compare::percentage_change(yoy.value as f64, base as f64)),
            two_years_back_date: older.comparison_date,
            two_years_back_users: older.comparison_value,
            two_years_back_change: older
                .comparison_value
                .and_then(|base| compare::percentage_change(older.value as f64, base as f64)),
        })
        .collect()
}

pub async fn build_monitor<S>(
    source: &S,
    window: ReportingWindow,
    thresholds: &Thresholds,
) -> Result<MonitorReport, MonitorError>
where
    S: ActivitySource + ?Sized,
{
    let granularity = window.granularity;
    let label = granularity.label();
    let yoy_window = calendar::aligned_comparison_window(&window, YOY_YEARS)?;
    let two_back_window = calendar::aligned_comparison_window(&window, TWO_YEARS_BACK)?;

    tracing::info!(
        metric = label,
        start = %window.start,
        end = %window.end,
        yoy_start = %yoy_window.start,
        yoy_end = %yoy_window.end,
        two_years_back_start = %two_back_window.start,
        two_years_back_end = %two_back_window.end,
        "monitor windows"
    );

    let current_query = SeriesQuery::active(window);
    let yoy_query = SeriesQuery::active(yoy_window);
    let two_back_query = SeriesQuery::active(two_back_window);
    let (current, yoy, two_back) = tokio::join!(
        source.fetch_series(&current_query),
        source.fetch_series(&yoy_query),
        source.fetch_series(&two_back_query),
    );

    let current = series::clip_to_window(current?, &window);
    let Some(latest) = current.last().copied() else {
        return Err(MonitorError::NoData(label));
    };
    let yoy = comparison_or_empty(yoy, "yoy");
    let two_back = comparison_or_empty(two_back, "two_years_back");

    let yoy_pairs = series::match_series(&current, &yoy, granularity, YOY_YEARS)?;
    let two_back_pairs = series::match_series(&current, &two_back, granularity, TWO_YEARS_BACK)?;

    let summary = series::stats(series::values(&current));
    let yoy_summary = series::stats(series::comparison_values(&yoy_pairs));
    let two_years_back_summary = series::stats(series::comparison_values(&two_back_pairs));

    let previous = current.len().checked_sub(2).map(|index| current[index]);
    let period_over_period_change = previous
        .and_then(|prev| compare::percentage_change(latest.value as f64, prev.value as f64));

    let history_start = current.len().saturating_sub(BASELINE_PERIODS + 1);
    let history = &current[history_start..current.len() - 1];
    let baseline = series::stats(series::values(history)).map_or(0.0, |stats| stats.average);
    let anomaly = compare::classify(latest.value, baseline, thresholds);

    let latest_yoy = yoy_pairs
        .last()
        .and_then(|pair| pair.comparison_value)
        .map_or(0.0, |value| value as f64);
    let yoy_result = compare::classify(latest.value, latest_yoy, thresholds);

    let avg_yoy_change = match (&summary, &yoy_summary) {
        (Some(current), Some(previous)) => {
            compare::percentage_change(current.average, previous.average)
        }
        _ => None,
    };

    tracing::info!(
        metric = label,
        points = current.len(),
        anomaly = anomaly.is_anomaly(),
        severity = ?anomaly.severity,
        "{}",
        anomaly.message(label)
    );

    Ok(MonitorReport {
        metric: label.to_string(),
        granularity,
        window,
        yoy_window,
        two_years_back_window: two_back_window,
        current_value: latest.value,
        period_over_period_change,
        trend: trend_points(&yoy_pairs, &two_back_pairs),
        has_yoy_data: yoy_summary.is_some(),
        has_two_years_back_data: two_years_back_summary.is_some(),
        summary,
        yoy_summary,
        two_years_back_summary,
        anomaly,
        yoy: yoy_result,
        avg_yoy_change,
    })
}

/// New versus existing users for `window` and its year-over-year window.
pub async fn build_composition<S>(
    source: &S,
    window: ReportingWindow,
) -> Result<CompositionReport, MonitorError>
where
    S: ActivitySource + ?Sized,
{
    let yoy_window = calendar::aligned_comparison_window(&window, YOY_YEARS)?;

    let active_query = SeriesQuery::active(window);
    let new_users_query = SeriesQuery::new_users(window);
    let yoy_active_query = SeriesQuery::active(yoy_window);
    let yoy_new_users_query = SeriesQuery::new_users(yoy_window);
    let (active, new_users, yoy_active, yoy_new_users) = tokio::join!(
        source.fetch_series(&active_query),
        source.fetch_series(&new_users_query),
        source.fetch_series(&yoy_active_query),
        source.fetch_series(&yoy_new_users_query),
    );

    let active = series::clip_to_window(active?, &window);
    if active.is_empty() {
        return Err(MonitorError::NoData(window.granularity.label()));
    }
    let new_users = series::clip_to_window(new_users?, &window);
    let yoy_active = series::clip_to_window(comparison_or_empty(yoy_active, "yoy"), &yoy_window);
    let yoy_new_users = comparison_or_empty(yoy_new_users, "yoy_new_users");

    Ok(CompositionReport {
        window,
        yoy_window,
        current: series::split_new_vs_existing(&active, &new_users),
        yoy: series::split_new_vs_existing(&yoy_active, &yoy_new_users),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{Direction, Severity};
    use crate::models::Granularity;
    use crate::source::testing::StaticSource;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn weeks(start: NaiveDate, end: NaiveDate) -> ReportingWindow {
        ReportingWindow {
            start,
            end,
            granularity: Granularity::Week,
        }
    }

    #[tokio::test]
    async fn weekly_report_pairs_every_point_with_both_comparisons() {
        let source = StaticSource::new(vec![
            (date(2025, 5, 19), 100),
            (date(2025, 5, 26), 100),
            (date(2025, 6, 2), 100),
            (date(2025, 6, 9), 140),
            (date(2024, 5, 20), 80),
            (date(2024, 5, 27), 80),
            (date(2024, 6, 3), 80),
            (date(2024, 6, 10), 100),
            (date(2023, 6, 12), 50),
        ]);
        let window = weeks(date(2025, 5, 19), date(2025, 6, 15));

        let report = build_monitor(&source, window, &Thresholds::default())
            .await
            .unwrap();

        assert_eq!(report.trend.len(), 4);
        assert_eq!(report.current_value, 140);
        assert_eq!(report.yoy_window.start, date(2024, 5, 20));
        assert_eq!(report.trend[3].yoy_date, date(2024, 6, 10));
        assert_eq!(report.trend[3].yoy_users, Some(100));
        assert_eq!(report.trend[3].two_years_back_date, date(2023, 6, 12));
        assert_eq!(report.trend[3].two_years_back_users, Some(50));
        assert_eq!(report.trend[0].two_years_back_users, None);

        assert!(report.has_yoy_data);
        assert!(report.has_two_years_back_data);
        assert_eq!(report.two_years_back_summary.as_ref().unwrap().count, 1);

        assert_eq!(report.anomaly.severity, Severity::High);
        assert_eq!(report.anomaly.direction, Direction::Up);
        assert_eq!(report.yoy.percentage_change, Some(40.0));
        assert_eq!(report.period_over_period_change, Some(40.0));

        let change = report.avg_yoy_change.unwrap();
        assert!((change - (110.0 - 85.0) / 85.0 * 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn failed_comparisons_degrade_to_missing_data() {
        let source = StaticSource::new(vec![(date(2025, 6, 2), 100), (date(2025, 6, 9), 90)])
            .failing_before(date(2025, 1, 1));
        let window = weeks(date(2025, 6, 2), date(2025, 6, 15));

        let report = build_monitor(&source, window, &Thresholds::default())
            .await
            .unwrap();

        assert!(!report.has_yoy_data);
        assert!(report.yoy_summary.is_none());
        assert!(report.trend.iter().all(|point| point.yoy_users.is_none()));
        assert_eq!(report.yoy.percentage_change, None);
        assert_eq!(report.yoy.severity, Severity::None);
    }

    #[tokio::test]
    async fn empty_current_series_is_no_data() {
        let source = StaticSource::new(Vec::new());
        let window = weeks(date(2025, 6, 2), date(2025, 6, 15));

        let err = build_monitor(&source, window, &Thresholds::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::NoData("WAU")));
    }

    #[tokio::test]
    async fn current_fetch_failure_is_an_error() {
        let source =
            StaticSource::new(vec![(date(2025, 6, 2), 100)]).failing_before(date(2030, 1, 1));
        let window = weeks(date(2025, 6, 2), date(2025, 6, 8));

        let err = build_monitor(&source, window, &Thresholds::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::Source(_)));
    }

    #[tokio::test]
    async fn composition_splits_new_and_existing() {
        let source = StaticSource::new(vec![(date(2025, 6, 2), 100), (date(2024, 6, 3), 60)])
            .with_new_users(vec![(date(2025, 6, 2), 30), (date(2024, 6, 3), 10)]);
        let window = weeks(date(2025, 6, 2), date(2025, 6, 8));

        let report = build_composition(&source, window).await.unwrap();
        assert_eq!(report.current[0].new_users, 30);
        assert_eq!(report.current[0].existing_users, 70);
        assert_eq!(report.yoy[0].existing_users, 50);
    }
}
