use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::calendar::{self, CalendarError};
use crate::models::{
    CompositionPoint, Granularity, PairedPoint, ReportingWindow, SeriesStats, TimeSeriesPoint,
};

/// Sorts by date and drops duplicate dates, keeping the last value seen.
pub fn normalize(points: Vec<TimeSeriesPoint>) -> Vec<TimeSeriesPoint> {
    let by_date: BTreeMap<NaiveDate, u64> =
        points.into_iter().map(|point| (point.date, point.value)).collect();
    by_date
        .into_iter()
        .map(|(date, value)| TimeSeriesPoint::new(date, value))
        .collect()
}

/// Keeps the buckets that fall inside `window`, then the trailing
/// `window.periods()` of them. Upstream buckets past the window end (an
/// in-progress period) are dropped.
pub fn clip_to_window(points: Vec<TimeSeriesPoint>, window: &ReportingWindow) -> Vec<TimeSeriesPoint> {
    let mut kept: Vec<TimeSeriesPoint> = normalize(points)
        .into_iter()
        .filter(|point| window.contains(point.date))
        .collect();

    let periods = window.periods();
    if kept.len() > periods {
        kept.drain(..kept.len() - periods);
    }
    kept
}

/// Pairs every current point with the comparison point on its own aligned
/// date. Missing comparison dates pair with `None`.
pub fn match_series(
    current: &[TimeSeriesPoint],
    comparison: &[TimeSeriesPoint],
    granularity: Granularity,
    years_back: u32,
) -> Result<Vec<PairedPoint>, CalendarError> {
    let lookup: HashMap<NaiveDate, u64> = comparison
        .iter()
        .map(|point| (point.date, point.value))
        .collect();

    current
        .iter()
        .map(|point| {
            let comparison_date = calendar::align_date(point.date, granularity, years_back)?;
            Ok(PairedPoint {
                date: point.date,
                value: point.value,
                comparison_date,
                comparison_value: lookup.get(&comparison_date).copied(),
            })
        })
        .collect()
}

/// Average, max and min over the present values. `None` when there are none,
/// which callers report as "no data" rather than zero activity.
pub fn stats<I>(values: I) -> Option<SeriesStats>
where
    I: IntoIterator<Item = Option<u64>>,
{
    let present: Vec<u64> = values.into_iter().flatten().collect();
    let max = *present.iter().max()?;
    let min = *present.iter().min()?;
    let total: u64 = present.iter().sum();

    Some(SeriesStats {
        count: present.len(),
        average: total as f64 / present.len() as f64,
        max,
        min,
    })
}

pub fn values(points: &[TimeSeriesPoint]) -> impl Iterator<Item = Option<u64>> + '_ {
    points.iter().map(|point| Some(point.value))
}

pub fn comparison_values(points: &[PairedPoint]) -> impl Iterator<Item = Option<u64>> + '_ {
    points.iter().map(|point| point.comparison_value)
}

/// Splits active users into new and existing per bucket. New users are
/// matched by date; a bucket with no new-user data counts everyone as
/// existing.
pub fn split_new_vs_existing(
    active: &[TimeSeriesPoint],
    new_users: &[TimeSeriesPoint],
) -> Vec<CompositionPoint> {
    let lookup: HashMap<NaiveDate, u64> = new_users
        .iter()
        .map(|point| (point.date, point.value))
        .collect();

    active
        .iter()
        .map(|point| {
            let new_count = lookup.get(&point.date).copied().unwrap_or(0);
            CompositionPoint {
                date: point.date,
                new_users: new_count,
                existing_users: point.value.saturating_sub(new_count),
            }
        })
        .collect()
}
