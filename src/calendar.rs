use chrono::{Datelike, Days, Duration, Months, NaiveDate};

use crate::models::{Granularity, ReportingWindow};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalendarError {
    #[error("period count must be at least 1")]
    InvalidCount,
    #[error("month {0} is not a calendar month")]
    InvalidMonth(u32),
    #[error("year {0} is outside the supported calendar range")]
    YearOutOfRange(i64),
    #[error("no complete {granularity} has elapsed on or before {end}")]
    EmptyWindow {
        granularity: Granularity,
        end: NaiveDate,
    },
    #[error("aligned window {start} to {end} ends before it starts")]
    InvertedWindow { start: NaiveDate, end: NaiveDate },
}

pub fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate, CalendarError> {
    if !(1..=12).contains(&month) {
        return Err(CalendarError::InvalidMonth(month));
    }

    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or(CalendarError::YearOutOfRange(year.into()))?;
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or(CalendarError::YearOutOfRange(year.into()))
}

pub fn is_month_end(date: NaiveDate) -> bool {
    date.succ_opt().map_or(true, |next| next.month() != date.month())
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

fn years_before(year: i32, years_back: u32) -> Result<i32, CalendarError> {
    let target = i64::from(year) - i64::from(years_back);
    i32::try_from(target).map_err(|_| CalendarError::YearOutOfRange(target))
}

/// Same month and day in `year`, falling back to the month's last day when
/// the day does not exist there (Feb 29 in a common year).
fn same_day_in_year(year: i32, month: u32, day: u32) -> Result<NaiveDate, CalendarError> {
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => Ok(date),
        None => last_day_of_month(year, month),
    }
}

/// Maps `source` into `target_year`, landing on the same weekday within three
/// days of the naive same-calendar-date mapping.
///
/// The weekday difference is normalised into `[-3, 3]` by a single +/-7
/// correction, so a shift near January 1st or December 31st may cross into
/// the neighbouring year. `find_aligned_date(d, d.year())` is always `d`.
pub fn find_aligned_date(source: NaiveDate, target_year: i32) -> Result<NaiveDate, CalendarError> {
    let candidate = same_day_in_year(target_year, source.month(), source.day())?;

    let source_weekday = i64::from(source.weekday().num_days_from_monday());
    let candidate_weekday = i64::from(candidate.weekday().num_days_from_monday());

    let mut offset = source_weekday - candidate_weekday;
    if offset > 3 {
        offset -= 7;
    } else if offset < -3 {
        offset += 7;
    }

    candidate
        .checked_add_signed(Duration::days(offset))
        .ok_or(CalendarError::YearOutOfRange(target_year.into()))
}

/// Same month and day `years_back` years earlier. Month ends stay month ends,
/// so a window ending 2025-02-28 maps to one ending 2024-02-29.
pub fn shift_years(date: NaiveDate, years_back: u32) -> Result<NaiveDate, CalendarError> {
    let year = years_before(date.year(), years_back)?;
    if is_month_end(date) {
        last_day_of_month(year, date.month())
    } else {
        same_day_in_year(year, date.month(), date.day())
    }
}

/// Aligns a single date `years_back` years earlier: weekday-aligned for daily
/// and weekly reporting, calendar-aligned for monthly reporting.
pub fn align_date(
    date: NaiveDate,
    granularity: Granularity,
    years_back: u32,
) -> Result<NaiveDate, CalendarError> {
    match granularity {
        Granularity::Day | Granularity::Week => {
            find_aligned_date(date, years_before(date.year(), years_back)?)
        }
        Granularity::Month => shift_years(date, years_back),
    }
}

/// Aligns both endpoints of `window` `years_back` years earlier.
///
/// Each endpoint is shifted on its own, so a window of a few days around a
/// leap day can come out inverted for some year distances. That case is an
/// `InvertedWindow` error rather than a window with `start > end`.
pub fn aligned_comparison_window(
    window: &ReportingWindow,
    years_back: u32,
) -> Result<ReportingWindow, CalendarError> {
    let start = align_date(window.start, window.granularity, years_back)?;
    let end = align_date(window.end, window.granularity, years_back)?;
    if end < start {
        return Err(CalendarError::InvertedWindow { start, end });
    }

    Ok(ReportingWindow {
        start,
        end,
        granularity: window.granularity,
    })
}

/// Builds a window of `count` complete periods ending no later than
/// `reference_end`. `today` is the caller's current date; it is never
/// complete, so nothing on or after it is included.
///
/// Weeks run Monday through Sunday.
pub fn build_window(
    granularity: Granularity,
    reference_end: NaiveDate,
    count: u32,
    today: NaiveDate,
) -> Result<ReportingWindow, CalendarError> {
    if count == 0 {
        return Err(CalendarError::InvalidCount);
    }

    let yesterday = today
        .pred_opt()
        .ok_or(CalendarError::YearOutOfRange(today.year().into()))?;
    let last_complete_day = reference_end.min(yesterday);
    let out_of_range = || CalendarError::YearOutOfRange(last_complete_day.year().into());

    let (start, end) = match granularity {
        Granularity::Day => {
            let end = last_complete_day;
            let start = end
                .checked_sub_days(Days::new(u64::from(count - 1)))
                .ok_or_else(out_of_range)?;
            (start, end)
        }
        Granularity::Week => {
            let past_sunday = (last_complete_day.weekday().num_days_from_monday() + 1) % 7;
            let end = last_complete_day
                .checked_sub_days(Days::new(u64::from(past_sunday)))
                .ok_or_else(out_of_range)?;
            let start = end
                .checked_sub_days(Days::new(u64::from(count) * 7 - 1))
                .ok_or_else(out_of_range)?;
            (start, end)
        }
        Granularity::Month => {
            let end = if is_month_end(last_complete_day) {
                last_complete_day
            } else {
                first_of_month(last_complete_day)
                    .pred_opt()
                    .ok_or_else(out_of_range)?
            };
            let start = first_of_month(end)
                .checked_sub_months(Months::new(count - 1))
                .ok_or_else(out_of_range)?;
            (start, end)
        }
    };

    Ok(ReportingWindow {
        start,
        end,
        granularity,
    })
}

/// Daily window covering one calendar month, cut at yesterday while the
/// month is still in progress.
pub fn month_of_days(
    year: i32,
    month: u32,
    today: NaiveDate,
) -> Result<ReportingWindow, CalendarError> {
    let month_end = last_day_of_month(year, month)?;
    let start = first_of_month(month_end);
    let end = match today.pred_opt() {
        Some(yesterday) => month_end.min(yesterday),
        None => month_end,
    };

    if end < start {
        return Err(CalendarError::EmptyWindow {
            granularity: Granularity::Day,
            end,
        });
    }

    Ok(ReportingWindow {
        start,
        end,
        granularity: Granularity::Day,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn window(granularity: Granularity, start: NaiveDate, end: NaiveDate) -> ReportingWindow {
        ReportingWindow {
            start,
            end,
            granularity,
        }
    }

    #[test]
    fn aligned_date_keeps_weekday_for_every_day() {
        let mut day = date(2023, 1, 1);
        while day <= date(2025, 12, 31) {
            for target_year in [1999, 2019, 2022, 2024, 2026, 2031] {
                let aligned = find_aligned_date(day, target_year).unwrap();
                assert_eq!(aligned.weekday(), day.weekday(), "{day} -> {target_year}");

                let naive = same_day_in_year(target_year, day.month(), day.day()).unwrap();
                assert!((aligned - naive).num_days().abs() <= 3);
            }
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn aligned_date_is_identity_within_same_year() {
        let mut day = date(2024, 1, 1);
        while day <= date(2025, 12, 31) {
            assert_eq!(find_aligned_date(day, day.year()).unwrap(), day);
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn leap_day_falls_back_to_end_of_february() {
        let source = date(2024, 2, 29);
        assert_eq!(source.weekday(), Weekday::Thu);
        assert_eq!(same_day_in_year(2025, 2, 29).unwrap(), date(2025, 2, 28));

        let aligned = find_aligned_date(source, 2025).unwrap();
        assert_eq!(aligned, date(2025, 2, 27));
        assert_eq!(aligned.weekday(), Weekday::Thu);
    }

    #[test]
    fn aligned_date_works_far_from_source_year() {
        let source = date(2025, 6, 2);
        let aligned = find_aligned_date(source, 1900).unwrap();
        assert_eq!(aligned.weekday(), Weekday::Mon);
        assert_eq!(aligned.year(), 1900);

        let forward = find_aligned_date(source, 2040).unwrap();
        assert_eq!(forward.weekday(), Weekday::Mon);
    }

    #[test]
    fn week_window_aligns_each_endpoint_by_weekday() {
        let current = window(Granularity::Week, date(2025, 6, 2), date(2025, 6, 8));
        let yoy = aligned_comparison_window(&current, 1).unwrap();

        assert_eq!(yoy.start, date(2024, 6, 3));
        assert_eq!(yoy.end, date(2024, 6, 9));
        assert_eq!(yoy.start.weekday(), Weekday::Mon);
        assert_eq!(yoy.end.weekday(), Weekday::Sun);

        let naive = current.start - Duration::days(365);
        assert_ne!(naive.weekday(), current.start.weekday());
    }

    #[test]
    fn zero_years_back_is_identity() {
        let windows = [
            window(Granularity::Day, date(2024, 2, 1), date(2024, 2, 29)),
            window(Granularity::Week, date(2024, 12, 30), date(2025, 1, 5)),
            window(Granularity::Month, date(2024, 3, 1), date(2025, 2, 28)),
        ];
        for current in windows {
            assert_eq!(aligned_comparison_window(&current, 0).unwrap(), current);
        }
    }

    #[test]
    fn inverted_leap_day_window_is_rejected() {
        let current = window(Granularity::Day, date(2028, 2, 28), date(2028, 2, 29));
        assert_eq!(
            aligned_comparison_window(&current, 3),
            Err(CalendarError::InvertedWindow {
                start: date(2025, 3, 3),
                end: date(2025, 2, 25),
            })
        );

        let yoy = aligned_comparison_window(&current, 1).unwrap();
        assert_eq!(yoy.start, date(2027, 3, 1));
        assert_eq!(yoy.end, date(2027, 3, 2));
    }

    #[test]
    fn month_window_shifts_calendar_months() {
        let current = window(Granularity::Month, date(2024, 3, 1), date(2025, 2, 28));
        let yoy = aligned_comparison_window(&current, 1).unwrap();
        assert_eq!(yoy.start, date(2023, 3, 1));
        assert_eq!(yoy.end, date(2024, 2, 29));

        let two_back = aligned_comparison_window(&current, 2).unwrap();
        assert_eq!(two_back.start, date(2022, 3, 1));
        assert_eq!(two_back.end, date(2023, 2, 28));
    }

    #[test]
    fn day_window_ends_yesterday_when_today_is_reference() {
        let today = date(2025, 6, 10);
        let built = build_window(Granularity::Day, today, 7, today).unwrap();
        assert_eq!(built.end, date(2025, 6, 9));
        assert_eq!(built.start, date(2025, 6, 3));

        let past = build_window(Granularity::Day, date(2025, 5, 31), 1, today).unwrap();
        assert_eq!(past.start, date(2025, 5, 31));
        assert_eq!(past.end, date(2025, 5, 31));
    }

    #[test]
    fn week_window_excludes_the_week_in_progress() {
        let tuesday = date(2025, 6, 10);
        let built = build_window(Granularity::Week, tuesday, 2, tuesday).unwrap();
        assert_eq!(built.end, date(2025, 6, 8));
        assert_eq!(built.start, date(2025, 5, 26));
        assert_eq!(built.start.weekday(), Weekday::Mon);

        let monday = date(2025, 6, 9);
        let built = build_window(Granularity::Week, monday, 1, monday).unwrap();
        assert_eq!(built.start, date(2025, 6, 2));
        assert_eq!(built.end, date(2025, 6, 8));

        let sunday = date(2025, 6, 8);
        let built = build_window(Granularity::Week, sunday, 1, sunday).unwrap();
        assert_eq!(built.end, date(2025, 6, 1));
    }

    #[test]
    fn month_window_excludes_the_month_in_progress() {
        let today = date(2025, 6, 10);
        let built = build_window(Granularity::Month, today, 12, today).unwrap();
        assert_eq!(built.start, date(2024, 6, 1));
        assert_eq!(built.end, date(2025, 5, 31));

        let first_of_july = date(2025, 7, 1);
        let built = build_window(Granularity::Month, first_of_july, 3, first_of_july).unwrap();
        assert_eq!(built.start, date(2025, 4, 1));
        assert_eq!(built.end, date(2025, 6, 30));
    }

    #[test]
    fn zero_count_is_rejected() {
        let today = date(2025, 6, 10);
        assert_eq!(
            build_window(Granularity::Day, today, 0, today),
            Err(CalendarError::InvalidCount)
        );
    }

    #[test]
    fn month_of_days_stops_at_yesterday() {
        let in_progress = month_of_days(2025, 6, date(2025, 6, 10)).unwrap();
        assert_eq!(in_progress.start, date(2025, 6, 1));
        assert_eq!(in_progress.end, date(2025, 6, 9));

        let finished = month_of_days(2024, 2, date(2025, 6, 10)).unwrap();
        assert_eq!(finished.end, date(2024, 2, 29));

        assert!(matches!(
            month_of_days(2025, 6, date(2025, 6, 1)),
            Err(CalendarError::EmptyWindow { .. })
        ));
        assert_eq!(
            month_of_days(2025, 13, date(2025, 6, 1)),
            Err(CalendarError::InvalidMonth(13))
        );
    }
}
