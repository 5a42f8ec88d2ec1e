use std::fmt::Write;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{MonitorReport, SeriesStats};

fn format_change(change: Option<f64>) -> String {
    match change {
        Some(value) => format!("{value:+.1}%"),
        None => "n/a".to_string(),
    }
}

fn format_count(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}

fn summary_line(output: &mut String, label: &str, stats: Option<&SeriesStats>) {
    match stats {
        Some(stats) => {
            let _ = writeln!(
                output,
                "- {}: avg {:.0}, peak {}, low {} across {} periods",
                label, stats.average, stats.max, stats.min, stats.count
            );
        }
        None => {
            let _ = writeln!(output, "- {}: no data available", label);
        }
    }
}

pub fn build_report(report: &MonitorReport) -> String {
    let label = report.metric.as_str();
    let mut output = String::new();

    let _ = writeln!(output, "# {} Monitor Report", label);
    let _ = writeln!(
        output,
        "Generated for {} through {} ({} granularity)",
        report.window.start, report.window.end, report.granularity
    );
    let _ = writeln!(
        output,
        "Compared against {} through {} and {} through {}",
        report.yoy_window.start,
        report.yoy_window.end,
        report.two_years_back_window.start,
        report.two_years_back_window.end
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Status");
    let _ = writeln!(output, "- Current {}: {}", label, report.current_value);
    let _ = writeln!(
        output,
        "- Change vs previous period: {}",
        format_change(report.period_over_period_change)
    );
    let _ = writeln!(output, "- {}", report.anomaly.message(label));
    let _ = writeln!(output, "- Year over year: {}", report.yoy.message(label));
    let _ = writeln!(
        output,
        "- Average vs last year: {}",
        format_change(report.avg_yoy_change)
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    summary_line(&mut output, "Current period", report.summary.as_ref());
    summary_line(&mut output, "Last year", report.yoy_summary.as_ref());
    summary_line(&mut output, "Two years back", report.two_years_back_summary.as_ref());

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trend");
    let _ = writeln!(
        output,
        "| Date | Users | Last year | Change | Two years back | Change |"
    );
    let _ = writeln!(output, "| --- | ---: | ---: | ---: | ---: | ---: |");
    for point in &report.trend {
        let _ = writeln!(
            output,
            "| {} | {} | {} ({}) | {} | {} ({}) | {} |",
            point.date,
            point.users,
            format_count(point.yoy_users),
            point.yoy_date,
            format_change(point.yoy_change),
            format_count(point.two_years_back_users),
            point.two_years_back_date,
            format_change(point.two_years_back_change)
        );
    }

    output
}

#[derive(Debug, Serialize)]
struct TrendRow {
    date: NaiveDate,
    users: u64,
    yoy_date: NaiveDate,
    yoy_users: Option<u64>,
    two_years_back_date: NaiveDate,
    two_years_back_users: Option<u64>,
}

pub fn write_trend_csv(report: &MonitorReport, path: &Path) -> Result<usize, csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    for point in &report.trend {
        writer.serialize(TrendRow {
            date: point.date,
            users: point.users,
            yoy_date: point.yoy_date,
            yoy_users: point.yoy_users,
            two_years_back_date: point.two_years_back_date,
            two_years_back_users: point.two_years_back_users,
        })?;
    }
    writer.flush()?;
    Ok(report.trend.len())
}
