use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

/// Percentage bands applied to the magnitude of a change.
///
/// `|change| <= stable` is no severity, `|change| >= medium` is medium and
/// `|change| > high` is high; anything in between is low.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub stable: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            stable: 10.0,
            medium: 20.0,
            high: 35.0,
        }
    }
}

impl Thresholds {
    pub fn severity(&self, change: f64) -> Severity {
        let magnitude = change.abs();
        if magnitude <= self.stable {
            Severity::None
        } else if magnitude > self.high {
            Severity::High
        } else if magnitude >= self.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub current_value: u64,
    pub comparison_average: f64,
    pub percentage_change: Option<f64>,
    pub severity: Severity,
    pub direction: Direction,
}

impl ComparisonResult {
    pub fn is_anomaly(&self) -> bool {
        self.severity != Severity::None
    }

    pub fn message(&self, label: &str) -> String {
        let Some(change) = self.percentage_change else {
            return format!("NO BASELINE: {label} has no comparison data");
        };
        let baseline = self.comparison_average.round();

        match (self.direction, self.severity) {
            (Direction::Flat, _) | (_, Severity::None) => {
                format!("STABLE: {label} within normal range ({change:.1}% change)")
            }
            (Direction::Up, _) => format!(
                "GOOD: {label} increased by {change:.1}% ({} vs avg {baseline})",
                self.current_value
            ),
            (Direction::Down, severity) => {
                let tag = match severity {
                    Severity::High => "CRITICAL",
                    Severity::Medium => "WARNING",
                    _ => "NOTICE",
                };
                format!(
                    "{tag}: {label} dropped by {:.1}% ({} vs avg {baseline})",
                    change.abs(),
                    self.current_value
                )
            }
        }
    }
}

/// `(current - baseline) / baseline * 100`, or `None` when the baseline is
/// zero or not finite.
pub fn percentage_change(current: f64, baseline: f64) -> Option<f64> {
    if baseline == 0.0 || !baseline.is_finite() {
        return None;
    }
    Some((current - baseline) / baseline * 100.0)
}

pub fn classify(current: u64, historical_average: f64, thresholds: &Thresholds) -> ComparisonResult {
    let change = percentage_change(current as f64, historical_average);
    let severity = change.map_or(Severity::None, |value| thresholds.severity(value));
    let direction = match change {
        Some(value) if severity != Severity::None && value > 0.0 => Direction::Up,
        Some(value) if severity != Severity::None && value < 0.0 => Direction::Down,
        _ => Direction::Flat,
    };

    ComparisonResult {
        current_value: current,
        comparison_average: historical_average,
        percentage_change: change,
        severity,
        direction,
    }
}
