//! Start-up configuration. Everything read from the environment lands in
//! these structs once, in `main`.

use std::time::Duration;

use chrono::{NaiveDate, Utc};

use crate::compare::Thresholds;

pub const DEFAULT_BASE_URL: &str = "https://amplitude.com/api/2";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, clap::Args)]
pub struct AmplitudeArgs {
    #[arg(long, env = "AMPLITUDE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    #[arg(long, env = "AMPLITUDE_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,
    #[arg(long, env = "AMPLITUDE_PROJECT_ID")]
    pub project_id: Option<String>,
    #[arg(long, env = "AMPLITUDE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
    #[arg(long, env = "AMPLITUDE_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

#[derive(Debug, clap::Args)]
pub struct MonitorArgs {
    /// Changes at or below this percentage are stable
    #[arg(long, default_value_t = 10.0)]
    pub stable_pct: f64,
    /// Changes at or above this percentage are medium severity
    #[arg(long, default_value_t = 20.0)]
    pub medium_pct: f64,
    /// Changes above this percentage are high severity
    #[arg(long, default_value_t = 35.0)]
    pub high_pct: f64,
    /// Treat this date as today instead of the current UTC date
    #[arg(long)]
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct AmplitudeConfig {
    pub api_key: String,
    pub secret_key: String,
    pub project_id: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl AmplitudeConfig {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            project_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl TryFrom<AmplitudeArgs> for AmplitudeConfig {
    type Error = ConfigError;

    fn try_from(args: AmplitudeArgs) -> Result<Self, Self::Error> {
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        let api_key = present(args.api_key);
        let secret_key = present(args.secret_key);

        let mut missing = Vec::new();
        if api_key.is_none() {
            missing.push("AMPLITUDE_API_KEY");
        }
        if secret_key.is_none() {
            missing.push("AMPLITUDE_SECRET_KEY");
        }

        match (api_key, secret_key) {
            (Some(api_key), Some(secret_key)) => Ok(Self {
                project_id: present(args.project_id),
                base_url: args.base_url,
                timeout: Duration::from_secs(args.timeout_secs.max(1)),
                ..Self::new(api_key, secret_key)
            }),
            _ => Err(ConfigError::MissingCredentials(missing.join(" and "))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MonitorSettings {
    pub thresholds: Thresholds,
    pub today: Option<NaiveDate>,
}

impl MonitorSettings {
    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}

impl TryFrom<MonitorArgs> for MonitorSettings {
    type Error = ConfigError;

    fn try_from(args: MonitorArgs) -> Result<Self, Self::Error> {
        let thresholds = Thresholds {
            stable: args.stable_pct,
            medium: args.medium_pct,
            high: args.high_pct,
        };
        let ordered = 0.0 <= thresholds.stable
            && thresholds.stable <= thresholds.medium
            && thresholds.medium <= thresholds.high;
        if !ordered {
            return Err(ConfigError::InvalidThresholds(thresholds));
        }

        Ok(Self {
            thresholds,
            today: args.today,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {0}")]
    MissingCredentials(String),
    #[error("thresholds must satisfy 0 <= stable <= medium <= high, got {0:?}")]
    InvalidThresholds(Thresholds),
}
