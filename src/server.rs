use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar;
use crate::config::MonitorSettings;
use crate::error::MonitorError;
use crate::models::{CompositionReport, Granularity, MonitorReport};
use crate::monitor;
use crate::source::{ActivitySource, ProbeResult};

pub const DEFAULT_PERIODS: u32 = 12;
pub const MAX_WEEKS: u32 = 104;
pub const MAX_MONTHS: u32 = 60;

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn ActivitySource>,
    pub settings: MonitorSettings,
}

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub data: T,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        timestamp: Utc::now(),
        data,
    })
}

#[derive(Debug, Deserialize)]
pub struct MonthParams {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct WeeksParams {
    pub weeks: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct MonthsParams {
    pub months: Option<u32>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/dau-monitor", get(dau_monitor))
        .route("/api/wau-monitor", get(wau_monitor))
        .route("/api/mau-monitor", get(mau_monitor))
        .route("/api/wau-composition", get(wau_composition))
        .route("/api/test-amplitude", get(test_amplitude))
        .with_state(state)
}

fn params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, MonitorError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| MonitorError::InvalidParameter(rejection.body_text()))
}

fn period_count(name: &str, value: Option<u32>, max: u32) -> Result<u32, MonitorError> {
    let count = value.unwrap_or(DEFAULT_PERIODS);
    if count == 0 || count > max {
        return Err(MonitorError::InvalidParameter(format!(
            "{name} must be between 1 and {max}"
        )));
    }
    Ok(count)
}

#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
async fn dau_monitor(
    State(state): State<AppState>,
    query: Result<Query<MonthParams>, QueryRejection>,
) -> Result<Json<Envelope<MonitorReport>>, MonitorError> {
    let params = params(query)?;
    let today = state.settings.today();
    let year = params.year.unwrap_or(today.year());
    let month = params.month.unwrap_or(today.month());

    let window = calendar::month_of_days(year, month, today)?;
    let report =
        monitor::build_monitor(state.source.as_ref(), window, &state.settings.thresholds).await?;
    Ok(ok(report))
}

#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
async fn wau_monitor(
    State(state): State<AppState>,
    query: Result<Query<WeeksParams>, QueryRejection>,
) -> Result<Json<Envelope<MonitorReport>>, MonitorError> {
    let weeks = period_count("weeks", params(query)?.weeks, MAX_WEEKS)?;
    let today = state.settings.today();

    let window = calendar::build_window(Granularity::Week, today, weeks, today)?;
    let report =
        monitor::build_monitor(state.source.as_ref(), window, &state.settings.thresholds).await?;
    Ok(ok(report))
}

#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
async fn mau_monitor(
    State(state): State<AppState>,
    query: Result<Query<MonthsParams>, QueryRejection>,
) -> Result<Json<Envelope<MonitorReport>>, MonitorError> {
    let months = period_count("months", params(query)?.months, MAX_MONTHS)?;
    let today = state.settings.today();

    let window = calendar::build_window(Granularity::Month, today, months, today)?;
    let report =
        monitor::build_monitor(state.source.as_ref(), window, &state.settings.thresholds).await?;
    Ok(ok(report))
}

#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
async fn wau_composition(
    State(state): State<AppState>,
    query: Result<Query<WeeksParams>, QueryRejection>,
) -> Result<Json<Envelope<CompositionReport>>, MonitorError> {
    let weeks = period_count("weeks", params(query)?.weeks, MAX_WEEKS)?;
    let today = state.settings.today();

    let window = calendar::build_window(Granularity::Week, today, weeks, today)?;
    let report = monitor::build_composition(state.source.as_ref(), window).await?;
    Ok(ok(report))
}

#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
async fn test_amplitude(State(state): State<AppState>) -> Json<Envelope<Vec<ProbeResult>>> {
    ok(state.source.diagnostics().await)
}
