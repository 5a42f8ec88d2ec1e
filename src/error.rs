use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::calendar::CalendarError;
use crate::source::SourceError;

/// Failures surfaced by report assembly and the HTTP routes.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("No {0} data available")]
    NoData(&'static str),
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl MonitorError {
    pub fn status(&self) -> StatusCode {
        match self {
            MonitorError::Calendar(CalendarError::EmptyWindow { .. }) => StatusCode::NOT_FOUND,
            MonitorError::Calendar(_) | MonitorError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            MonitorError::NoData(_) => StatusCode::NOT_FOUND,
            MonitorError::Source(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for MonitorError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}
