use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

/// Domain-specific error types for the forecasting service.
/// Every kind crosses the core boundary unchanged; the HTTP layer maps
/// them to a status code and a `{ "error": message }` body.
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("{0}")]
    Validation(String),

    /// Upstream non-success status, or a transport failure (`status` is None).
    /// Displays the upstream message verbatim.
    #[error("{message}")]
    Provider {
        provider: &'static str,
        status: Option<u16>,
        message: String,
    },

    #[error("Failed to parse model output: {0}")]
    Parse(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("cache error: {0}")]
    Cache(String),
}

impl ForecastError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ForecastError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ForecastError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<csv::Error> for ForecastError {
    fn from(e: csv::Error) -> Self {
        ForecastError::Validation(format!("invalid CSV: {e}"))
    }
}

pub type ForecastResult<T> = Result<T, ForecastError>;
