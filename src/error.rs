use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("League data error: {0}")]
    League(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Fetch(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Error bodies use the same `{"error": ...}` shape the proxy emits.
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Why a single upstream request failed, before any cache fallback is
/// considered.
#[derive(Debug, Clone, Error)]
pub enum FetchFailure {
    /// The request never produced a response (DNS, connect, timeout).
    #[error("network: {0}")]
    Network(String),

    /// The proxy answered with a non-2xx status or an `{"error": ...}` body.
    #[error("upstream: {0}")]
    Upstream(String),

    /// The response body was not the JSON we expected.
    #[error("decode: {0}")]
    Decode(String),
}

/// What a caller of the cached fetcher actually has to handle. Either an
/// expired cache entry is still around to fall back on, or there is nothing.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch failed for `{key}` ({cause}); expired cache entry available")]
    Stale {
        key: String,
        payload: serde_json::Value,
        cause: FetchFailure,
    },

    #[error("fetch failed for `{key}` ({cause}); no cached data")]
    Unavailable { key: String, cause: FetchFailure },
}

impl FetchError {
    pub fn key(&self) -> &str {
        match self {
            FetchError::Stale { key, .. } | FetchError::Unavailable { key, .. } => key,
        }
    }

    pub fn cause(&self) -> &FetchFailure {
        match self {
            FetchError::Stale { cause, .. } | FetchError::Unavailable { cause, .. } => cause,
        }
    }

    /// Consumes the error, yielding the expired payload if one survived.
    pub fn into_stale_payload(self) -> Option<serde_json::Value> {
        match self {
            FetchError::Stale { payload, .. } => Some(payload),
            FetchError::Unavailable { .. } => None,
        }
    }
}
