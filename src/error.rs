use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors, one variant per failure category
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Streaming API rejected our credentials or the OAuth exchange failed
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Streaming API answered with a non-auth failure
    #[error("Streaming API error: {0}")]
    StreamingApi(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Feature store connectivity, read or write failure
    #[error("Feature store error: {0}")]
    FeatureStore(String),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// Anything that went wrong while encoding, fitting or querying the model
    #[error("Error getting recommendations: {0}")]
    Recommendation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Another action is still running for the same session
    #[error("Session busy: {0}")]
    Busy(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::FeatureStore(err.to_string())
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::StreamingApi(_) | AppError::HttpClient(_) | AppError::FeatureStore(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Busy(_) => StatusCode::CONFLICT,
            AppError::Cache(_) | AppError::Recommendation(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            AppError::NotFound(msg) | AppError::InvalidInput(msg) | AppError::Busy(msg) => msg,
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(status = %status, error = %message, "Request failed");
        }

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
