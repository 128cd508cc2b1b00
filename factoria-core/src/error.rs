use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Errors surfaced at the HTTP boundary.
///
/// Every handler returns `Result<_, ApiError>`; the `IntoResponse` impl turns
/// each variant into a JSON body with `error` and `detail` fields and the
/// matching status code. Nothing here ever crashes the process.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, malformed or unverifiable bearer token.
    #[error("not authenticated: {0}")]
    Authentication(String),

    /// Valid identity without the required role.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Malformed input.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The AI extraction pipeline produced a failure record.
    #[error("extraction failed: {detail}")]
    Extraction { detail: String, resumen: String },

    /// Blob store, document store or identity provider failure.
    #[error("dependency failure: {0}")]
    Dependency(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Authorization(_) => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Extraction { .. } | ApiError::Dependency(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn category(&self) -> &'static str {
        match self {
            ApiError::Authentication(_) => "not authenticated",
            ApiError::Authorization(_) => "not authorized",
            ApiError::Validation(_) => "invalid request",
            ApiError::NotFound(_) => "not found",
            ApiError::Extraction { .. } => "AI processing failed",
            ApiError::Dependency(_) => "dependency failure",
        }
    }

    fn detail(&self) -> &str {
        match self {
            ApiError::Authentication(d)
            | ApiError::Authorization(d)
            | ApiError::Validation(d)
            | ApiError::NotFound(d)
            | ApiError::Dependency(d) => d,
            ApiError::Extraction { detail, .. } => detail,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!("{}", self);
        } else {
            warn!("{}", self);
        }

        let mut body = json!({
            "error": self.category(),
            "detail": self.detail(),
        });
        if let ApiError::Extraction { resumen, .. } = &self {
            body["resumen"] = json!(resumen);
        }

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Dependency(format!("document store: {}", err))
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Dependency(format!("blob store: {}", err))
    }
}
