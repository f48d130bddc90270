//! HTTP mapping of [`BookError`].

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, warn};

use crate::types::{BookError, Result};

/// Error body returned by every JSON route
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl From<&BookError> for ErrorBody {
    fn from(err: &BookError) -> Self {
        let error = match err {
            BookError::Conflict { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self {
            error,
            code: err.code().map(str::to_string),
        }
    }
}

impl IntoResponse for BookError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(%status, "Request failed: {}", self);
        } else {
            warn!(%status, "Request rejected: {}", self);
        }
        (status, Json(ErrorBody::from(&self))).into_response()
    }
}

/// Unwrap a JSON body, turning malformed input into a validation error
pub fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| BookError::validation(rejection.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CONTENT_CHANGED;

    #[test]
    fn test_conflict_body_carries_code() {
        let err = BookError::Conflict {
            code: CONTENT_CHANGED.to_string(),
            message: "Re-run the analysis.".to_string(),
        };
        let body = serde_json::to_value(ErrorBody::from(&err)).unwrap();
        assert_eq!(body["error"], "Re-run the analysis.");
        assert_eq!(body["code"], CONTENT_CHANGED);
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_internal_error_has_no_code() {
        let err = BookError::Config("missing api key".to_string());
        let body = serde_json::to_value(ErrorBody::from(&err)).unwrap();
        assert!(body.get("code").is_none());
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
