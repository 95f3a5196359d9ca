use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::engine::{RemoveOutcome, RemovedItem};
use crate::error::{Error, Result as StoreResult};

/// The envelope every endpoint answers with.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub error: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

impl ApiResponse<()> {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: message.into(),
            data: None,
            count: None,
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            error: false,
            message: message.into(),
            data: Some(data),
            count: None,
        }
    }

    /// A page of results with the total number of matches.
    #[must_use]
    pub fn list(message: impl Into<String>, data: T, count: i64) -> Self {
        Self {
            error: false,
            message: message.into(),
            data: Some(data),
            count: Some(count),
        }
    }
}

/// Envelope of batch deletions.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveResponse {
    pub error: bool,
    pub message: String,
    pub items_removed: Vec<RemovedItem>,
}

impl From<RemoveOutcome> for RemoveResponse {
    fn from(outcome: RemoveOutcome) -> Self {
        Self {
            error: outcome.error,
            message: outcome.message,
            items_removed: outcome.items,
        }
    }
}

/// Message of failures whose detail only goes to the log.
pub const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error has occurred";

/// API error rendered as an error envelope with status 200, so clients only
/// inspect the envelope.
#[derive(Debug)]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn forbidden() -> Self {
        Self::failure("You do not have permission")
    }

    #[must_use]
    pub fn context(self, prefix: impl std::fmt::Display) -> Self {
        Self {
            message: format!("{prefix} : {}", self.message),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        if e.is_internal() {
            tracing::error!(pid = std::process::id(), "{e}");
            Self::failure(INTERNAL_ERROR_MESSAGE)
        } else {
            Self::failure(e.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": true, "message": self.message });
        Json(body).into_response()
    }
}

/// Extension trait for converting store results to API errors with a custom message.
pub trait StoreResultExt<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| {
            tracing::error!(pid = std::process::id(), "{message}: {e}");
            ApiError::failure(message)
        })
    }
}

/// Extension for Option types from store operations.
pub trait StoreOptionExt<T> {
    fn or_not_found(self, message: impl Into<String>) -> Result<T, ApiError>;
}

impl<T> StoreOptionExt<T> for Option<T> {
    fn or_not_found(self, message: impl Into<String>) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::failure(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_omits_missing_parts() {
        let body = serde_json::to_value(ApiResponse::message("Details updated")).unwrap();
        assert_eq!(body, json!({ "error": false, "message": "Details updated" }));

        let body =
            serde_json::to_value(ApiResponse::list("Found 0 projects", Vec::<i32>::new(), 0))
                .unwrap();
        assert_eq!(body["count"], 0);
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_every_error_answers_status_ok() {
        let response = ApiError::from(Error::QuotaExceeded).into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let response = ApiError::from(Error::Config("broken".into())).into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[test]
    fn test_internal_detail_stays_in_the_log() {
        let err = ApiError::from(Error::Config("secret path".into()));
        assert_eq!(err.message, INTERNAL_ERROR_MESSAGE);

        let err = ApiError::from(Error::QuotaExceeded);
        assert_eq!(err.message, crate::error::QUOTA_EXCEEDED_MESSAGE);
    }

    #[test]
    fn test_context_prefix() {
        let err = ApiError::failure("boom").context("Could not get builds for 'george'");
        assert_eq!(err.message, "Could not get builds for 'george' : boom");
    }
}
