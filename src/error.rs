use thiserror::Error;

use crate::schema::ValidationError;

pub const QUOTA_EXCEEDED_MESSAGE: &str =
    "You cannot create more projects on this plan. Please consider upgrading your account";

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{}", first_message(.0))]
    Validation(Vec<ValidationError>),

    #[error("{0}")]
    NotFound(String),

    #[error("Please login to make this call")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{QUOTA_EXCEEDED_MESSAGE}")]
    QuotaExceeded,

    #[error("An error has occurred while linking the build with a project")]
    LinkFailure,

    #[error("already exists")]
    AlreadyExists,

    #[error("token lookup collision")]
    TokenLookupCollision,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid token format")]
    InvalidTokenFormat,

    #[error("{0}")]
    BadRequest(String),
}

fn first_message(errors: &[ValidationError]) -> String {
    errors
        .first()
        .map(|e| e.message.clone())
        .unwrap_or_else(|| "validation failed".to_string())
}

impl Error {
    /// True for failures of the store or the process rather than of the request.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::Json(_) | Error::Io(_) | Error::Config(_)
        )
    }
}

impl From<Vec<ValidationError>> for Error {
    fn from(errors: Vec<ValidationError>) -> Self {
        Error::Validation(errors)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
