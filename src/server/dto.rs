use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query};
use serde::Deserialize;

use crate::server::response::ApiError;
use crate::store::Page;

/// JSON body whose rejection is rendered as an error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejection is rendered as an error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::failure(format!("Invalid request body : {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::failure(format!("Invalid query : {}", rejection.body_text()))
    }
}

/// Query string accepted by list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub index: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub verbose: Option<bool>,
    /// Plugins only: leave out long descriptions and deployables.
    #[serde(default)]
    pub minimal: Option<bool>,
    /// Builds only: make the new build the project's current one.
    #[serde(default, rename = "set-current")]
    pub set_current: Option<bool>,
    // File filters
    #[serde(default)]
    pub favourite: Option<bool>,
    #[serde(default)]
    pub global: Option<bool>,
    #[serde(default)]
    pub bucket: Option<String>,
}

impl ListParams {
    #[must_use]
    pub fn page(&self) -> Page {
        Page {
            index: self.index.unwrap_or(0).max(0),
            limit: self.limit.filter(|l| *l > 0),
        }
    }

    /// The search term, if it is not blank.
    #[must_use]
    pub fn search(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults() {
        let params = ListParams::default();
        assert_eq!(params.page(), Page { index: 0, limit: None });

        let params = ListParams {
            index: Some(-3),
            limit: Some(0),
            ..ListParams::default()
        };
        assert_eq!(params.page(), Page { index: 0, limit: None });
    }

    #[test]
    fn test_blank_search_ignored() {
        let params = ListParams {
            search: Some("   ".to_string()),
            ..ListParams::default()
        };
        assert_eq!(params.search(), None);
    }
}
