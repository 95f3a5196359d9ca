use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::helpers::{TokenValidationError, extract_token_from_header, validate_token};
use crate::server::AppState;
use crate::server::response::INTERNAL_ERROR_MESSAGE;
use crate::types::Caller;

/// The caller if the request carries credentials. Invalid credentials are
/// still rejected.
pub struct MaybeCaller(pub Option<Caller>);

/// Extractor that requires any valid authentication
pub struct RequireAuth(pub Caller);

/// Extractor that requires an elevated caller (admin or super admin)
pub struct RequireAdmin(pub Caller);

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    NotAdmin,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingAuth => "You must be logged in to make this request",
            AuthError::InvalidScheme => "Invalid authorization scheme",
            AuthError::InvalidToken => "Invalid token",
            AuthError::TokenExpired => "Token expired",
            AuthError::NotAdmin => "You do not have permission",
            AuthError::InternalError => INTERNAL_ERROR_MESSAGE,
        };

        Json(json!({ "error": true, "message": message })).into_response()
    }
}

impl From<TokenValidationError> for AuthError {
    fn from(e: TokenValidationError) -> Self {
        match e {
            TokenValidationError::InvalidScheme => AuthError::InvalidScheme,
            TokenValidationError::InvalidToken => AuthError::InvalidToken,
            TokenValidationError::TokenExpired => AuthError::TokenExpired,
            TokenValidationError::InternalError => AuthError::InternalError,
        }
    }
}

impl FromRequestParts<Arc<AppState>> for MaybeCaller {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeCaller(extract_caller(parts, state)?))
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let caller = extract_caller(parts, state)?.ok_or(AuthError::MissingAuth)?;
        Ok(RequireAuth(caller))
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let caller = extract_caller(parts, state)?.ok_or(AuthError::MissingAuth)?;

        if !caller.is_elevated() {
            return Err(AuthError::NotAdmin);
        }

        Ok(RequireAdmin(caller))
    }
}

fn extract_caller(parts: &Parts, state: &Arc<AppState>) -> Result<Option<Caller>, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(raw_token) = extract_token_from_header(auth_header)? else {
        return Ok(None);
    };

    let token = validate_token(state.store.as_ref(), &raw_token)?;
    Ok(Some(Caller::new(token.username, token.privileges)))
}
