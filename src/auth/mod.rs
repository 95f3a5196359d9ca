mod helpers;
mod middleware;
mod token;

pub use helpers::{TokenValidationError, extract_token_from_header, validate_token};
pub use middleware::{AuthError, MaybeCaller, RequireAdmin, RequireAuth};
pub use token::{TokenGenerator, issue_token, parse_token};
