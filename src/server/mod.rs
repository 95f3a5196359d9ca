mod api;
pub mod dto;
mod guards;
pub mod response;
mod router;

pub use router::{AppState, create_router};
