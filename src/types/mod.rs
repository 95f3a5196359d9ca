mod models;
mod privilege;

pub use models::*;
pub use privilege::{AccessLevel, Caller, Plan, PrivilegeTier};
