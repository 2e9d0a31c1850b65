//! Request middleware and extractors.

pub mod auth;

pub use auth::{CurrentUser, RequireStaff, generate_api_token};
