//! GreenGrocer server library.
//!
//! This crate provides the wholesale ordering backend as a library,
//! allowing it to be tested and reused. The `green-grocer-server` binary
//! and the integration tests both assemble the application from here.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;

use crate::state::AppState;

/// Build the application router with its state attached.
///
/// The binary wraps this in tracing and Sentry layers; tests drive it
/// directly.
#[must_use]
pub fn app(state: AppState) -> Router {
    routes::routes().with_state(state)
}
