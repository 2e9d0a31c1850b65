//! CLI command implementations.

pub mod job;
pub mod migrate;
pub mod seed;
pub mod user;
