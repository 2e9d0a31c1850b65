//! Core types for Green Grocer.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod phone;
pub mod status;

pub use id::*;
pub use money::Money;
pub use phone::{Phone, PhoneError};
pub use status::*;
