//! Domain models for the wholesale ordering system.

pub mod audit;
pub mod loyalty;
pub mod notification;
pub mod order;
pub mod pricing;
pub mod product;
pub mod user;
