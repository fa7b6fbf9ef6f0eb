//! Checkout transactions: lifecycle core, persistence and HTTP surface.

pub mod api;
pub mod config;
pub mod lifecycle;
pub mod models;
pub mod repository;
pub mod schema;

pub use lifecycle::TransactionLifecycle;
