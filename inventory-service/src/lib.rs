//! Product catalogue and stock adjustment.

pub mod models;
pub mod repository;
pub mod schema;
pub mod stock;

pub use repository::{DbPool, DieselProductRepository};
pub use stock::StockService;
