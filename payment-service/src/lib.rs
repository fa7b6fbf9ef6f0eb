//! Card handling: at-rest encryption, saved cards and the gateway client.

pub mod cards;
pub mod encryption;
pub mod gateway;
pub mod models;
pub mod repository;
pub mod schema;

pub use cards::CardService;
pub use encryption::EncryptionService;
pub use gateway::{GatewayConfig, HttpPaymentGateway};
pub use repository::{DbPool, DieselCustomerRepository};
