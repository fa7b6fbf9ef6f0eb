//! Repository and gateway contracts consumed by the checkout core.
//!
//! Every write that guards an invariant is conditional: implementations must
//! perform the check and the write atomically (a filtered `UPDATE`, or a
//! check-and-set under a lock) so racing callers cannot both succeed.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    Customer, Delivery, GatewayResponse, PaymentInfo, Product, Result, StatusChange, Transaction,
};

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>>;

    async fn list(&self) -> Result<Vec<Product>>;

    async fn save(&self, product: &Product) -> Result<()>;

    /// Subtracts `quantity` only if the stored stock is at least `quantity`.
    /// Returns the updated product, or `None` when the condition failed or
    /// the product does not exist.
    async fn decrement_stock(&self, id: Uuid, quantity: i32) -> Result<Option<Product>>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>>;

    async fn find_by_gateway_id(&self, gateway_transaction_id: &str) -> Result<Option<Transaction>>;

    async fn save(&self, tx: &Transaction) -> Result<()>;

    /// Applies `change` only while the stored status is PENDING and the stored
    /// gateway id is unset or equal. Returns whether the write landed.
    async fn update_status(&self, id: Uuid, change: &StatusChange) -> Result<bool>;
}

/// Unit of work for the move into APPROVED.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    /// Writes `change` under the same condition as
    /// [`TransactionRepository::update_status`] and, in the same unit, debits
    /// one unit of `tx.product_id` and records the transaction's delivery.
    /// Either all of it lands or none of it does.
    ///
    /// Returns `None` when the status condition failed. A sold-out product
    /// does not fail the unit: stock stays at zero and the delivery is
    /// recorded as backordered.
    async fn approve(&self, tx: &Transaction, change: &StatusChange) -> Result<Option<Delivery>>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Customer>>;

    async fn save(&self, customer: &Customer) -> Result<()>;

    async fn update(&self, customer: &Customer) -> Result<()>;
}

#[async_trait]
pub trait DeliveryRepository: Send + Sync {
    /// Returns `false` without writing when the transaction already has a delivery.
    async fn save(&self, delivery: &Delivery) -> Result<bool>;

    async fn find_by_transaction_id(&self, transaction_id: Uuid) -> Result<Option<Delivery>>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn process_payment(
        &self,
        transaction_id: Uuid,
        payment: &PaymentInfo,
    ) -> Result<GatewayResponse>;
}
