//! In-memory adapters for every port, used by tests and local runs.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    CheckoutError, Customer, CustomerRepository, Delivery, DeliveryRepository, GatewayResponse,
    PaymentGateway, PaymentInfo, Product, ProductRepository, Result, SettlementStore,
    StatusChange, Transaction, TransactionRepository, TransactionStatus,
};

#[derive(Debug, Default)]
pub struct InMemoryProductRepository {
    products: Mutex<HashMap<Uuid, Product>>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let repo = Self::new();
        repo.products
            .lock()
            .extend(products.into_iter().map(|p| (p.id, p)));
        repo
    }

    pub fn stock_of(&self, id: Uuid) -> Option<i32> {
        self.products.lock().get(&id).map(|p| p.stock)
    }

    pub fn set_stock(&self, id: Uuid, stock: i32) {
        if let Some(product) = self.products.lock().get_mut(&id) {
            product.stock = stock;
        }
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.products.lock().get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Product>> {
        let mut products: Vec<Product> = self.products.lock().values().cloned().collect();
        products.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(products)
    }

    async fn save(&self, product: &Product) -> Result<()> {
        self.products.lock().insert(product.id, product.clone());
        Ok(())
    }

    async fn decrement_stock(&self, id: Uuid, quantity: i32) -> Result<Option<Product>> {
        let mut products = self.products.lock();
        match products.get_mut(&id) {
            Some(product) if product.stock >= quantity => {
                product.stock -= quantity;
                product.updated_at = Utc::now();
                Ok(Some(product.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTransactionRepository {
    transactions: Mutex<HashMap<Uuid, Transaction>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tx: Transaction) {
        self.transactions.lock().insert(tx.id, tx);
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>> {
        Ok(self.transactions.lock().get(&id).cloned())
    }

    async fn find_by_gateway_id(&self, gateway_transaction_id: &str) -> Result<Option<Transaction>> {
        Ok(self
            .transactions
            .lock()
            .values()
            .find(|tx| tx.gateway_transaction_id.as_deref() == Some(gateway_transaction_id))
            .cloned())
    }

    async fn save(&self, tx: &Transaction) -> Result<()> {
        self.transactions.lock().insert(tx.id, tx.clone());
        Ok(())
    }

    async fn update_status(&self, id: Uuid, change: &StatusChange) -> Result<bool> {
        let mut transactions = self.transactions.lock();
        let Some(tx) = transactions.get_mut(&id) else {
            return Ok(false);
        };
        if !change.applies_to(tx) {
            return Ok(false);
        }

        apply_change(tx, change);
        Ok(true)
    }
}

fn apply_change(tx: &mut Transaction, change: &StatusChange) {
    tx.status = change.status;
    tx.gateway_transaction_id = Some(change.gateway_transaction_id.clone());
    if let Some(address) = &change.delivery_address {
        tx.delivery_address = Some(address.clone());
    }
    tx.updated_at = Utc::now();
}

#[derive(Debug, Default)]
pub struct InMemoryCustomerRepository {
    customers: Mutex<HashMap<Uuid, Customer>>,
}

impl InMemoryCustomerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, customer: Customer) {
        self.customers.lock().insert(customer.id, customer);
    }
}

#[async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Customer>> {
        Ok(self.customers.lock().get(&id).cloned())
    }

    async fn save(&self, customer: &Customer) -> Result<()> {
        self.customers.lock().insert(customer.id, customer.clone());
        Ok(())
    }

    async fn update(&self, customer: &Customer) -> Result<()> {
        let mut customers = self.customers.lock();
        match customers.get_mut(&customer.id) {
            Some(stored) => {
                *stored = customer.clone();
                Ok(())
            }
            None => Err(CheckoutError::NotFound(format!(
                "Customer with ID {} not found",
                customer.id
            ))),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDeliveryRepository {
    deliveries: Mutex<Vec<Delivery>>,
}

impl InMemoryDeliveryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_for(&self, transaction_id: Uuid) -> usize {
        self.deliveries
            .lock()
            .iter()
            .filter(|d| d.transaction_id == transaction_id)
            .count()
    }

    pub fn len(&self) -> usize {
        self.deliveries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.lock().is_empty()
    }
}

#[async_trait]
impl DeliveryRepository for InMemoryDeliveryRepository {
    async fn save(&self, delivery: &Delivery) -> Result<bool> {
        let mut deliveries = self.deliveries.lock();
        if deliveries
            .iter()
            .any(|d| d.transaction_id == delivery.transaction_id)
        {
            return Ok(false);
        }
        deliveries.push(delivery.clone());
        Ok(true)
    }

    async fn find_by_transaction_id(&self, transaction_id: Uuid) -> Result<Option<Delivery>> {
        Ok(self
            .deliveries
            .lock()
            .iter()
            .find(|d| d.transaction_id == transaction_id)
            .cloned())
    }
}

/// Approval unit over the in-memory repositories. The three maps are locked
/// together for the whole unit, transactions first, and nothing is written
/// until every check has passed.
#[derive(Debug)]
pub struct InMemorySettlementStore {
    transactions: Arc<InMemoryTransactionRepository>,
    products: Arc<InMemoryProductRepository>,
    deliveries: Arc<InMemoryDeliveryRepository>,
    fail_next: Mutex<Option<CheckoutError>>,
}

impl InMemorySettlementStore {
    pub fn new(
        transactions: Arc<InMemoryTransactionRepository>,
        products: Arc<InMemoryProductRepository>,
        deliveries: Arc<InMemoryDeliveryRepository>,
    ) -> Self {
        Self {
            transactions,
            products,
            deliveries,
            fail_next: Mutex::new(None),
        }
    }

    /// Makes the next applicable `approve` fail with `error`, leaving all
    /// three repositories as they were.
    pub fn fail_next(&self, error: CheckoutError) {
        *self.fail_next.lock() = Some(error);
    }
}

#[async_trait]
impl SettlementStore for InMemorySettlementStore {
    async fn approve(&self, tx: &Transaction, change: &StatusChange) -> Result<Option<Delivery>> {
        let mut transactions = self.transactions.transactions.lock();
        let Some(stored) = transactions.get_mut(&tx.id) else {
            return Ok(None);
        };
        if !change.applies_to(stored) {
            return Ok(None);
        }
        if let Some(error) = self.fail_next.lock().take() {
            return Err(error);
        }

        let mut products = self.products.products.lock();
        let mut deliveries = self.deliveries.deliveries.lock();

        let product = products
            .get_mut(&tx.product_id)
            .filter(|product| product.stock >= 1);
        let stock_debited = product.is_some();
        if let Some(product) = product {
            product.stock -= 1;
            product.updated_at = Utc::now();
        }

        let delivery = Delivery::for_approval(stored, change, stock_debited);
        apply_change(stored, change);
        if !deliveries.iter().any(|d| d.transaction_id == tx.id) {
            deliveries.push(delivery.clone());
        }
        Ok(Some(delivery))
    }
}

/// Gateway double answering every charge with a fixed outcome.
#[derive(Debug)]
pub struct StubGateway {
    outcome: std::result::Result<GatewayResponse, CheckoutError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubGateway {
    pub fn new(status: TransactionStatus, gateway_transaction_id: &str) -> Self {
        Self {
            outcome: Ok(GatewayResponse {
                status,
                gateway_transaction_id: gateway_transaction_id.to_string(),
            }),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(CheckoutError::Gateway(message.to_string())),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn process_payment(
        &self,
        _transaction_id: Uuid,
        _payment: &PaymentInfo,
    ) -> Result<GatewayResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}
