//! Transaction lifecycle: creation, direct payment and webhook reconciliation.
//!
//! A transaction leaves PENDING exactly once. Both the payment path and the
//! webhook path go through a conditional status write. The move into APPROVED
//! carries its effects (one stock debit and one delivery) in the same unit of
//! work, so a failed unit leaves the transaction PENDING and a retry redoes
//! all of it, while a landed unit is never repeated.

use inventory_service::StockService;
use shared::validation::validate_payment_info;
use shared::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

fn transaction_not_found(id: Uuid) -> CheckoutError {
    CheckoutError::NotFound(format!("Transaction {} not found", id))
}

pub struct TransactionLifecycle {
    transactions: Arc<dyn TransactionRepository>,
    settlements: Arc<dyn SettlementStore>,
    deliveries: Arc<dyn DeliveryRepository>,
    gateway: Arc<dyn PaymentGateway>,
    stock: StockService,
    gateway_timeout: Duration,
}

impl TransactionLifecycle {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        settlements: Arc<dyn SettlementStore>,
        stock: StockService,
        deliveries: Arc<dyn DeliveryRepository>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            transactions,
            settlements,
            stock,
            deliveries,
            gateway,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    pub async fn create(&self, product_id: Uuid) -> Result<Transaction> {
        let product = self.stock.find_product(product_id).await?;
        if product.stock < 1 {
            // Not enforced here; payment re-checks stock before charging.
            warn!(
                "Creating transaction for product {} which is out of stock",
                product_id
            );
        }

        let tx = Transaction::new(product_id);
        self.transactions.save(&tx).await?;

        info!("Transaction {} created for product {}", tx.id, product_id);
        Ok(tx)
    }

    pub async fn get(&self, id: Uuid) -> Result<Transaction> {
        self.transactions
            .find_by_id(id)
            .await?
            .ok_or_else(|| transaction_not_found(id))
    }

    /// Charges the card through the gateway and records the outcome.
    ///
    /// All validation happens before the gateway is called, so a rejected
    /// request leaves no trace.
    pub async fn pay(&self, transaction_id: Uuid, payment: PaymentInfo) -> Result<PaymentOutcome> {
        validate_payment_info(&payment)?;

        let tx = self.get(transaction_id).await?;
        if tx.status.is_terminal() {
            return Err(CheckoutError::Validation(format!(
                "Transaction {} is already {}",
                tx.id, tx.status
            )));
        }

        let product = self.stock.find_product(tx.product_id).await?;
        if product.stock < 1 {
            return Err(CheckoutError::InsufficientStock(format!(
                "Product {} is out of stock",
                product.name
            )));
        }

        let response = self.charge(tx.id, &payment).await?;
        info!(
            "Gateway answered {} for transaction {} ({})",
            response.status, tx.id, response.gateway_transaction_id
        );

        let change = StatusChange {
            status: response.status,
            gateway_transaction_id: response.gateway_transaction_id.clone(),
            delivery_address: Some(payment.customer_address.trim().to_string()),
        };

        if !self.settle(&tx, &change).await? {
            let current = self.get(tx.id).await?;
            warn!(
                "Transaction {} changed while the gateway was answering; keeping {}",
                tx.id, current.status
            );
            return Ok(current.outcome());
        }

        Ok(PaymentOutcome {
            transaction_id: tx.id,
            status: response.status,
            gateway_transaction_id: Some(response.gateway_transaction_id),
        })
    }

    async fn charge(&self, transaction_id: Uuid, payment: &PaymentInfo) -> Result<GatewayResponse> {
        match tokio::time::timeout(
            self.gateway_timeout,
            self.gateway.process_payment(transaction_id, payment),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Gateway timed out after {:?} for transaction {}",
                    self.gateway_timeout, transaction_id
                );
                Err(CheckoutError::Gateway(format!(
                    "timed out; query transaction {} before retrying",
                    transaction_id
                )))
            }
        }
    }

    /// Brings a transaction in line with the gateway's notification.
    ///
    /// Safe to run any number of times for the same payload.
    pub async fn reconcile(&self, event: &WebhookEvent) -> Result<Reconciliation> {
        let (gateway_id, raw_status) = event.fields().ok_or_else(|| {
            CheckoutError::BadPayload("data.id and data.status are required".to_string())
        })?;
        let incoming: TransactionStatus = raw_status
            .parse()
            .map_err(|_| CheckoutError::BadPayload(format!("unknown status {}", raw_status)))?;

        let tx = self
            .transactions
            .find_by_gateway_id(gateway_id)
            .await?
            .ok_or_else(|| {
                CheckoutError::NotFound(format!(
                    "Transaction with gateway id {} not found",
                    gateway_id
                ))
            })?;

        if tx.status.is_terminal() {
            return Ok(self.classify_settled(&tx, incoming));
        }
        if incoming == TransactionStatus::Pending {
            return Ok(Reconciliation::Pending);
        }

        let change = StatusChange {
            status: incoming,
            gateway_transaction_id: gateway_id.to_string(),
            delivery_address: None,
        };
        if !self.settle(&tx, &change).await? {
            let current = self.get(tx.id).await?;
            return Ok(self.classify_settled(&current, incoming));
        }
        info!("Transaction {} reconciled to {}", tx.id, incoming);

        Ok(Reconciliation::Applied)
    }

    /// The delivery recorded for an approved transaction, if any.
    pub async fn delivery(&self, transaction_id: Uuid) -> Result<Option<Delivery>> {
        let tx = self.get(transaction_id).await?;
        self.deliveries.find_by_transaction_id(tx.id).await
    }

    /// Writes `change` through the conditional path. An approval goes through
    /// the settlement unit together with its stock debit and delivery. Returns
    /// whether this call's write landed.
    async fn settle(&self, tx: &Transaction, change: &StatusChange) -> Result<bool> {
        if change.status != TransactionStatus::Approved {
            return self.transactions.update_status(tx.id, change).await;
        }

        let delivery = self.settlements.approve(tx, change).await.map_err(|e| {
            error!(
                "Approval of transaction {} (product {}) failed, left PENDING: {}",
                tx.id, tx.product_id, e
            );
            e
        })?;

        match delivery {
            Some(delivery) if delivery.status == DeliveryStatus::Backordered => {
                warn!(
                    "Transaction {} approved with product {} sold out; delivery {} backordered",
                    tx.id, tx.product_id, delivery.id
                );
                Ok(true)
            }
            Some(delivery) => {
                info!(
                    "Stock debited for product {} and delivery {} created for transaction {}",
                    tx.product_id, delivery.id, tx.id
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn classify_settled(&self, tx: &Transaction, incoming: TransactionStatus) -> Reconciliation {
        if tx.status == incoming {
            info!(
                "Duplicate {} notification for transaction {}, nothing to do",
                incoming, tx.id
            );
            Reconciliation::Duplicate
        } else {
            warn!(
                "Ignoring {} notification for transaction {} already {}",
                incoming, tx.id, tx.status
            );
            Reconciliation::Conflict
        }
    }
}
