use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod error;
pub mod memory;
pub mod ports;
pub mod validation;

pub use error::{CheckoutError, Result};
pub use ports::*;

pub const DEFAULT_DELIVERY_ADDRESS: &str = "Address not provided";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Declined,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Approved => "APPROVED",
            TransactionStatus::Declined => "DECLINED",
        }
    }

    /// APPROVED and DECLINED are write-once.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(TransactionStatus::Pending),
            "APPROVED" => Ok(TransactionStatus::Approved),
            "DECLINED" => Ok(TransactionStatus::Declined),
            other => Err(CheckoutError::Validation(format!(
                "Unknown transaction status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    /// The transaction was approved after the last unit sold out; stock was
    /// left untouched and the order waits for a restock.
    Backordered,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "PENDING",
            DeliveryStatus::Backordered => "BACKORDERED",
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(DeliveryStatus::Pending),
            "BACKORDERED" => Ok(DeliveryStatus::Backordered),
            other => Err(CheckoutError::Storage(format!(
                "Unknown delivery status stored: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: BigDecimal,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Option<BigDecimal>,
    pub stock: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub product_id: Uuid,
    pub status: TransactionStatus,
    pub gateway_transaction_id: Option<String>,
    pub delivery_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A conditional write against a transaction. It only lands while the stored
/// status is PENDING and the stored gateway id is unset or equal to this one.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub status: TransactionStatus,
    pub gateway_transaction_id: String,
    pub delivery_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Lowercase hex ciphertext, never the card number itself.
    pub saved_card: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub address: String,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentInfo {
    #[serde(default)]
    pub card_number: String,
    #[serde(default)]
    pub card_type: String,
    #[serde(default)]
    pub customer_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub status: TransactionStatus,
    pub gateway_transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub transaction_id: Uuid,
    pub status: TransactionStatus,
    pub gateway_transaction_id: Option<String>,
}

/// Inbound gateway notification. Every field is optional because the sender
/// is not trusted to include them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub data: Option<WebhookData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl WebhookEvent {
    pub fn new(gateway_transaction_id: &str, status: &str) -> Self {
        Self {
            data: Some(WebhookData {
                id: Some(gateway_transaction_id.to_string()),
                status: Some(status.to_string()),
            }),
        }
    }

    /// Returns the gateway id and raw status when both are present and non-blank.
    pub fn fields(&self) -> Option<(&str, &str)> {
        let data = self.data.as_ref()?;
        let id = data.id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let status = data.status.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some((id, status))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reconciliation {
    /// The status was written by this call.
    Applied,
    /// Already in the incoming terminal status.
    Duplicate,
    /// Already terminal with a different status; left untouched.
    Conflict,
    /// Incoming PENDING for a PENDING transaction.
    Pending,
}

impl Product {
    pub fn new(name: String, description: String, price: BigDecimal, stock: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            price,
            stock,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Transaction {
    pub fn new(product_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            product_id,
            status: TransactionStatus::Pending,
            gateway_transaction_id: None,
            delivery_address: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn outcome(&self) -> PaymentOutcome {
        PaymentOutcome {
            transaction_id: self.id,
            status: self.status,
            gateway_transaction_id: self.gateway_transaction_id.clone(),
        }
    }
}

impl StatusChange {
    /// Whether this change may land on `tx` as currently stored.
    pub fn applies_to(&self, tx: &Transaction) -> bool {
        tx.status == TransactionStatus::Pending
            && tx
                .gateway_transaction_id
                .as_deref()
                .map_or(true, |existing| existing == self.gateway_transaction_id)
    }
}

impl Customer {
    pub fn new(name: String, email: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            saved_card: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Delivery {
    pub fn new(transaction_id: Uuid, address: Option<&str>) -> Self {
        let now = Utc::now();
        let address = address
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(DEFAULT_DELIVERY_ADDRESS);
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            address: address.to_string(),
            status: DeliveryStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// The delivery recorded when `change` approves `tx`. The address given
    /// with the change wins over the stored one.
    pub fn for_approval(tx: &Transaction, change: &StatusChange, stock_debited: bool) -> Self {
        let address = change
            .delivery_address
            .as_deref()
            .or(tx.delivery_address.as_deref());
        let mut delivery = Self::new(tx.id, address);
        if !stock_debited {
            delivery.status = DeliveryStatus::Backordered;
        }
        delivery
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!("approved".parse::<TransactionStatus>().unwrap(), TransactionStatus::Approved);
        assert_eq!(" DECLINED ".parse::<TransactionStatus>().unwrap(), TransactionStatus::Declined);
        assert!("VOIDED".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn test_only_pending_is_non_terminal() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Approved.is_terminal());
        assert!(TransactionStatus::Declined.is_terminal());
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&TransactionStatus::Approved).unwrap();
        assert_eq!(json, "\"APPROVED\"");
    }

    #[test]
    fn test_webhook_fields_require_id_and_status() {
        assert_eq!(WebhookEvent::new("gw-1", "APPROVED").fields(), Some(("gw-1", "APPROVED")));
        assert_eq!(WebhookEvent::new("gw-1", "  ").fields(), None);
        assert_eq!(WebhookEvent::default().fields(), None);

        let parsed: WebhookEvent = serde_json::from_str(r#"{"data":{"id":"gw-1"}}"#).unwrap();
        assert_eq!(parsed.fields(), None);
    }

    #[test]
    fn test_status_change_respects_gateway_id() {
        let mut tx = Transaction::new(Uuid::new_v4());
        let change = StatusChange {
            status: TransactionStatus::Approved,
            gateway_transaction_id: "gw-1".to_string(),
            delivery_address: None,
        };
        assert!(change.applies_to(&tx));

        tx.gateway_transaction_id = Some("gw-2".to_string());
        assert!(!change.applies_to(&tx));

        tx.gateway_transaction_id = Some("gw-1".to_string());
        tx.status = TransactionStatus::Declined;
        assert!(!change.applies_to(&tx));
    }

    #[test]
    fn test_delivery_falls_back_to_placeholder_address() {
        let tx_id = Uuid::new_v4();
        assert_eq!(Delivery::new(tx_id, None).address, DEFAULT_DELIVERY_ADDRESS);
        assert_eq!(Delivery::new(tx_id, Some("   ")).address, DEFAULT_DELIVERY_ADDRESS);
        assert_eq!(Delivery::new(tx_id, Some("Main St 1")).address, "Main St 1");
        assert_eq!(Delivery::new(tx_id, None).status, DeliveryStatus::Pending);
    }

    #[test]
    fn test_approval_delivery_address_and_status() {
        let mut tx = Transaction::new(Uuid::new_v4());
        tx.delivery_address = Some("Old Rd 9".to_string());
        let mut change = StatusChange {
            status: TransactionStatus::Approved,
            gateway_transaction_id: "gw-1".to_string(),
            delivery_address: Some("Main St 1".to_string()),
        };

        let delivery = Delivery::for_approval(&tx, &change, true);
        assert_eq!(delivery.transaction_id, tx.id);
        assert_eq!(delivery.address, "Main St 1");
        assert_eq!(delivery.status, DeliveryStatus::Pending);

        change.delivery_address = None;
        let backordered = Delivery::for_approval(&tx, &change, false);
        assert_eq!(backordered.address, "Old Rd 9");
        assert_eq!(backordered.status, DeliveryStatus::Backordered);
        assert_eq!("BACKORDERED".parse::<DeliveryStatus>().unwrap(), DeliveryStatus::Backordered);
    }
}
