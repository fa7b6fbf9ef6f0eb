use diesel::prelude::*;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use shared::*;

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::transactions)]
pub struct TransactionRow {
    pub id: Uuid,
    pub product_id: Uuid,
    pub status: String,
    pub gateway_transaction_id: Option<String>,
    pub delivery_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `None` fields are left as stored.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = crate::schema::transactions)]
pub struct StatusChangeset<'a> {
    pub status: &'static str,
    pub gateway_transaction_id: Option<&'a str>,
    pub delivery_address: Option<&'a str>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::deliveries)]
pub struct DeliveryRow {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub address: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = CheckoutError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(|_| {
            CheckoutError::Storage(format!(
                "Transaction {} has unknown stored status {}",
                row.id, row.status
            ))
        })?;

        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            status,
            gateway_transaction_id: row.gateway_transaction_id,
            delivery_address: row.delivery_address,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&Transaction> for TransactionRow {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id,
            product_id: tx.product_id,
            status: tx.status.as_str().to_string(),
            gateway_transaction_id: tx.gateway_transaction_id.clone(),
            delivery_address: tx.delivery_address.clone(),
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

impl<'a> From<&'a StatusChange> for StatusChangeset<'a> {
    fn from(change: &'a StatusChange) -> Self {
        Self {
            status: change.status.as_str(),
            gateway_transaction_id: Some(&change.gateway_transaction_id),
            delivery_address: change.delivery_address.as_deref(),
            updated_at: Utc::now(),
        }
    }
}

impl TryFrom<DeliveryRow> for Delivery {
    type Error = CheckoutError;

    fn try_from(row: DeliveryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            transaction_id: row.transaction_id,
            address: row.address,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&Delivery> for DeliveryRow {
    fn from(delivery: &Delivery) -> Self {
        Self {
            id: delivery.id,
            transaction_id: delivery.transaction_id,
            address: delivery.address.clone(),
            status: delivery.status.as_str().to_string(),
            created_at: delivery.created_at,
            updated_at: delivery.updated_at,
        }
    }
}
