use diesel::prelude::*;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use shared::Customer;

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::customers)]
pub struct CustomerRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub saved_card: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a card update may touch. `saved_card` only ever holds ciphertext.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = crate::schema::customers)]
pub struct CustomerChangeset<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub saved_card: Option<&'a str>,
    pub updated_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            saved_card: row.saved_card,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<&Customer> for CustomerRow {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id,
            name: customer.name.clone(),
            email: customer.email.clone(),
            saved_card: customer.saved_card.clone(),
            created_at: customer.created_at,
            updated_at: customer.updated_at,
        }
    }
}

impl<'a> From<&'a Customer> for CustomerChangeset<'a> {
    fn from(customer: &'a Customer) -> Self {
        Self {
            name: &customer.name,
            email: &customer.email,
            saved_card: customer.saved_card.as_deref(),
            updated_at: customer.updated_at,
        }
    }
}
