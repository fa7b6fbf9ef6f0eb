use diesel::prelude::*;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use shared::Product;

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::products)]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: bigdecimal::BigDecimal,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            stock: row.stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<&Product> for ProductRow {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.clone(),
            stock: product.stock,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}
