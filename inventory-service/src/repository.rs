use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection, RunQueryDsl};
use shared::{CheckoutError, Product, ProductRepository, Result};
use uuid::Uuid;
use crate::models::ProductRow;
use crate::schema::products;

pub type DbPool = Pool<AsyncPgConnection>;

/// Postgres-backed product repository.
#[derive(Clone)]
pub struct DieselProductRepository {
    pool: DbPool,
}

impl DieselProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for DieselProductRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>> {
        let mut conn = self.pool.get().await.map_err(CheckoutError::storage)?;

        let row = products::table
            .filter(products::id.eq(id))
            .first::<ProductRow>(&mut conn)
            .await
            .optional()
            .map_err(CheckoutError::storage)?;

        Ok(row.map(Product::from))
    }

    async fn list(&self) -> Result<Vec<Product>> {
        let mut conn = self.pool.get().await.map_err(CheckoutError::storage)?;

        let rows = products::table
            .order(products::created_at.asc())
            .load::<ProductRow>(&mut conn)
            .await
            .map_err(CheckoutError::storage)?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn save(&self, product: &Product) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(CheckoutError::storage)?;

        diesel::insert_into(products::table)
            .values(ProductRow::from(product))
            .execute(&mut conn)
            .await
            .map_err(CheckoutError::storage)?;

        Ok(())
    }

    async fn decrement_stock(&self, id: Uuid, quantity: i32) -> Result<Option<Product>> {
        let mut conn = self.pool.get().await.map_err(CheckoutError::storage)?;

        // The stock guard lives in the WHERE clause so the check and the
        // subtraction are a single statement.
        let row = diesel::update(
            products::table
                .filter(products::id.eq(id))
                .filter(products::stock.ge(quantity)),
        )
        .set((
            products::stock.eq(products::stock - quantity),
            products::updated_at.eq(Utc::now()),
        ))
        .get_result::<ProductRow>(&mut conn)
        .await
        .optional()
        .map_err(CheckoutError::storage)?;

        Ok(row.map(Product::from))
    }
}
