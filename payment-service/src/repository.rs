use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection, RunQueryDsl};
use shared::{CheckoutError, Customer, CustomerRepository, Result};
use uuid::Uuid;
use crate::models::{CustomerChangeset, CustomerRow};
use crate::schema::customers;

pub type DbPool = Pool<AsyncPgConnection>;

/// Postgres-backed customer repository.
#[derive(Clone)]
pub struct DieselCustomerRepository {
    pool: DbPool,
}

impl DieselCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerRepository for DieselCustomerRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Customer>> {
        let mut conn = self.pool.get().await.map_err(CheckoutError::storage)?;

        let row = customers::table
            .filter(customers::id.eq(id))
            .first::<CustomerRow>(&mut conn)
            .await
            .optional()
            .map_err(CheckoutError::storage)?;

        Ok(row.map(Customer::from))
    }

    async fn save(&self, customer: &Customer) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(CheckoutError::storage)?;

        diesel::insert_into(customers::table)
            .values(CustomerRow::from(customer))
            .execute(&mut conn)
            .await
            .map_err(CheckoutError::storage)?;

        Ok(())
    }

    async fn update(&self, customer: &Customer) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(CheckoutError::storage)?;

        let updated_rows = diesel::update(customers::table.filter(customers::id.eq(customer.id)))
            .set(CustomerChangeset::from(customer))
            .execute(&mut conn)
            .await
            .map_err(CheckoutError::storage)?;

        if updated_rows == 0 {
            return Err(CheckoutError::NotFound(format!(
                "Customer with ID {} not found",
                customer.id
            )));
        }

        Ok(())
    }
}
