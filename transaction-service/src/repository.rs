use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{pooled_connection::bb8::Pool, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use inventory_service::schema::products;
use shared::*;
use tracing::warn;
use uuid::Uuid;
use crate::models::*;
use crate::schema::*;

pub type DbPool = Pool<AsyncPgConnection>;

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct DieselTransactionRepository {
    pool: DbPool,
}

impl DieselTransactionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for DieselTransactionRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>> {
        let mut conn = self.pool.get().await.map_err(CheckoutError::storage)?;

        transactions::table
            .filter(transactions::id.eq(id))
            .first::<TransactionRow>(&mut conn)
            .await
            .optional()
            .map_err(CheckoutError::storage)?
            .map(Transaction::try_from)
            .transpose()
    }

    async fn find_by_gateway_id(&self, gateway_transaction_id: &str) -> Result<Option<Transaction>> {
        let mut conn = self.pool.get().await.map_err(CheckoutError::storage)?;

        transactions::table
            .filter(transactions::gateway_transaction_id.eq(gateway_transaction_id))
            .first::<TransactionRow>(&mut conn)
            .await
            .optional()
            .map_err(CheckoutError::storage)?
            .map(Transaction::try_from)
            .transpose()
    }

    async fn save(&self, tx: &Transaction) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(CheckoutError::storage)?;

        diesel::insert_into(transactions::table)
            .values(TransactionRow::from(tx))
            .execute(&mut conn)
            .await
            .map_err(CheckoutError::storage)?;

        Ok(())
    }

    async fn update_status(&self, id: Uuid, change: &StatusChange) -> Result<bool> {
        let mut conn = self.pool.get().await.map_err(CheckoutError::storage)?;

        let updated_rows = transition(&mut conn, id, change)
            .await
            .map_err(CheckoutError::storage)?;

        Ok(updated_rows > 0)
    }
}

/// Compare-and-set: only a PENDING row whose gateway id is unset or already
/// ours can move.
async fn transition(
    conn: &mut AsyncPgConnection,
    id: Uuid,
    change: &StatusChange,
) -> QueryResult<usize> {
    diesel::update(
        transactions::table
            .filter(transactions::id.eq(id))
            .filter(transactions::status.eq(TransactionStatus::Pending.as_str()))
            .filter(
                transactions::gateway_transaction_id
                    .is_null()
                    .or(transactions::gateway_transaction_id
                        .eq(change.gateway_transaction_id.as_str())),
            ),
    )
    .set(StatusChangeset::from(change))
    .execute(conn)
    .await
}

/// Runs the move into APPROVED, the stock debit and the delivery insert in
/// one database transaction.
#[derive(Clone)]
pub struct DieselSettlementStore {
    pool: DbPool,
}

impl DieselSettlementStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettlementStore for DieselSettlementStore {
    async fn approve(&self, tx: &Transaction, change: &StatusChange) -> Result<Option<Delivery>> {
        let mut conn = self.pool.get().await.map_err(CheckoutError::storage)?;

        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                if transition(conn, tx.id, change).await? == 0 {
                    return Ok(None);
                }

                let debited_rows = diesel::update(
                    products::table
                        .filter(products::id.eq(tx.product_id))
                        .filter(products::stock.ge(1)),
                )
                .set((
                    products::stock.eq(products::stock - 1),
                    products::updated_at.eq(Utc::now()),
                ))
                .execute(conn)
                .await?;
                if debited_rows == 0 {
                    warn!(
                        "Product {} sold out before transaction {} was approved; backordering",
                        tx.product_id, tx.id
                    );
                }

                let delivery = Delivery::for_approval(tx, change, debited_rows > 0);
                diesel::insert_into(deliveries::table)
                    .values(DeliveryRow::from(&delivery))
                    .on_conflict(deliveries::transaction_id)
                    .do_nothing()
                    .execute(conn)
                    .await?;

                Ok(Some(delivery))
            }
            .scope_boxed()
        })
        .await
        .map_err(CheckoutError::storage)
    }
}

/// Postgres-backed delivery repository. `transaction_id` is unique, so a
/// second insert for the same transaction is a no-op.
#[derive(Clone)]
pub struct DieselDeliveryRepository {
    pool: DbPool,
}

impl DieselDeliveryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryRepository for DieselDeliveryRepository {
    async fn save(&self, delivery: &Delivery) -> Result<bool> {
        let mut conn = self.pool.get().await.map_err(CheckoutError::storage)?;

        let inserted_rows = diesel::insert_into(deliveries::table)
            .values(DeliveryRow::from(delivery))
            .on_conflict(deliveries::transaction_id)
            .do_nothing()
            .execute(&mut conn)
            .await
            .map_err(CheckoutError::storage)?;

        Ok(inserted_rows > 0)
    }

    async fn find_by_transaction_id(&self, transaction_id: Uuid) -> Result<Option<Delivery>> {
        let mut conn = self.pool.get().await.map_err(CheckoutError::storage)?;

        deliveries::table
            .filter(deliveries::transaction_id.eq(transaction_id))
            .first::<DeliveryRow>(&mut conn)
            .await
            .optional()
            .map_err(CheckoutError::storage)?
            .map(Delivery::try_from)
            .transpose()
    }
}
