use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use diesel::PgConnection;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

use anyhow::Result;
use clap::Parser;
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection};
use diesel::Connection;
use inventory_service::{DieselProductRepository, StockService};
use payment_service::{CardService, DieselCustomerRepository, EncryptionService, HttpPaymentGateway};
use std::sync::Arc;
use tracing::info;
use transaction_service::api;
use transaction_service::config::Args;
use transaction_service::repository::{
    DieselDeliveryRepository, DieselSettlementStore, DieselTransactionRepository,
};
use transaction_service::TransactionLifecycle;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    // Secrets are checked before anything touches the network.
    let encryption = EncryptionService::from_hex(
        args.encryption_key.as_deref().unwrap_or_default(),
        args.encryption_iv.as_deref().unwrap_or_default(),
    )?;
    let gateway = HttpPaymentGateway::new(args.gateway_config())?;
    let allow_origin = args.allow_origin()?;

    info!("Running database migrations...");
    let mut conn = PgConnection::establish(&args.database_url)?;
    conn.run_pending_migrations(MIGRATIONS).map_err(|e| anyhow::anyhow!("Migration error: {}", e))?;
    info!("Migrations completed successfully");

    let config = diesel_async::pooled_connection::AsyncDieselConnectionManager::<AsyncPgConnection>::new(&args.database_url);
    let pool = Pool::builder().build(config).await?;

    let stock = StockService::new(Arc::new(DieselProductRepository::new(pool.clone())));
    let lifecycle = TransactionLifecycle::new(
        Arc::new(DieselTransactionRepository::new(pool.clone())),
        Arc::new(DieselSettlementStore::new(pool.clone())),
        stock.clone(),
        Arc::new(DieselDeliveryRepository::new(pool.clone())),
        Arc::new(gateway),
    )
    .with_gateway_timeout(args.gateway_timeout());
    let cards = CardService::new(
        Arc::new(DieselCustomerRepository::new(pool.clone())),
        Arc::new(encryption),
    );

    let app_state = api::AppState {
        lifecycle: Arc::new(lifecycle),
        stock,
        cards,
    };

    let app = api::create_router(app_state, allow_origin);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;

    info!("Transaction service listening on port {}", args.port);

    axum::serve(listener, app).await?;

    Ok(())
}
