//! OpenSASE Back Office - order, shipping and sales service

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opensase_backoffice::api::{self, AppState};
use opensase_backoffice::config::load_app_config;
use opensase_backoffice::notify::{LogNotifier, NatsNotifier, Notifier};
use opensase_backoffice::storage::{MemoryStore, OrderStore, PgStore, ProductCatalog};
use opensase_backoffice::{OrderLedger, StatsAggregator};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = load_app_config()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| cfg.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (orders, catalog): (Arc<dyn OrderStore>, Arc<dyn ProductCatalog>) = match cfg.database_url.as_deref() {
        Some(url) => {
            let store = PgStore::connect(url, cfg.db_max_connections).await?;
            store.migrate().await?;
            let store = Arc::new(store);
            (store.clone() as Arc<dyn OrderStore>, store as Arc<dyn ProductCatalog>)
        }
        None => {
            warn!("DATABASE_URL not set, orders are kept in memory only");
            let store = Arc::new(MemoryStore::new());
            (store.clone() as Arc<dyn OrderStore>, store as Arc<dyn ProductCatalog>)
        }
    };

    let notifier: Arc<dyn Notifier> = match cfg.nats_url.as_deref() {
        Some(url) => match NatsNotifier::connect(url, cfg.nats_subject.clone()).await {
            Ok(n) => Arc::new(n),
            Err(e) => {
                warn!(error = %e, "NATS unavailable, logging order events instead");
                Arc::new(LogNotifier)
            }
        },
        None => Arc::new(LogNotifier),
    };

    let ledger = OrderLedger::new(
        orders.clone(),
        catalog.clone(),
        notifier,
        cfg.sellers.clone(),
        cfg.order_id_prefix.clone(),
    );
    let stats = StatsAggregator::new(orders, catalog.clone(), cfg.sellers.clone(), cfg.utc_offset);
    let state = AppState {
        ledger: Arc::new(ledger),
        stats: Arc::new(stats),
        catalog,
        shipping: Arc::new(cfg.shipping.clone()),
        invoice_base_url: Arc::from(cfg.invoice_base_url.as_str()),
    };

    let app = api::router(state);
    info!("OpenSASE Back Office listening on {}", cfg.bind_addr);
    axum::serve(tokio::net::TcpListener::bind(cfg.bind_addr).await?, app).await?;
    Ok(())
}
