use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use bistro_core::TableId;
use bistro_infra::{
    InMemoryOrderRepository, InMemoryTableDirectory, OrderRepository, OrderService,
    PostgresOrderRepository, PostgresTableDirectory, TableDirectory,
};

use crate::config::{AppConfig, StorageConfig};

/// Order engine over type-erased storage, so in-memory and Postgres wiring
/// share one handler set.
pub type Orders = OrderService<Arc<dyn OrderRepository>, Arc<dyn TableDirectory>>;

#[derive(Clone)]
pub struct AppServices {
    pub orders: Orders,
}

impl AppServices {
    pub fn new(orders: Arc<dyn OrderRepository>, tables: Arc<dyn TableDirectory>) -> Self {
        Self {
            orders: OrderService::new(orders, tables),
        }
    }

    /// In-memory wiring (dev/test) with the given tables registered.
    pub fn in_memory(tables: impl IntoIterator<Item = TableId>) -> Self {
        Self::new(
            Arc::new(InMemoryOrderRepository::new()),
            Arc::new(InMemoryTableDirectory::with_tables(tables)),
        )
    }
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    match &config.storage {
        StorageConfig::InMemory => {
            tracing::info!(tables = config.seed_tables.len(), "using in-memory order storage");
            Ok(AppServices::in_memory(config.seed_tables.iter().copied()))
        }
        StorageConfig::Postgres {
            database_url,
            max_connections,
        } => build_persistent_services(database_url, *max_connections, &config.seed_tables).await,
    }
}

async fn build_persistent_services(
    database_url: &str,
    max_connections: u32,
    seed_tables: &[TableId],
) -> anyhow::Result<AppServices> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    let pool = Arc::new(pool);

    let orders = PostgresOrderRepository::from_shared(pool.clone());
    orders.migrate().await?;

    let tables = PostgresTableDirectory::from_shared(pool);
    for id in seed_tables {
        tables.add(*id).await?;
    }

    tracing::info!(max_connections, tables = seed_tables.len(), "using postgres order storage");
    Ok(AppServices::new(Arc::new(orders), Arc::new(tables)))
}
