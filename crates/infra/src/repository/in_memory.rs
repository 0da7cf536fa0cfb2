use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bistro_core::{AggregateRoot, ExpectedVersion, OrderId, TableId};
use bistro_orders::{Order, OrderStatus};

use super::r#trait::{OrderRepository, RepositoryError, TableDirectory};

fn poisoned() -> RepositoryError {
    RepositoryError::Backend("lock poisoned".to_string())
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id_typed().cmp(&a.id_typed()))
    });
    orders
}

/// In-memory order store.
///
/// Intended for tests/dev. Each write holds the lock for its whole
/// check-then-write, which gives the same serialisation per order identity
/// as the version check does in Postgres.
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn filtered(&self, keep: impl Fn(&Order) -> bool) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().map_err(|_| poisoned())?;
        Ok(newest_first(
            orders.values().filter(|o| keep(o)).cloned().collect(),
        ))
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().map_err(|_| poisoned())?;
        Ok(orders.get(&id).cloned())
    }

    async fn exists_by_id(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let orders = self.orders.read().map_err(|_| poisoned())?;
        Ok(orders.contains_key(&id))
    }

    async fn insert(&self, order: &Order) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().map_err(|_| poisoned())?;
        let id = order.id_typed();
        if orders.contains_key(&id) {
            return Err(RepositoryError::Conflict(format!("order {id} already exists")));
        }

        let stored = order.clone().with_version(1);
        orders.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        order: &Order,
        expected: ExpectedVersion,
    ) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().map_err(|_| poisoned())?;
        let id = order.id_typed();
        let current = orders
            .get(&id)
            .map(|o| o.version())
            .ok_or_else(|| RepositoryError::Conflict(format!("order {id} no longer exists")))?;

        if !expected.matches(current) {
            return Err(RepositoryError::Conflict(format!(
                "expected {expected:?}, found {current}"
            )));
        }

        let stored = order.clone().with_version(current + 1);
        orders.insert(id, stored.clone());
        Ok(stored)
    }

    async fn delete_by_id(
        &self,
        id: OrderId,
        expected: ExpectedVersion,
    ) -> Result<bool, RepositoryError> {
        let mut orders = self.orders.write().map_err(|_| poisoned())?;
        let Some(current) = orders.get(&id).map(|o| o.version()) else {
            return Ok(false);
        };

        if !expected.matches(current) {
            return Err(RepositoryError::Conflict(format!(
                "expected {expected:?}, found {current}"
            )));
        }

        Ok(orders.remove(&id).is_some())
    }

    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        self.filtered(|_| true)
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, RepositoryError> {
        self.filtered(|o| o.status() == status)
    }

    async fn find_by_table(&self, table_id: TableId) -> Result<Vec<Order>, RepositoryError> {
        self.filtered(|o| o.table_id() == Some(table_id))
    }

    async fn find_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, RepositoryError> {
        self.filtered(|o| o.created_at() >= start && o.created_at() <= end)
    }
}

/// In-memory table inventory (existence only).
#[derive(Debug, Default)]
pub struct InMemoryTableDirectory {
    tables: RwLock<HashSet<TableId>>,
}

impl InMemoryTableDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(tables: impl IntoIterator<Item = TableId>) -> Self {
        Self {
            tables: RwLock::new(tables.into_iter().collect()),
        }
    }

    pub fn add(&self, id: TableId) -> Result<(), RepositoryError> {
        self.tables.write().map_err(|_| poisoned())?.insert(id);
        Ok(())
    }
}

#[async_trait]
impl TableDirectory for InMemoryTableDirectory {
    async fn exists_by_id(&self, id: TableId) -> Result<bool, RepositoryError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables.contains(&id))
    }
}
