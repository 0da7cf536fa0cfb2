use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use bistro_core::{ExpectedVersion, OrderId, TableId};
use bistro_orders::{Order, OrderStatus};

/// Storage operation error.
///
/// These are **infrastructure errors** as opposed to domain errors (validation,
/// lifecycle rules).
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Optimistic concurrency check failed (stale version or concurrent delete).
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    /// Any other storage fault (connection, constraint, decoding, poisoned lock).
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Persistence of the order aggregate (order row + owned items as one unit).
///
/// ## Write Semantics
///
/// - `insert` stores a new order with all of its items and stamps version 1
/// - `update` replaces the order row **and** its item set atomically, only if
///   the stored version matches `expected`; the stored version is bumped by one
/// - `delete_by_id` removes the order and, by ownership, its items, under the
///   same version check
///
/// Implementations must make each write all-or-nothing. Listing operations
/// return orders newest first.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn exists_by_id(&self, id: OrderId) -> Result<bool, RepositoryError>;

    async fn insert(&self, order: &Order) -> Result<Order, RepositoryError>;

    async fn update(
        &self,
        order: &Order,
        expected: ExpectedVersion,
    ) -> Result<Order, RepositoryError>;

    /// Returns `false` if no such order was stored.
    async fn delete_by_id(
        &self,
        id: OrderId,
        expected: ExpectedVersion,
    ) -> Result<bool, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError>;

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, RepositoryError>;

    async fn find_by_table(&self, table_id: TableId) -> Result<Vec<Order>, RepositoryError>;

    /// Orders created within `[start, end]` (inclusive).
    async fn find_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, RepositoryError>;
}

/// Existence check against the table inventory.
#[async_trait]
pub trait TableDirectory: Send + Sync {
    async fn exists_by_id(&self, id: TableId) -> Result<bool, RepositoryError>;
}

#[async_trait]
impl<S> OrderRepository for Arc<S>
where
    S: OrderRepository + ?Sized,
{
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        (**self).find_by_id(id).await
    }

    async fn exists_by_id(&self, id: OrderId) -> Result<bool, RepositoryError> {
        (**self).exists_by_id(id).await
    }

    async fn insert(&self, order: &Order) -> Result<Order, RepositoryError> {
        (**self).insert(order).await
    }

    async fn update(
        &self,
        order: &Order,
        expected: ExpectedVersion,
    ) -> Result<Order, RepositoryError> {
        (**self).update(order, expected).await
    }

    async fn delete_by_id(
        &self,
        id: OrderId,
        expected: ExpectedVersion,
    ) -> Result<bool, RepositoryError> {
        (**self).delete_by_id(id, expected).await
    }

    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        (**self).list_all().await
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, RepositoryError> {
        (**self).find_by_status(status).await
    }

    async fn find_by_table(&self, table_id: TableId) -> Result<Vec<Order>, RepositoryError> {
        (**self).find_by_table(table_id).await
    }

    async fn find_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, RepositoryError> {
        (**self).find_created_between(start, end).await
    }
}

#[async_trait]
impl<S> TableDirectory for Arc<S>
where
    S: TableDirectory + ?Sized,
{
    async fn exists_by_id(&self, id: TableId) -> Result<bool, RepositoryError> {
        (**self).exists_by_id(id).await
    }
}
