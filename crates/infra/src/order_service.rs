//! Order lifecycle engine.
//!
//! `OrderService` is the single entry point for everything that reads or
//! mutates orders. Each write follows the same pipeline:
//!
//! 1. Load the current aggregate (or check referenced tables)
//! 2. Apply the domain rule on the aggregate: structural validation, then the
//!    transition, update or delete guard
//! 3. Persist with `ExpectedVersion::Exact(loaded.version())`
//!
//! Creation validates the draft before any IO at all.
//!
//! A failure at any step stops the pipeline, so nothing is written unless
//! every check before the write passed.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use bistro_core::{AggregateRoot, DomainError, ExpectedVersion, Money, OrderId, TableId};
use bistro_orders::{
    calculate_total, Order, OrderDetails, OrderDraft, OrderItemInput, OrderStatus,
};

use crate::repository::{OrderRepository, RepositoryError, TableDirectory};

/// Failure of an engine operation.
///
/// One variant per failure kind; [`ServiceError::code`] gives the stable
/// identifier transports expose to clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{entity} not found with id: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("cannot delete order in status {status}")]
    DeletionForbidden { status: String },

    #[error("{0}")]
    InvariantViolation(String),

    /// The order changed between load and write.
    #[error("{0}")]
    Conflict(String),

    /// Storage fault. The message is for logs, not for clients.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::NotFound { .. } => "RESOURCE_NOT_FOUND",
            ServiceError::InvalidTransition { .. } => "INVALID_STATUS_TRANSITION",
            ServiceError::DeletionForbidden { .. } => "DELETION_FORBIDDEN",
            ServiceError::InvariantViolation(_) => "INVARIANT_VIOLATION",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn order_not_found(id: OrderId) -> Self {
        ServiceError::NotFound {
            entity: "order",
            id: id.to_string(),
        }
    }

    fn table_not_found(id: TableId) -> Self {
        ServiceError::NotFound {
            entity: "table",
            id: id.to_string(),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                ServiceError::Validation(msg)
            }
            DomainError::InvariantViolation(msg) => ServiceError::InvariantViolation(msg),
            DomainError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            DomainError::InvalidTransition { from, to } => {
                ServiceError::InvalidTransition { from, to }
            }
            DomainError::DeletionForbidden { status, .. } => {
                ServiceError::DeletionForbidden { status }
            }
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
        }
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(msg) => ServiceError::Conflict(msg),
            RepositoryError::Backend(msg) => {
                error!(error = %msg, "order storage failure");
                ServiceError::Internal(msg)
            }
        }
    }
}

/// Engine over a storage port and a table inventory port.
#[derive(Debug, Clone)]
pub struct OrderService<R, T> {
    orders: R,
    tables: T,
}

impl<R, T> OrderService<R, T>
where
    R: OrderRepository,
    T: TableDirectory,
{
    pub fn new(orders: R, tables: T) -> Self {
        Self { orders, tables }
    }

    /// Preview the total of a set of requested lines. Pure; fails only when
    /// the total would exceed [`Money::MAX`].
    pub fn calculate_total(&self, items: &[OrderItemInput]) -> Result<Money, ServiceError> {
        Ok(calculate_total(items)?)
    }

    /// Create a new `PENDING` order.
    pub async fn create(&self, draft: OrderDraft) -> Result<Order, ServiceError> {
        let order = Order::create(OrderId::new(), draft, Utc::now()).map_err(|e| {
            warn!(error = %e, "order creation rejected");
            ServiceError::from(e)
        })?;

        if let Some(table_id) = order.table_id() {
            self.require_table(table_id).await?;
        }

        let stored = self.orders.insert(&order).await?;
        info!(
            order_id = %stored.id_typed(),
            total = %stored.total_amount(),
            items = stored.items().len(),
            "order created"
        );
        Ok(stored)
    }

    /// Replace notes, customer fields and (when supplied) items.
    pub async fn update(&self, id: OrderId, details: OrderDetails) -> Result<Order, ServiceError> {
        let mut order = self.load(id).await?;
        let expected = ExpectedVersion::Exact(order.version());

        order.apply_details(details, Utc::now()).map_err(|e| {
            warn!(order_id = %id, status = %order.status(), error = %e, "order update rejected");
            ServiceError::from(e)
        })?;

        let stored = self.orders.update(&order, expected).await?;
        info!(order_id = %id, total = %stored.total_amount(), "order updated");
        Ok(stored)
    }

    /// Move an order along one edge of the status machine.
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, ServiceError> {
        let mut order = self.load(id).await?;
        let expected = ExpectedVersion::Exact(order.version());
        let previous = order.status();

        order.transition_to(next, Utc::now()).map_err(|e| {
            warn!(order_id = %id, from = %previous, to = %next, "status transition rejected");
            ServiceError::from(e)
        })?;

        let stored = self.orders.update(&order, expected).await?;
        info!(order_id = %id, from = %previous, to = %next, "order status changed");
        Ok(stored)
    }

    /// Remove an order and its items. Served and completed orders are kept.
    pub async fn delete(&self, id: OrderId) -> Result<(), ServiceError> {
        let order = self.load(id).await?;

        order.ensure_deletable().map_err(|e| {
            warn!(order_id = %id, status = %order.status(), "order deletion rejected");
            ServiceError::from(e)
        })?;

        let removed = self
            .orders
            .delete_by_id(id, ExpectedVersion::Exact(order.version()))
            .await?;
        if !removed {
            return Err(ServiceError::order_not_found(id));
        }

        info!(order_id = %id, "order deleted");
        Ok(())
    }

    pub async fn get(&self, id: OrderId) -> Result<Order, ServiceError> {
        self.load(id).await
    }

    /// All orders, newest first.
    pub async fn list(&self) -> Result<Vec<Order>, ServiceError> {
        Ok(self.orders.list_all().await?)
    }

    pub async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, ServiceError> {
        Ok(self.orders.find_by_status(status).await?)
    }

    pub async fn list_by_table(&self, table_id: TableId) -> Result<Vec<Order>, ServiceError> {
        self.require_table(table_id).await?;
        Ok(self.orders.find_by_table(table_id).await?)
    }

    /// Orders created in `[start, end]`.
    pub async fn list_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, ServiceError> {
        if start > end {
            return Err(ServiceError::Validation(format!(
                "start date {start} must not be after end date {end}"
            )));
        }
        Ok(self.orders.find_created_between(start, end).await?)
    }

    async fn load(&self, id: OrderId) -> Result<Order, ServiceError> {
        self.orders
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::order_not_found(id))
    }

    async fn require_table(&self, table_id: TableId) -> Result<(), ServiceError> {
        if self.tables.exists_by_id(table_id).await? {
            Ok(())
        } else {
            warn!(table_id = %table_id, "unknown table referenced");
            Err(ServiceError::table_not_found(table_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use bistro_core::MenuItemId;
    use bistro_orders::LineItem;
    use chrono::Duration;

    use super::*;
    use crate::repository::{InMemoryOrderRepository, InMemoryTableDirectory};

    /// Wraps the in-memory repository and counts every call.
    ///
    /// With `racing` set, every `find_by_id` is followed by a concurrent
    /// writer bumping the stored version, so the caller holds a stale copy.
    #[derive(Default)]
    struct CountingRepository {
        inner: InMemoryOrderRepository,
        calls: AtomicUsize,
        writes: AtomicUsize,
        racing: AtomicBool,
    }

    impl CountingRepository {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        fn read(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }

        fn write(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.writes.fetch_add(1, Ordering::SeqCst);
        }

        fn race(&self) {
            self.racing.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl OrderRepository for CountingRepository {
        async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
            self.read();
            let found = self.inner.find_by_id(id).await?;
            if let Some(order) = &found {
                if self.racing.load(Ordering::SeqCst) {
                    self.inner.update(order, ExpectedVersion::Any).await?;
                }
            }
            Ok(found)
        }

        async fn exists_by_id(&self, id: OrderId) -> Result<bool, RepositoryError> {
            self.read();
            self.inner.exists_by_id(id).await
        }

        async fn insert(&self, order: &Order) -> Result<Order, RepositoryError> {
            self.write();
            self.inner.insert(order).await
        }

        async fn update(
            &self,
            order: &Order,
            expected: ExpectedVersion,
        ) -> Result<Order, RepositoryError> {
            self.write();
            self.inner.update(order, expected).await
        }

        async fn delete_by_id(
            &self,
            id: OrderId,
            expected: ExpectedVersion,
        ) -> Result<bool, RepositoryError> {
            self.write();
            self.inner.delete_by_id(id, expected).await
        }

        async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
            self.read();
            self.inner.list_all().await
        }

        async fn find_by_status(
            &self,
            status: OrderStatus,
        ) -> Result<Vec<Order>, RepositoryError> {
            self.read();
            self.inner.find_by_status(status).await
        }

        async fn find_by_table(&self, table_id: TableId) -> Result<Vec<Order>, RepositoryError> {
            self.read();
            self.inner.find_by_table(table_id).await
        }

        async fn find_created_between(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<Order>, RepositoryError> {
            self.read();
            self.inner.find_created_between(start, end).await
        }
    }

    /// Storage that is always down.
    struct BrokenRepository;

    #[async_trait]
    impl OrderRepository for BrokenRepository {
        async fn find_by_id(&self, _: OrderId) -> Result<Option<Order>, RepositoryError> {
            Err(down())
        }

        async fn exists_by_id(&self, _: OrderId) -> Result<bool, RepositoryError> {
            Err(down())
        }

        async fn insert(&self, _: &Order) -> Result<Order, RepositoryError> {
            Err(down())
        }

        async fn update(&self, _: &Order, _: ExpectedVersion) -> Result<Order, RepositoryError> {
            Err(down())
        }

        async fn delete_by_id(&self, _: OrderId, _: ExpectedVersion) -> Result<bool, RepositoryError> {
            Err(down())
        }

        async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
            Err(down())
        }

        async fn find_by_status(&self, _: OrderStatus) -> Result<Vec<Order>, RepositoryError> {
            Err(down())
        }

        async fn find_by_table(&self, _: TableId) -> Result<Vec<Order>, RepositoryError> {
            Err(down())
        }

        async fn find_created_between(
            &self,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> Result<Vec<Order>, RepositoryError> {
            Err(down())
        }
    }

    fn down() -> RepositoryError {
        RepositoryError::Backend("connection refused".to_string())
    }

    type TestService = OrderService<Arc<CountingRepository>, Arc<InMemoryTableDirectory>>;

    fn service() -> (TestService, Arc<CountingRepository>, TableId) {
        let repo = Arc::new(CountingRepository::default());
        let table = TableId::new();
        let tables = Arc::new(InMemoryTableDirectory::with_tables([table]));
        (OrderService::new(repo.clone(), tables), repo, table)
    }

    fn line(quantity: i32, price: &str) -> OrderItemInput {
        OrderItemInput {
            menu_item_id: MenuItemId::new(),
            quantity,
            unit_price: price.parse().unwrap(),
        }
    }

    fn draft(table: Option<TableId>) -> OrderDraft {
        OrderDraft {
            table_id: table,
            customer_name: Some("Grace".to_string()),
            items: vec![line(2, "9.50"), line(1, "3.25")],
            ..OrderDraft::default()
        }
    }

    async fn advance(svc: &TestService, id: OrderId, path: &[OrderStatus]) {
        for status in path {
            svc.update_status(id, *status).await.unwrap();
        }
    }

    #[tokio::test]
    async fn create_computes_total_and_starts_pending() {
        let (svc, _, table) = service();

        let order = svc.create(draft(Some(table))).await.unwrap();

        assert_eq!(order.total_amount(), Money::from_cents(2225));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.version(), 1);
        assert_eq!(order.created_at(), order.updated_at());
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let (svc, _, table) = service();
        let supplied = draft(Some(table));

        let created = svc.create(supplied.clone()).await.unwrap();
        let loaded = svc.get(created.id_typed()).await.unwrap();

        assert_eq!(loaded, created);
        assert_eq!(loaded.status(), OrderStatus::Pending);
        assert_eq!(Ok(loaded.total_amount()), svc.calculate_total(&supplied.items));
        let lines: Vec<_> = loaded
            .items()
            .iter()
            .map(|i| (i.menu_item_id(), i.quantity(), i.unit_price()))
            .collect();
        let expected: Vec<_> = supplied
            .items
            .iter()
            .map(|i| (i.menu_item_id, i.quantity, i.unit_price))
            .collect();
        assert_eq!(lines, expected);
    }

    #[tokio::test]
    async fn zero_quantity_fails_before_any_persistence_call() {
        let (svc, repo, table) = service();
        let mut bad = draft(Some(table));
        bad.items.push(line(0, "4.00"));

        let err = svc.create(bad).await.unwrap_err();

        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(repo.calls(), 0);
    }

    #[tokio::test]
    async fn overflowing_totals_fail_validation_before_any_persistence_call() {
        let (svc, repo, table) = service();

        let mut huge = draft(Some(table));
        huge.items = vec![line(1000, "99999999.99")];
        let err = svc.create(huge).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let mut unbounded = draft(None);
        unbounded.items = vec![OrderItemInput {
            menu_item_id: MenuItemId::new(),
            quantity: 1000,
            unit_price: Money::from_cents(i64::MAX),
        }];
        let err = svc.create(unbounded).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(repo.calls(), 0);

        let id = svc.create(draft(Some(table))).await.unwrap().id_typed();
        let writes = repo.writes();
        let err = svc
            .update(
                id,
                OrderDetails {
                    items: Some(vec![line(2, "60000000.00")]),
                    ..OrderDetails::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(repo.writes(), writes);
        assert_eq!(svc.get(id).await.unwrap().total_amount(), Money::from_cents(2225));
    }

    #[tokio::test]
    async fn unknown_table_is_not_found_and_nothing_is_written() {
        let (svc, repo, _) = service();

        let err = svc.create(draft(Some(TableId::new()))).await.unwrap_err();

        assert!(matches!(err, ServiceError::NotFound { entity: "table", .. }));
        assert_eq!(repo.writes(), 0);
    }

    #[tokio::test]
    async fn takeout_orders_need_no_table() {
        let (svc, _, _) = service();
        let order = svc.create(draft(None)).await.unwrap();
        assert_eq!(order.table_id(), None);
    }

    #[tokio::test]
    async fn pending_to_confirmed_then_back_is_rejected() {
        let (svc, _, table) = service();
        let id = svc.create(draft(Some(table))).await.unwrap().id_typed();

        let confirmed = svc.update_status(id, OrderStatus::Confirmed).await.unwrap();
        assert_eq!(confirmed.status(), OrderStatus::Confirmed);

        let err = svc.update_status(id, OrderStatus::Pending).await.unwrap_err();
        assert_eq!(
            err,
            ServiceError::InvalidTransition {
                from: "CONFIRMED".to_string(),
                to: "PENDING".to_string(),
            }
        );
        assert_eq!(svc.get(id).await.unwrap().status(), OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn repeating_an_applied_status_fails_and_keeps_timestamp() {
        let (svc, _, table) = service();
        let id = svc.create(draft(Some(table))).await.unwrap().id_typed();

        let first = svc.update_status(id, OrderStatus::Confirmed).await.unwrap();

        for _ in 0..2 {
            let err = svc.update_status(id, OrderStatus::Confirmed).await.unwrap_err();
            assert_eq!(err.code(), "INVALID_STATUS_TRANSITION");
        }

        let after = svc.get(id).await.unwrap();
        assert_eq!(after.status(), OrderStatus::Confirmed);
        assert_eq!(after.updated_at(), first.updated_at());
    }

    #[tokio::test]
    async fn illegal_pairs_leave_status_unchanged() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                if from.can_transition_to(to) {
                    continue;
                }
                let (svc, _, table) = service();
                let id = svc.create(draft(Some(table))).await.unwrap().id_typed();
                advance(&svc, id, path_to(from)).await;

                let err = svc.update_status(id, to).await.unwrap_err();
                assert_eq!(err.code(), "INVALID_STATUS_TRANSITION", "{from} -> {to}");
                assert_eq!(svc.get(id).await.unwrap().status(), from);
            }
        }
    }

    fn path_to(target: OrderStatus) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match target {
            Pending => &[],
            Confirmed => &[Confirmed],
            Preparing => &[Confirmed, Preparing],
            Ready => &[Confirmed, Preparing, Ready],
            Served => &[Confirmed, Preparing, Ready, Served],
            Completed => &[Confirmed, Preparing, Ready, Completed],
            Cancelled => &[Cancelled],
        }
    }

    #[tokio::test]
    async fn served_and_completed_orders_cannot_be_deleted() {
        for status in [OrderStatus::Served, OrderStatus::Completed] {
            let (svc, _, table) = service();
            let id = svc.create(draft(Some(table))).await.unwrap().id_typed();
            advance(&svc, id, path_to(status)).await;

            let err = svc.delete(id).await.unwrap_err();
            assert_eq!(
                err,
                ServiceError::DeletionForbidden {
                    status: status.to_string()
                }
            );
            assert!(svc.get(id).await.is_ok());
        }
    }

    #[tokio::test]
    async fn pending_and_cancelled_orders_can_be_deleted() {
        for status in [OrderStatus::Pending, OrderStatus::Cancelled] {
            let (svc, _, table) = service();
            let id = svc.create(draft(Some(table))).await.unwrap().id_typed();
            advance(&svc, id, path_to(status)).await;

            svc.delete(id).await.unwrap();

            let err = svc.get(id).await.unwrap_err();
            assert_eq!(err.code(), "RESOURCE_NOT_FOUND");
        }
    }

    #[tokio::test]
    async fn missing_orders_are_not_found_everywhere() {
        let (svc, repo, _) = service();
        let id = OrderId::new();

        assert_eq!(svc.get(id).await.unwrap_err().code(), "RESOURCE_NOT_FOUND");
        assert_eq!(
            svc.update_status(id, OrderStatus::Confirmed).await.unwrap_err().code(),
            "RESOURCE_NOT_FOUND"
        );
        assert_eq!(
            svc.update(id, OrderDetails::default()).await.unwrap_err().code(),
            "RESOURCE_NOT_FOUND"
        );
        assert_eq!(svc.delete(id).await.unwrap_err().code(), "RESOURCE_NOT_FOUND");
        assert_eq!(repo.writes(), 0);
    }

    #[tokio::test]
    async fn update_replaces_items_and_recomputes_total() {
        let (svc, _, table) = service();
        let created = svc.create(draft(Some(table))).await.unwrap();

        let updated = svc
            .update(
                created.id_typed(),
                OrderDetails {
                    notes: Some("no onions".to_string()),
                    customer_name: Some("Grace".to_string()),
                    customer_phone: None,
                    items: Some(vec![line(4, "1.25")]),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.total_amount(), Money::from_cents(500));
        assert_eq!(Ok(updated.total_amount()), calculate_total(updated.items()));
        assert_eq!(updated.notes(), Some("no onions"));
        assert_eq!(updated.status(), OrderStatus::Pending);
        assert_eq!(updated.version(), 2);
        assert!(updated.updated_at() >= created.updated_at());
    }

    #[tokio::test]
    async fn update_without_items_keeps_existing_lines() {
        let (svc, _, table) = service();
        let created = svc.create(draft(Some(table))).await.unwrap();

        let updated = svc
            .update(
                created.id_typed(),
                OrderDetails {
                    notes: Some("birthday".to_string()),
                    ..OrderDetails::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.items(), created.items());
        assert_eq!(updated.total_amount(), Money::from_cents(2225));
        assert_eq!(updated.customer_name(), None);
    }

    #[tokio::test]
    async fn invalid_update_writes_nothing() {
        let (svc, repo, table) = service();
        let created = svc.create(draft(Some(table))).await.unwrap();
        let writes = repo.writes();

        let err = svc
            .update(
                created.id_typed(),
                OrderDetails {
                    customer_phone: Some("0".repeat(21)),
                    ..OrderDetails::default()
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(repo.writes(), writes);
        assert_eq!(svc.get(created.id_typed()).await.unwrap(), created);
    }

    #[tokio::test]
    async fn terminal_orders_cannot_be_updated() {
        let (svc, repo, table) = service();
        let id = svc.create(draft(Some(table))).await.unwrap().id_typed();
        advance(&svc, id, &[OrderStatus::Cancelled]).await;
        let writes = repo.writes();

        let err = svc.update(id, OrderDetails::default()).await.unwrap_err();

        assert_eq!(err.code(), "INVARIANT_VIOLATION");
        assert_eq!(repo.writes(), writes);
    }

    #[tokio::test]
    async fn writes_that_lose_a_race_are_conflicts_and_change_nothing() {
        let (svc, repo, table) = service();
        let id = svc.create(draft(Some(table))).await.unwrap().id_typed();
        repo.race();

        let err = svc.update_status(id, OrderStatus::Confirmed).await.unwrap_err();
        assert_eq!(err.code(), "CONFLICT");

        let err = svc
            .update(
                id,
                OrderDetails {
                    notes: Some("late change".to_string()),
                    items: Some(vec![line(1, "1.00")]),
                    ..OrderDetails::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");

        let err = svc.delete(id).await.unwrap_err();
        assert_eq!(err.code(), "CONFLICT");

        let stored = repo.inner.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::Pending);
        assert_eq!(stored.notes(), None);
        assert_eq!(stored.total_amount(), Money::from_cents(2225));
        // One bump per load; none of the service's own writes landed.
        assert_eq!(stored.version(), 4);
    }

    #[tokio::test]
    async fn list_queries_filter_by_status_table_and_date() {
        let (svc, _, table) = service();
        let a = svc.create(draft(Some(table))).await.unwrap();
        let b = svc.create(draft(None)).await.unwrap();
        svc.update_status(b.id_typed(), OrderStatus::Confirmed)
            .await
            .unwrap();

        assert_eq!(svc.list().await.unwrap().len(), 2);

        let pending = svc.list_by_status(OrderStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id_typed(), a.id_typed());

        let at_table = svc.list_by_table(table).await.unwrap();
        assert_eq!(at_table.len(), 1);
        assert_eq!(at_table[0].id_typed(), a.id_typed());

        let err = svc.list_by_table(TableId::new()).await.unwrap_err();
        assert_eq!(err.code(), "RESOURCE_NOT_FOUND");

        let now = Utc::now();
        let window = svc
            .list_by_date_range(now - Duration::hours(1), now + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(window.len(), 2);

        let err = svc
            .list_by_date_range(now, now - Duration::seconds(1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn storage_faults_are_internal_errors() {
        let svc = OrderService::new(BrokenRepository, InMemoryTableDirectory::new());

        let err = svc.create(draft(None)).await.unwrap_err();
        assert_eq!(err.code(), "INTERNAL_ERROR");

        let err = svc.list().await.unwrap_err();
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn calculate_total_preview_is_pure() {
        let (svc, repo, _) = service();
        let items = vec![line(2, "9.50"), line(1, "3.25")];

        assert_eq!(svc.calculate_total(&items), Ok(Money::from_cents(2225)));
        assert_eq!(svc.calculate_total(&[]), Ok(Money::zero()));

        let err = svc.calculate_total(&[line(1000, "99999999.99")]).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(repo.calls(), 0);
    }
}
