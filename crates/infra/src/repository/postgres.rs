//! Postgres-backed order storage.
//!
//! The order row and its item rows are written in one transaction. Writes to
//! an existing order are guarded by the `version` column: the `UPDATE`/`DELETE`
//! only matches when the stored version equals the caller's expectation, so a
//! concurrent writer that committed first turns the second write into a
//! conflict instead of a lost update.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | RepositoryError |
//! |------------|----------------------|-----------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any | `Backend` |
//! | PoolClosed / other | N/A | `Backend` |
//!
//! Rows that fail to decode into domain values (unknown status, sub-cent
//! amount) are reported as `Backend`.
//!
//! Reads run the order query and the item query inside one `REPEATABLE READ`
//! transaction, so an order is never paired with items from a later version.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{instrument, Span};
use uuid::Uuid;

use bistro_core::{ExpectedVersion, MenuItemId, Money, OrderId, OrderItemId, TableId, UserId};
use bistro_orders::{LineItem, Order, OrderItem, OrderParts, OrderStatus};

use super::r#trait::{OrderRepository, RepositoryError, TableDirectory};

const SCHEMA: &str = include_str!("../../migrations/0001_orders.sql");

const READ_SNAPSHOT: &str = "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY";

const ORDER_COLUMNS: &str = r#"
    id,
    table_id,
    user_id,
    status,
    notes,
    customer_name,
    customer_phone,
    created_at,
    updated_at,
    version
"#;

/// Postgres order repository.
#[derive(Debug, Clone)]
pub struct PostgresOrderRepository {
    pool: Arc<PgPool>,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Share an existing pool (e.g. with [`PostgresTableDirectory`]).
    pub fn from_shared(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create the order tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    /// Run an order query and attach each order's items, both from one
    /// snapshot.
    async fn fetch_orders<'q>(
        &self,
        operation: &'static str,
        query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query(READ_SNAPSHOT)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        let rows = query
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        let orders = rows
            .iter()
            .map(OrderRow::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| decode_error("order", e))?;

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut items = load_items(&mut tx, &ids).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        let mut out = Vec::with_capacity(orders.len());
        for row in orders {
            let lines = items.remove(&row.id).unwrap_or_default();
            out.push(row.into_order(lines)?);
        }

        Span::current().record("order_count", out.len());
        Ok(out)
    }
}

async fn load_items(
    tx: &mut Transaction<'_, Postgres>,
    order_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<OrderItem>>, RepositoryError> {
    if order_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query(
        r#"
        SELECT id, order_id, menu_item_id, quantity, unit_price
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY order_id, position ASC
        "#,
    )
    .bind(order_ids)
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("load_items", e))?;

    let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for row in rows {
        let item = OrderItemRow::from_row(&row).map_err(|e| decode_error("order item", e))?;
        let order_id = item.order_id;
        by_order.entry(order_id).or_default().push(item.try_into()?);
    }
    Ok(by_order)
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let mut found = self
            .fetch_orders("find_by_id", sqlx::query(&sql).bind(*id.as_uuid()))
            .await?;
        Ok(found.pop())
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn exists_by_id(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1) AS present")
            .bind(*id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("exists_by_id", e))?;
        row.try_get("present").map_err(|e| decode_error("exists", e))
    }

    #[instrument(skip(self, order), fields(order_id = %order.id_typed()), err)]
    async fn insert(&self, order: &Order) -> Result<Order, RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id,
                table_id,
                user_id,
                status,
                total_amount,
                notes,
                customer_name,
                customer_phone,
                created_at,
                updated_at,
                version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 1)
            "#,
        )
        .bind(*order.id_typed().as_uuid())
        .bind(order.table_id().map(Uuid::from))
        .bind(order.user_id().map(Uuid::from))
        .bind(order.status().as_str())
        .bind(Decimal::from(order.total_amount()))
        .bind(order.notes())
        .bind(order.customer_name())
        .bind(order.customer_phone())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        insert_items(&mut tx, order).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(order.clone().with_version(1))
    }

    #[instrument(
        skip(self, order),
        fields(order_id = %order.id_typed(), expected_version = ?expected),
        err
    )]
    async fn update(
        &self,
        order: &Order,
        expected: ExpectedVersion,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(
            r#"
            UPDATE orders SET
                status = $2,
                total_amount = $3,
                notes = $4,
                customer_name = $5,
                customer_phone = $6,
                updated_at = $7,
                version = version + 1
            WHERE id = $1 AND ($8::BIGINT IS NULL OR version = $8)
            RETURNING version
            "#,
        )
        .bind(*order.id_typed().as_uuid())
        .bind(order.status().as_str())
        .bind(Decimal::from(order.total_amount()))
        .bind(order.notes())
        .bind(order.customer_name())
        .bind(order.customer_phone())
        .bind(order.updated_at())
        .bind(expected_as_i64(expected))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_order", e))?;

        let Some(row) = row else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(RepositoryError::Conflict(format!(
                "order {} changed or was removed (expected {expected:?})",
                order.id_typed()
            )));
        };
        let version: i64 = row.try_get("version").map_err(|e| decode_error("version", e))?;

        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(*order.id_typed().as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_items", e))?;
        insert_items(&mut tx, order).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("new_version", version);
        Ok(order.clone().with_version(version as u64))
    }

    #[instrument(skip(self), fields(order_id = %id, expected_version = ?expected), err)]
    async fn delete_by_id(
        &self,
        id: OrderId,
        expected: ExpectedVersion,
    ) -> Result<bool, RepositoryError> {
        // Items go with the order (ON DELETE CASCADE).
        let result = sqlx::query(
            "DELETE FROM orders WHERE id = $1 AND ($2::BIGINT IS NULL OR version = $2)",
        )
        .bind(*id.as_uuid())
        .bind(expected_as_i64(expected))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_order", e))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        if self.exists_by_id(id).await? {
            Err(RepositoryError::Conflict(format!(
                "order {id} changed concurrently (expected {expected:?})"
            )))
        } else {
            Ok(false)
        }
    }

    #[instrument(skip(self), err)]
    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC");
        self.fetch_orders("list_all", sqlx::query(&sql)).await
    }

    #[instrument(skip(self), fields(status = %status), err)]
    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 ORDER BY created_at DESC, id DESC"
        );
        self.fetch_orders("find_by_status", sqlx::query(&sql).bind(status.as_str()))
            .await
    }

    #[instrument(skip(self), fields(table_id = %table_id), err)]
    async fn find_by_table(&self, table_id: TableId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE table_id = $1 ORDER BY created_at DESC, id DESC"
        );
        self.fetch_orders("find_by_table", sqlx::query(&sql).bind(*table_id.as_uuid()))
            .await
    }

    #[instrument(skip(self), fields(start = %start, end = %end), err)]
    async fn find_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE created_at >= $1 AND created_at <= $2 \
             ORDER BY created_at DESC, id DESC"
        );
        self.fetch_orders(
            "find_created_between",
            sqlx::query(&sql).bind(start).bind(end),
        )
        .await
    }
}

/// Postgres view of the table inventory.
#[derive(Debug, Clone)]
pub struct PostgresTableDirectory {
    pool: Arc<PgPool>,
}

impl PostgresTableDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn from_shared(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Register a table id. Existing ids are left alone.
    #[instrument(skip(self), fields(table_id = %id), err)]
    pub async fn add(&self, id: TableId) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO restaurant_tables (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(*id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("add_table", e))?;
        Ok(())
    }
}

#[async_trait]
impl TableDirectory for PostgresTableDirectory {
    #[instrument(skip(self), fields(table_id = %id), err)]
    async fn exists_by_id(&self, id: TableId) -> Result<bool, RepositoryError> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM restaurant_tables WHERE id = $1) AS present",
        )
        .bind(*id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("table_exists", e))?;
        row.try_get("present").map_err(|e| decode_error("exists", e))
    }
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    order: &Order,
) -> Result<(), RepositoryError> {
    for (position, item) in order.items().iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, position, menu_item_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(*item.id_typed().as_uuid())
        .bind(*order.id_typed().as_uuid())
        .bind(position as i32)
        .bind(*item.menu_item_id().as_uuid())
        .bind(item.quantity())
        .bind(Decimal::from(item.unit_price()))
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
    }
    Ok(())
}

fn expected_as_i64(expected: ExpectedVersion) -> Option<i64> {
    match expected {
        ExpectedVersion::Any => None,
        ExpectedVersion::Exact(v) => Some(v as i64),
    }
}

fn decode_error(what: &str, err: sqlx::Error) -> RepositoryError {
    RepositoryError::Backend(format!("failed to decode {what} row: {err}"))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => RepositoryError::Conflict(msg),
                _ => RepositoryError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            RepositoryError::Backend(format!("connection pool closed in {operation}"))
        }
        other => RepositoryError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

// SQLx row types

#[derive(Debug)]
struct OrderRow {
    id: Uuid,
    table_id: Option<Uuid>,
    user_id: Option<Uuid>,
    status: String,
    notes: Option<String>,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl<'r> FromRow<'r, PgRow> for OrderRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderRow {
            id: row.try_get("id")?,
            table_id: row.try_get("table_id")?,
            user_id: row.try_get("user_id")?,
            status: row.try_get("status")?,
            notes: row.try_get("notes")?,
            customer_name: row.try_get("customer_name")?,
            customer_phone: row.try_get("customer_phone")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: row.try_get("version")?,
        })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let status: OrderStatus = self.status.parse().map_err(|e| {
            RepositoryError::Backend(format!("order {} has unreadable status: {e}", self.id))
        })?;

        let id = self.id;
        Order::restore(OrderParts {
            id: OrderId::from_uuid(self.id),
            table_id: self.table_id.map(TableId::from_uuid),
            user_id: self.user_id.map(UserId::from_uuid),
            status,
            notes: self.notes,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
            version: self.version as u64,
        })
        .map_err(|e| RepositoryError::Backend(format!("order {id} has unreadable items: {e}")))
    }
}

#[derive(Debug)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    menu_item_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
}

impl<'r> FromRow<'r, PgRow> for OrderItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderItemRow {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            menu_item_id: row.try_get("menu_item_id")?,
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
        })
    }
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let unit_price = Money::new(row.unit_price).map_err(|e| {
            RepositoryError::Backend(format!("order item {} has unreadable price: {e}", row.id))
        })?;

        Ok(OrderItem::restore(
            OrderItemId::from_uuid(row.id),
            OrderId::from_uuid(row.order_id),
            MenuItemId::from_uuid(row.menu_item_id),
            row.quantity,
            unit_price,
        ))
    }
}
