use chrono::{DateTime, Utc};
use serde::Deserialize;

use bistro_core::{AggregateRoot, TableId, UserId};
use bistro_orders::{LineItem, Order, OrderDetails, OrderDraft, OrderItem, OrderItemInput};

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /orders`. A `status` field, if sent, is ignored: new orders
/// always start as `PENDING`.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub table_id: Option<TableId>,
    pub user_id: Option<UserId>,
    pub notes: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItemInput>,
}

impl From<CreateOrderRequest> for OrderDraft {
    fn from(req: CreateOrderRequest) -> Self {
        OrderDraft {
            table_id: req.table_id,
            user_id: req.user_id,
            notes: req.notes,
            customer_name: req.customer_name,
            customer_phone: req.customer_phone,
            items: req.items,
        }
    }
}

/// Body of `PUT /orders/:id`. Omitting `items` keeps the current lines.
#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub notes: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub items: Option<Vec<OrderItemInput>>,
}

impl From<UpdateOrderRequest> for OrderDetails {
    fn from(req: UpdateOrderRequest) -> Self {
        OrderDetails {
            notes: req.notes,
            customer_name: req.customer_name,
            customer_phone: req.customer_phone,
            items: req.items,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct CalculateTotalRequest {
    #[serde(default)]
    pub items: Vec<OrderItemInput>,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub start: String, // RFC3339
    pub end: String,   // RFC3339
}

impl DateRangeQuery {
    pub fn parse(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), String> {
        Ok((parse_timestamp("start", &self.start)?, parse_timestamp("end", &self.end)?))
    }
}

fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("{field} must be an RFC3339 timestamp: {e}"))
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn order_to_json(order: &Order) -> serde_json::Value {
    serde_json::json!({
        "id": order.id_typed().to_string(),
        "table_id": order.table_id().map(|id| id.to_string()),
        "user_id": order.user_id().map(|id| id.to_string()),
        "status": order.status().as_str(),
        "total_amount": order.total_amount().to_string(),
        "notes": order.notes(),
        "customer_name": order.customer_name(),
        "customer_phone": order.customer_phone(),
        "created_at": order.created_at().to_rfc3339(),
        "updated_at": order.updated_at().to_rfc3339(),
        "version": order.version(),
        "items": order.items().iter().map(item_to_json).collect::<Vec<_>>(),
    })
}

pub fn orders_to_json(orders: &[Order]) -> serde_json::Value {
    serde_json::Value::Array(orders.iter().map(order_to_json).collect())
}

fn item_to_json(item: &OrderItem) -> serde_json::Value {
    serde_json::json!({
        "id": item.id_typed().to_string(),
        "menu_item_id": item.menu_item_id().to_string(),
        "quantity": item.quantity(),
        "unit_price": item.unit_price().to_string(),
        "subtotal": item.subtotal().map(|s| s.to_string()),
    })
}
