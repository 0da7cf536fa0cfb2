use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bistro_core::{
    AggregateRoot, DomainError, DomainResult, Money, OrderId, TableId, UserId,
};

use crate::item::{OrderItem, OrderItemInput};
use crate::status::OrderStatus;
use crate::total::calculate_total;
use crate::validation::{validate_details, validate_draft};

/// Input for creating an order.
///
/// There is no status field: every new order starts as `PENDING`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    /// `None` for takeout.
    pub table_id: Option<TableId>,
    pub user_id: Option<UserId>,
    pub notes: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub items: Vec<OrderItemInput>,
}

/// Input for a full update of an order's editable fields.
///
/// Notes and customer fields are replaced (including with `None`). Items are
/// replaced only when supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub notes: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub items: Option<Vec<OrderItemInput>>,
}

/// Stored shape of an order, used by storage adapters to rehydrate one.
///
/// The total is not part of it: it is always derived from the items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderParts {
    pub id: OrderId,
    pub table_id: Option<TableId>,
    pub user_id: Option<UserId>,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
    pub version: u64,
}

/// Aggregate root: Order (with its exclusively owned items).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    id: OrderId,
    table_id: Option<TableId>,
    user_id: Option<UserId>,
    status: OrderStatus,
    total_amount: Money,
    notes: Option<String>,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    items: Vec<OrderItem>,
    version: u64,
}

impl Order {
    /// Build a new, not-yet-persisted order from a validated draft.
    pub fn create(id: OrderId, draft: OrderDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        validate_draft(&draft)?;

        let items = into_items(id, draft.items);
        Ok(Self {
            id,
            table_id: draft.table_id,
            user_id: draft.user_id,
            status: OrderStatus::Pending,
            total_amount: calculate_total(&items)?,
            notes: draft.notes,
            customer_name: draft.customer_name,
            customer_phone: draft.customer_phone,
            created_at: now,
            updated_at: now,
            items,
            version: 0,
        })
    }

    /// Rehydrate a stored order. The total is recomputed from the items.
    pub fn restore(parts: OrderParts) -> DomainResult<Self> {
        Ok(Self {
            total_amount: calculate_total(&parts.items)?,
            id: parts.id,
            table_id: parts.table_id,
            user_id: parts.user_id,
            status: parts.status,
            notes: parts.notes,
            customer_name: parts.customer_name,
            customer_phone: parts.customer_phone,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
            items: parts.items,
            version: parts.version,
        })
    }

    /// Stamp the version assigned by storage after a committed write.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn table_id(&self) -> Option<TableId> {
        self.table_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.customer_name.as_deref()
    }

    pub fn customer_phone(&self) -> Option<&str> {
        self.customer_phone.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn is_modifiable(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Replace notes and customer fields and, when supplied, the items.
    ///
    /// Status is untouched. Validation runs before anything changes.
    pub fn apply_details(&mut self, details: OrderDetails, now: DateTime<Utc>) -> DomainResult<()> {
        validate_details(&details)?;

        if !self.is_modifiable() {
            return Err(DomainError::invariant(format!(
                "cannot modify order in terminal status {}",
                self.status
            )));
        }

        if let Some(items) = details.items {
            let items = into_items(self.id, items);
            self.total_amount = calculate_total(&items)?;
            self.items = items;
        }

        self.notes = details.notes;
        self.customer_name = details.customer_name;
        self.customer_phone = details.customer_phone;

        self.updated_at = now;
        Ok(())
    }

    /// Move to `next` along a legal edge of the status machine.
    pub fn transition_to(&mut self, next: OrderStatus, now: DateTime<Utc>) -> DomainResult<()> {
        self.status.validate_transition(next)?;
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn ensure_deletable(&self) -> DomainResult<()> {
        if self.status.is_deletable() {
            Ok(())
        } else {
            Err(DomainError::deletion_forbidden("order", self.status))
        }
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

fn into_items(order_id: OrderId, inputs: Vec<OrderItemInput>) -> Vec<OrderItem> {
    inputs
        .into_iter()
        .map(|input| OrderItem::from_input(order_id, input))
        .collect()
}
