use serde::{Deserialize, Serialize};

use bistro_core::{Entity, MenuItemId, Money, OrderId, OrderItemId};

/// Anything that contributes `quantity × unit_price` to an order total.
pub trait LineItem {
    fn quantity(&self) -> i32;
    fn unit_price(&self) -> Money;

    /// `None` when the product exceeds [`Money::MAX`].
    fn subtotal(&self) -> Option<Money> {
        self.unit_price().checked_times(self.quantity())
    }
}

/// A requested line, as supplied by a caller creating or updating an order.
///
/// `unit_price` is the menu price captured at ordering time; it is copied into
/// the persisted [`OrderItem`] and never tracks later menu changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemInput {
    pub menu_item_id: MenuItemId,
    pub quantity: i32,
    pub unit_price: Money,
}

impl LineItem for OrderItemInput {
    fn quantity(&self) -> i32 {
        self.quantity
    }

    fn unit_price(&self) -> Money {
        self.unit_price
    }
}

/// A line owned by exactly one [`crate::Order`]. Immutable once created; an
/// order update replaces the whole collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    id: OrderItemId,
    order_id: OrderId,
    menu_item_id: MenuItemId,
    quantity: i32,
    unit_price: Money,
}

impl OrderItem {
    pub(crate) fn from_input(order_id: OrderId, input: OrderItemInput) -> Self {
        Self {
            id: OrderItemId::new(),
            order_id,
            menu_item_id: input.menu_item_id,
            quantity: input.quantity,
            unit_price: input.unit_price,
        }
    }

    /// Rebuild a stored line (storage adapters only).
    pub fn restore(
        id: OrderItemId,
        order_id: OrderId,
        menu_item_id: MenuItemId,
        quantity: i32,
        unit_price: Money,
    ) -> Self {
        Self {
            id,
            order_id,
            menu_item_id,
            quantity,
            unit_price,
        }
    }

    pub fn id_typed(&self) -> OrderItemId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn menu_item_id(&self) -> MenuItemId {
        self.menu_item_id
    }
}

impl LineItem for OrderItem {
    fn quantity(&self) -> i32 {
        self.quantity
    }

    fn unit_price(&self) -> Money {
        self.unit_price
    }
}

impl Entity for OrderItem {
    type Id = OrderItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
