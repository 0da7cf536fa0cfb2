//! Structural validation of order input.
//!
//! Runs before any state-machine or persistence step; a failure here means
//! nothing is written.

use bistro_core::{DomainError, DomainResult};

use crate::item::OrderItemInput;
use crate::order::{OrderDetails, OrderDraft};
use crate::total::calculate_total;

pub const MAX_NOTES_LEN: usize = 500;
pub const MAX_CUSTOMER_NAME_LEN: usize = 100;
pub const MAX_CUSTOMER_PHONE_LEN: usize = 20;

/// An order needs at least one line, each with positive quantity and price,
/// and a total no larger than [`bistro_core::Money::MAX`].
pub fn validate_items(items: &[OrderItemInput]) -> DomainResult<()> {
    if items.is_empty() {
        return Err(DomainError::validation("order must have at least one item"));
    }

    for (idx, item) in items.iter().enumerate() {
        if item.quantity <= 0 {
            return Err(DomainError::validation(format!(
                "order item quantity must be greater than 0 (item {idx})"
            )));
        }
        if !item.unit_price.is_positive() {
            return Err(DomainError::validation(format!(
                "order item price must be greater than 0 (item {idx})"
            )));
        }
    }

    calculate_total(items).map(|_| ())
}

/// Length is counted in characters, not bytes.
pub fn validate_text(field: &str, value: Option<&str>, max: usize) -> DomainResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(DomainError::validation(format!(
            "{field} cannot exceed {max} characters"
        ))),
        _ => Ok(()),
    }
}

fn validate_contact(
    notes: Option<&str>,
    customer_name: Option<&str>,
    customer_phone: Option<&str>,
) -> DomainResult<()> {
    validate_text("notes", notes, MAX_NOTES_LEN)?;
    validate_text("customer name", customer_name, MAX_CUSTOMER_NAME_LEN)?;
    validate_text("customer phone", customer_phone, MAX_CUSTOMER_PHONE_LEN)
}

pub fn validate_draft(draft: &OrderDraft) -> DomainResult<()> {
    validate_items(&draft.items)?;
    validate_contact(
        draft.notes.as_deref(),
        draft.customer_name.as_deref(),
        draft.customer_phone.as_deref(),
    )
}

/// Same rules as [`validate_draft`]; an omitted item list keeps the current
/// items, but a supplied one must be non-empty.
pub fn validate_details(details: &OrderDetails) -> DomainResult<()> {
    if let Some(items) = &details.items {
        validate_items(items)?;
    }
    validate_contact(
        details.notes.as_deref(),
        details.customer_name.as_deref(),
        details.customer_phone.as_deref(),
    )
}
