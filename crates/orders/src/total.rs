//! Order total calculation.

use bistro_core::{DomainError, DomainResult, Money};

use crate::item::LineItem;

/// Sum of `unit_price × quantity` over `items`; zero for an empty sequence.
///
/// Pure. Quantities and prices are expected to have been validated already;
/// the only failure is a line subtotal or running total beyond [`Money::MAX`].
pub fn calculate_total<'a, L>(items: impl IntoIterator<Item = &'a L>) -> DomainResult<Money>
where
    L: LineItem + 'a,
{
    items
        .into_iter()
        .try_fold(Money::zero(), |total, item| {
            item.subtotal().and_then(|subtotal| total.checked_add(subtotal))
        })
        .ok_or_else(|| DomainError::validation(format!("order total exceeds {}", Money::MAX)))
}
