//! Value object trait: equality by value, not identity.
//!
//! Value objects are defined entirely by their attribute values. Two value objects
//! with the same values are considered equal.

/// Marker trait for value objects.
///
/// - **Value Object**: no identity (`Money` 9.50 is the same as any other 9.50)
/// - **Entity**: has identity (two order items with equal fields are still distinct lines)
///
/// Value objects are immutable; "changing" one means building a new value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
