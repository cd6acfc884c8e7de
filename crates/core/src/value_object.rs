//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value** — two value
/// objects with the same attribute values are the same value. `Money` is
/// the canonical example in this domain: `Money::from_major(100)` equals
/// any other 100.00, there is no identity to track.
///
/// The bounds keep value objects cheap to copy, comparable, and
/// debuggable; to "modify" one, construct a new value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
