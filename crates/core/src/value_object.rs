//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. An
/// email address is a value object; a user record (which has an id) is not.
/// Constructors are expected to validate, so a value that exists is valid.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
