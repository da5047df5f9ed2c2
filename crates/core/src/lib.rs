//! `gatehouse-core`: domain building blocks shared by every gatehouse crate.
//!
//! Nothing in here knows about passwords, tokens or storage.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::UserId;
pub use value_object::ValueObject;
