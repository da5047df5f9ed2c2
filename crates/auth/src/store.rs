//! Credential store port.
//!
//! The auth services only see this trait; adapters live in `gatehouse-infra`.

use std::sync::Arc;

use thiserror::Error;

use gatehouse_core::{ExpectedVersion, UserId};

use crate::token::ActionToken;
use crate::user::{Provider, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique field (`username`, `email`, `action token`) is taken by another record.
    #[error("duplicate {0}")]
    Duplicate(&'static str),

    /// The stored version did not match the expected version.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence of user records.
///
/// Implementations must make each call atomic for the record it touches and
/// enforce case-insensitive uniqueness of username and email at `save`.
pub trait UserStore: Send + Sync {
    /// Look up by username or email, case-insensitively.
    fn find_by_identity(&self, identity: &str) -> Result<Option<User>, StoreError>;

    fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    fn find_by_provider_identity(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<User>, StoreError>;

    fn find_by_action_token(&self, token: &ActionToken) -> Result<Option<User>, StoreError>;

    /// Insert or replace `user`, conditioned on `expected` matching the stored
    /// version (0 when absent). Returns the record with its new version.
    fn save(&self, user: User, expected: ExpectedVersion) -> Result<User, StoreError>;

    /// Returns `false` when there was nothing to delete.
    fn delete(&self, id: UserId) -> Result<bool, StoreError>;

    fn list(&self) -> Result<Vec<User>, StoreError>;
}

impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    fn find_by_identity(&self, identity: &str) -> Result<Option<User>, StoreError> {
        (**self).find_by_identity(identity)
    }

    fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        (**self).find_by_id(id)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        (**self).find_by_email(email)
    }

    fn find_by_provider_identity(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<User>, StoreError> {
        (**self).find_by_provider_identity(provider, external_id)
    }

    fn find_by_action_token(&self, token: &ActionToken) -> Result<Option<User>, StoreError> {
        (**self).find_by_action_token(token)
    }

    fn save(&self, user: User, expected: ExpectedVersion) -> Result<User, StoreError> {
        (**self).save(user, expected)
    }

    fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        (**self).delete(id)
    }

    fn list(&self) -> Result<Vec<User>, StoreError> {
        (**self).list()
    }
}
