//! Error taxonomy of the authentication subsystem.
//!
//! Every variant is an expected, typed outcome except [`AuthError::Internal`],
//! which stands for storage outages and hashing/signing engine failures. Its
//! message is logged, never shown.

use thiserror::Error;

use gatehouse_core::DomainError;

use crate::authorize::AuthzError;
use crate::permissions::Permission;
use crate::roles::Role;
use crate::store::StoreError;
use crate::token::TokenError;
use crate::user::UserStatus;

/// Result type used across the auth services.
pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Same message whether the identifier or the password was wrong.
    #[error("invalid username/email or password")]
    InvalidCredentials,

    #[error("this account has been disabled")]
    AccountDisabled,

    #[error("the email address of this account has not been verified")]
    EmailNotVerified,

    #[error("this account is in an invalid state")]
    InvalidAccountStatus,

    #[error("invalid or expired session token")]
    InvalidToken,

    /// Action token unknown, already used, issued for another purpose, or too old.
    #[error("this link is invalid or has expired")]
    TokenExpired,

    #[error("the email address of this account is already verified")]
    EmailAlreadyVerified,

    #[error("{0}")]
    Forbidden(AuthzError),

    #[error("not allowed to change the role from '{from}' to '{to}'")]
    RoleChangeDenied { from: Role, to: Role },

    #[error("not allowed to grant the '{0}' permission")]
    PermissionGrantDenied(Permission),

    #[error("cannot change the account status from '{from}' to '{to}'")]
    InvalidStatusTransition { from: UserStatus, to: UserStatus },

    #[error("user not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("this {0} is already in use")]
    Duplicate(&'static str),

    #[error("{0} is disabled")]
    FeatureDisabled(&'static str),

    /// The record changed between load and save.
    #[error("this account was changed by another request; reload and try again")]
    Conflict,

    #[error("internal error")]
    Internal(String),
}

impl AuthError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable code for clients.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::AccountDisabled => "account_disabled",
            AuthError::EmailNotVerified => "email_not_verified",
            AuthError::InvalidAccountStatus => "invalid_account_status",
            AuthError::InvalidToken => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::EmailAlreadyVerified => "email_already_verified",
            AuthError::Forbidden(_) => "forbidden",
            AuthError::RoleChangeDenied { .. } => "role_change_denied",
            AuthError::PermissionGrantDenied(_) => "permission_grant_denied",
            AuthError::InvalidStatusTransition { .. } => "invalid_status_transition",
            AuthError::NotFound => "not_found",
            AuthError::Validation(_) => "validation_error",
            AuthError::Duplicate(_) => "duplicate",
            AuthError::FeatureDisabled(_) => "feature_disabled",
            AuthError::Conflict => "conflict",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Whether the error is an unexpected failure rather than a typed denial.
    pub fn is_internal(&self) -> bool {
        matches!(self, AuthError::Internal(_))
    }
}

impl From<AuthzError> for AuthError {
    fn from(value: AuthzError) -> Self {
        AuthError::Forbidden(value)
    }
}

impl From<DomainError> for AuthError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => AuthError::Validation(msg),
            DomainError::Conflict(_) => AuthError::Conflict,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Duplicate(field) => AuthError::Duplicate(field),
            StoreError::Conflict(_) => AuthError::Conflict,
            StoreError::Unavailable(msg) => AuthError::Internal(msg),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::MissingSecret | TokenError::Signing(_) => AuthError::Internal(value.to_string()),
            _ => AuthError::InvalidToken,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_details_stay_out_of_the_message() {
        let err = AuthError::internal("connection refused: db-primary:5432");
        assert_eq!(err.to_string(), "internal error");
        assert!(err.is_internal());
    }

    #[test]
    fn token_verification_failures_collapse_to_invalid_token() {
        assert_eq!(AuthError::from(TokenError::BadSignature), AuthError::InvalidToken);
        assert_eq!(AuthError::from(TokenError::Expired), AuthError::InvalidToken);
        assert!(AuthError::from(TokenError::MissingSecret).is_internal());
    }

    #[test]
    fn store_duplicates_keep_the_field() {
        let err = AuthError::from(StoreError::Duplicate("email"));
        assert_eq!(err.to_string(), "this email is already in use");
        assert_eq!(err.error_code(), "duplicate");
    }

    #[test]
    fn lost_updates_are_typed_conflicts() {
        let err = AuthError::from(StoreError::Conflict("expected version 1, found 2".to_string()));
        assert_eq!(err, AuthError::Conflict);
        assert_eq!(err.error_code(), "conflict");
        assert!(!err.is_internal());
        assert!(AuthError::from(StoreError::Unavailable("down".to_string())).is_internal());
    }
}
