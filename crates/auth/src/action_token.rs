//! One-time action tokens (email verification, password reset).
//!
//! A user has at most one pending action. Consuming it clears the token in the
//! same conditional write as the caller's follow-up mutation, so two racing
//! consumers cannot both succeed: the loser hits the version check (or no
//! longer finds the token) and gets `TokenExpired`.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use gatehouse_core::ExpectedVersion;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::store::{StoreError, UserStore};
use crate::token::ActionToken;
use crate::user::{ActionPurpose, PendingAction, User, UserStatus};

pub struct ActionTokenManager<S> {
    store: S,
    config: AuthConfig,
}

impl<S> ActionTokenManager<S>
where
    S: UserStore,
{
    pub fn new(store: S, config: AuthConfig) -> Self {
        Self { store, config }
    }

    /// Issue a fresh token for `purpose`, replacing whatever was pending.
    ///
    /// Returns the saved record and the token to embed in an outbound link.
    pub fn issue(&self, mut user: User, purpose: ActionPurpose, now: DateTime<Utc>) -> AuthResult<(User, ActionToken)> {
        self.ensure_enabled(purpose)?;
        if purpose == ActionPurpose::VerifyEmail && user.status != UserStatus::UnverifiedEmail {
            return Err(AuthError::EmailAlreadyVerified);
        }

        let expected = ExpectedVersion::of(&user);
        let token = ActionToken::generate();
        user.pending_action = Some(PendingAction {
            token: token.clone(),
            purpose,
            issued_at: now,
        });
        user.touch(now);

        let saved = self.store.save(user, expected)?;
        info!(user_id = %saved.id, %purpose, "issued action token");
        Ok((saved, token))
    }

    /// Consume `token` for `purpose`, applying `apply` to the record in the
    /// same write that clears the token.
    pub fn consume<F>(
        &self,
        token: &ActionToken,
        purpose: ActionPurpose,
        now: DateTime<Utc>,
        apply: F,
    ) -> AuthResult<User>
    where
        F: FnOnce(&mut User) -> AuthResult<()>,
    {
        self.ensure_enabled(purpose)?;

        let Some(mut user) = self.store.find_by_action_token(token)? else {
            debug!(%purpose, "unknown or already used action token");
            return Err(AuthError::TokenExpired);
        };

        let Some(pending) = user.pending_action.as_ref() else {
            return Err(AuthError::TokenExpired);
        };
        if pending.purpose != purpose {
            debug!(user_id = %user.id, expected = %purpose, found = %pending.purpose, "action token purpose mismatch");
            return Err(AuthError::TokenExpired);
        }
        if self.is_expired(pending, now) {
            debug!(user_id = %user.id, %purpose, "action token past its lifetime");
            return Err(AuthError::TokenExpired);
        }

        let expected = ExpectedVersion::of(&user);
        user.pending_action = None;
        apply(&mut user)?;
        user.touch(now);

        match self.store.save(user, expected) {
            Ok(saved) => {
                info!(user_id = %saved.id, %purpose, "consumed action token");
                Ok(saved)
            }
            Err(StoreError::Conflict(_)) => {
                debug!(%purpose, "action token consumed concurrently");
                Err(AuthError::TokenExpired)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn is_expired(&self, pending: &PendingAction, now: DateTime<Utc>) -> bool {
        self.config
            .action_token_ttl
            .and_then(|ttl| pending.issued_at.checked_add_signed(ttl))
            .is_some_and(|deadline| now >= deadline)
    }

    fn ensure_enabled(&self, purpose: ActionPurpose) -> AuthResult<()> {
        match purpose {
            ActionPurpose::VerifyEmail if !self.config.verify_email => {
                Err(AuthError::FeatureDisabled("email verification"))
            }
            ActionPurpose::ResetPassword if !self.config.reset_password => {
                Err(AuthError::FeatureDisabled("password reset"))
            }
            _ => Ok(()),
        }
    }
}
