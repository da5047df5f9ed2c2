//! Self-service account workflows.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use gatehouse_auth::{
    ActionPurpose, ActionToken, ActionTokenManager, AuthConfig, AuthError, AuthResult, AuthService, AuthzError,
    EmailAddress, ExternalProfile, NotificationSender, PasswordHasher, Provider, PublicUser, Role, SignIn,
    TemplateKind, TemplateParams, User, UserAction, UserStatus, UserStore, Username, extract_bearer,
};
use gatehouse_core::{ExpectedVersion, UserId};

use crate::dto::{NewAccount, ProfileUpdate};

pub struct AccountService<S> {
    pub(crate) auth: AuthService<S>,
    pub(crate) tokens: ActionTokenManager<S>,
    pub(crate) notifier: Arc<dyn NotificationSender>,
}

impl<S> AccountService<S>
where
    S: UserStore + Clone,
{
    pub fn new(
        store: S,
        hasher: Arc<dyn PasswordHasher>,
        notifier: Arc<dyn NotificationSender>,
        config: AuthConfig,
    ) -> AuthResult<Self> {
        let tokens = ActionTokenManager::new(store.clone(), config.clone());
        let auth = AuthService::new(store, hasher, config)?;
        Ok(Self { auth, tokens, notifier })
    }

    pub fn auth(&self) -> &AuthService<S> {
        &self.auth
    }

    pub(crate) fn store(&self) -> &S {
        self.auth.store()
    }

    pub(crate) fn config(&self) -> &AuthConfig {
        self.auth.config()
    }

    // -------------------------
    // Sign-up / sign-in
    // -------------------------

    /// Create a local account.
    ///
    /// With email verification on, the account starts out unverified and a
    /// verification link is sent.
    pub fn sign_up(&self, account: NewAccount, now: DateTime<Utc>) -> AuthResult<PublicUser> {
        let status = if self.config().verify_email {
            UserStatus::UnverifiedEmail
        } else {
            UserStatus::Active
        };
        let user = self.new_local_user(account, Role::User, status, now)?;
        let user = self.store().save(user, ExpectedVersion::Exact(0))?;
        info!(user_id = %user.id, %status, "account signed up");

        let user = if status == UserStatus::UnverifiedEmail {
            self.send_verification(user, now)?
        } else {
            user
        };
        Ok(user.to_public())
    }

    pub fn sign_in(&self, identifier: &str, password: &str, now: DateTime<Utc>) -> AuthResult<SignIn> {
        self.auth.sign_in_local(identifier, password, now)
    }

    pub fn sign_in_oauth(&self, provider: Provider, profile: ExternalProfile, now: DateTime<Utc>) -> AuthResult<SignIn> {
        self.auth.sign_in_oauth(provider, profile, now)
    }

    /// Resolve a session token to the acting user.
    pub fn authenticate(&self, token: &str, now: DateTime<Utc>) -> AuthResult<User> {
        self.auth.validate_session_token(token, now)
    }

    /// Like [`Self::authenticate`], from an `Authorization` header value.
    pub fn authenticate_header(&self, header: &str, now: DateTime<Utc>) -> AuthResult<User> {
        let token = extract_bearer(header).ok_or(AuthError::InvalidToken)?;
        self.authenticate(token, now)
    }

    // -------------------------
    // Email verification
    // -------------------------

    pub fn resend_verification(&self, identifier: &str, now: DateTime<Utc>) -> AuthResult<()> {
        let user = self.store().find_by_identity(identifier.trim())?.ok_or(AuthError::NotFound)?;
        self.send_verification(user, now)?;
        Ok(())
    }

    pub fn verify_email(&self, token: &str, now: DateTime<Utc>) -> AuthResult<PublicUser> {
        let token = ActionToken::from_client(token);
        let user = self
            .tokens
            .consume(&token, ActionPurpose::VerifyEmail, now, |user| match user.status {
                UserStatus::UnverifiedEmail => {
                    user.status = UserStatus::Active;
                    Ok(())
                }
                UserStatus::Active => Err(AuthError::EmailAlreadyVerified),
                UserStatus::Disabled => Err(AuthError::AccountDisabled),
            })?;
        info!(user_id = %user.id, "email verified");
        Ok(user.to_public())
    }

    fn send_verification(&self, user: User, now: DateTime<Utc>) -> AuthResult<User> {
        let (user, token) = self.tokens.issue(user, ActionPurpose::VerifyEmail, now)?;
        let link = self.config().action_link("verify-email", token.as_str());
        self.notify(&user, TemplateKind::VerifyEmail, Some(link))?;
        Ok(user)
    }

    // -------------------------
    // Passwords
    // -------------------------

    /// Send a reset link. Unknown addresses succeed without sending anything.
    pub fn forgot_password(&self, email: &str, now: DateTime<Utc>) -> AuthResult<()> {
        if !self.config().reset_password {
            return Err(AuthError::FeatureDisabled("password reset"));
        }
        let email = EmailAddress::parse(email)?;
        let Some(user) = self.store().find_by_email(email.as_str())? else {
            debug!("password reset requested for unknown email");
            return Ok(());
        };

        let (user, token) = self.tokens.issue(user, ActionPurpose::ResetPassword, now)?;
        let link = self.config().action_link("reset-password", token.as_str());
        self.notify(&user, TemplateKind::ResetPassword, Some(link))
    }

    /// Set a new password from a reset link. Every existing session dies.
    pub fn reset_password(&self, token: &str, new_password: &str, now: DateTime<Utc>) -> AuthResult<PublicUser> {
        let hash = self.auth.hash_password(new_password)?;
        let token = ActionToken::from_client(token);
        let user = self.tokens.consume(&token, ActionPurpose::ResetPassword, now, |user| {
            user.password_hash = Some(hash);
            user.link_local(now);
            user.regenerate_identity();
            Ok(())
        })?;
        info!(user_id = %user.id, "password reset");

        self.notify_password_changed(&user);
        Ok(user.to_public())
    }

    /// Replace the password of the signed-in user and hand back a fresh session.
    ///
    /// Accounts that never had a password (OAuth only) set one without
    /// presenting `current`.
    pub fn change_password(
        &self,
        actor: &User,
        current: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<SignIn> {
        let mut user = self.reload(actor.id)?;
        if user.password_hash.is_some() {
            self.auth.check_password(&user, current)?;
        }

        let expected = ExpectedVersion::of(&user);
        user.password_hash = Some(self.auth.hash_password(new_password)?);
        user.link_local(now);
        user.regenerate_identity();
        user.touch(now);
        let user = self.store().save(user, expected)?;
        info!(user_id = %user.id, "password changed");

        self.notify_password_changed(&user);
        self.auth.issue_session(&user, Provider::Local, now)
    }

    pub fn sign_out_everywhere(&self, actor: &User) -> AuthResult<()> {
        self.auth.invalidate_all_sessions(actor.id)?;
        Ok(())
    }

    // -------------------------
    // Profile
    // -------------------------

    pub fn update_profile(&self, actor: &User, update: ProfileUpdate, now: DateTime<Utc>) -> AuthResult<PublicUser> {
        let mut user = self.reload(actor.id)?;
        let expected = ExpectedVersion::of(&user);
        if let Some(first_name) = update.first_name {
            user.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = update.last_name {
            user.last_name = last_name.trim().to_string();
        }
        user.touch(now);
        Ok(self.store().save(user, expected)?.to_public())
    }

    /// Delete the signed-in user's own account.
    ///
    /// Accounts with a local login must confirm with their password. Root
    /// accounts cannot remove themselves.
    pub fn delete_own_account(&self, actor: &User, password: Option<&str>) -> AuthResult<()> {
        let user = self.reload(actor.id)?;
        if user.role == Role::Root {
            warn!(user_id = %user.id, "root account tried to delete itself");
            return Err(AuthzError::SelfAction(UserAction::Delete).into());
        }
        if user.is_linked(Provider::Local) {
            self.auth.check_password(&user, password.unwrap_or_default())?;
        }

        if !self.store().delete(user.id)? {
            return Err(AuthError::NotFound);
        }
        info!(user_id = %user.id, "account deleted by its owner");
        Ok(())
    }

    // -------------------------
    // Helpers
    // -------------------------

    /// Fresh copy of a record; the caller's may be stale.
    pub(crate) fn reload(&self, id: UserId) -> AuthResult<User> {
        self.store().find_by_id(id)?.ok_or(AuthError::NotFound)
    }

    /// Validate and hash, then build an unsaved record with a local login.
    pub(crate) fn new_local_user(
        &self,
        account: NewAccount,
        role: Role,
        status: UserStatus,
        now: DateTime<Utc>,
    ) -> AuthResult<User> {
        let username = Username::parse(&account.username)?;
        let email = EmailAddress::parse(&account.email)?;
        let hash = self.auth.hash_password(&account.password)?;

        let mut user = User::new(username, email, now);
        user.first_name = account.first_name.trim().to_string();
        user.last_name = account.last_name.trim().to_string();
        user.password_hash = Some(hash);
        user.role = role;
        user.status = status;
        user.link_local(now);
        Ok(user)
    }

    fn notify(&self, user: &User, template: TemplateKind, link: Option<String>) -> AuthResult<()> {
        let mut params = TemplateParams::new();
        params.insert("username".to_string(), user.username.to_string());
        params.insert("name".to_string(), user.full_name());
        if let Some(link) = link {
            params.insert("link".to_string(), link);
        }

        self.notifier.send(user.email.as_str(), template, &params).map_err(|e| {
            error!(user_id = %user.id, ?template, error = %e, "notification failed");
            AuthError::internal(e.to_string())
        })
    }

    /// The change already happened; a lost notice is only logged.
    fn notify_password_changed(&self, user: &User) {
        if self.notify(user, TemplateKind::PasswordChanged, None).is_err() {
            warn!(user_id = %user.id, "password changed without notice");
        }
    }
}
