//! Authentication service: credential checks and session tokens.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, error, info};

use gatehouse_core::{ExpectedVersion, UserId};

use crate::claims::SessionClaims;
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::identity::{EmailAddress, USERNAME_MAX_LEN, USERNAME_MIN_LEN, Username, is_username_char};
use crate::password::{PasswordHasher, validate_password};
use crate::store::{StoreError, UserStore};
use crate::token::SessionTokenSigner;
use crate::user::{Provider, ProviderIdentity, PublicUser, User, UserStatus};

/// Attempts at deriving a free username for a new OAuth account.
const USERNAME_ATTEMPTS: usize = 5;

/// Room left in a derived username for the collision suffixes.
const USERNAME_BASE_LEN: usize = USERNAME_MAX_LEN - 2 * USERNAME_ATTEMPTS;

/// A successful sign-in.
#[derive(Debug, Clone)]
pub struct SignIn {
    pub token: String,
    pub claims: SessionClaims,
    pub user: PublicUser,
}

/// Profile handed over by an OAuth provider after it authenticated the user.
#[derive(Debug, Clone, Default)]
pub struct ExternalProfile {
    pub external_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub picture: Option<String>,
    pub access_token: Option<String>,
}

pub struct AuthService<S> {
    store: S,
    hasher: Arc<dyn PasswordHasher>,
    signer: SessionTokenSigner,
    config: AuthConfig,
}

impl<S> AuthService<S>
where
    S: UserStore,
{
    /// Fails when the session secret is missing (configuration error).
    pub fn new(store: S, hasher: Arc<dyn PasswordHasher>, config: AuthConfig) -> AuthResult<Self> {
        let signer = SessionTokenSigner::new(&config.session_secret, config.session_lifetime)?;
        Ok(Self {
            store,
            hasher,
            signer,
            config,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sign-in
    // ─────────────────────────────────────────────────────────────────────────

    /// Sign in with a username or email and a password.
    pub fn sign_in_local(&self, identifier: &str, password: &str, now: DateTime<Utc>) -> AuthResult<SignIn> {
        let Some(user) = self.store.find_by_identity(identifier.trim())? else {
            debug!("sign-in for unknown identity");
            return Err(AuthError::InvalidCredentials);
        };

        // OAuth-only accounts look exactly like unknown ones.
        if !user.is_linked(Provider::Local) {
            debug!(user_id = %user.id, "sign-in for account without local login");
            return Err(AuthError::InvalidCredentials);
        }

        self.check_password(&user, password)?;
        self.ensure_status(user.status)?;

        info!(user_id = %user.id, "signed in");
        self.issue_session(&user, Provider::Local, now)
    }

    /// Find or create the account behind an OAuth identity the provider
    /// already validated, and sign it in.
    pub fn sign_in_oauth(
        &self,
        provider: Provider,
        profile: ExternalProfile,
        now: DateTime<Utc>,
    ) -> AuthResult<SignIn> {
        if provider == Provider::Local {
            return Err(AuthError::Validation("local is not an OAuth provider".to_string()));
        }
        if profile.external_id.trim().is_empty() {
            return Err(AuthError::Validation("provider user id is missing".to_string()));
        }

        // A known provider identity needs nothing else; providers may omit the email.
        if let Some(user) = self.store.find_by_provider_identity(provider, &profile.external_id)? {
            let user = self.refresh_oauth_profile(user, provider, profile, now)?;
            return self.issue_session(&user, provider, now);
        }

        let email = EmailAddress::parse(&profile.email)?;
        let user = match self.store.find_by_email(email.as_str())? {
            Some(user) => self.refresh_oauth_profile(user, provider, profile, now)?,
            None => self.create_oauth_account(email, provider, profile, now)?,
        };

        self.issue_session(&user, provider, now)
    }

    fn refresh_oauth_profile(
        &self,
        mut user: User,
        provider: Provider,
        profile: ExternalProfile,
        now: DateTime<Utc>,
    ) -> AuthResult<User> {
        let expected = ExpectedVersion::of(&user);
        let entry = user
            .linked_providers
            .entry(provider)
            .or_insert_with(|| ProviderIdentity {
                external_id: profile.external_id.clone(),
                display_name: None,
                picture: None,
                access_token: None,
                linked_at: now,
            });
        entry.external_id = profile.external_id;
        if profile.display_name.is_some() {
            entry.display_name = profile.display_name;
        }
        if profile.picture.is_some() {
            entry.picture = profile.picture;
        }
        if profile.access_token.is_some() {
            entry.access_token = profile.access_token;
        }
        if user.first_name.is_empty() {
            user.first_name = profile.first_name.unwrap_or_default();
        }
        if user.last_name.is_empty() {
            user.last_name = profile.last_name.unwrap_or_default();
        }
        user.touch(now);

        debug!(user_id = %user.id, %provider, "refreshed provider profile");
        Ok(self.store.save(user, expected)?)
    }

    fn create_oauth_account(
        &self,
        email: EmailAddress,
        provider: Provider,
        profile: ExternalProfile,
        now: DateTime<Utc>,
    ) -> AuthResult<User> {
        let first_name = profile.first_name.unwrap_or_default();
        let last_name = profile.last_name.unwrap_or_default();
        let mut candidate = username_base(&email, &first_name, &last_name);

        for _ in 0..USERNAME_ATTEMPTS {
            let username = Username::parse(&candidate)?;
            if self.store.find_by_identity(username.as_str())?.is_none() {
                let mut user = User::new(username, email.clone(), now);
                user.first_name = first_name.clone();
                user.last_name = last_name.clone();
                user.linked_providers.insert(
                    provider,
                    ProviderIdentity {
                        external_id: profile.external_id.clone(),
                        display_name: profile.display_name.clone(),
                        picture: profile.picture.clone(),
                        access_token: profile.access_token.clone(),
                        linked_at: now,
                    },
                );

                match self.store.save(user, ExpectedVersion::Exact(0)) {
                    Ok(saved) => {
                        info!(user_id = %saved.id, %provider, "created account from provider profile");
                        return Ok(saved);
                    }
                    // Lost a race for this username; try another one.
                    Err(StoreError::Duplicate("username")) => {}
                    Err(e) => return Err(e.into()),
                }
            }
            candidate.push_str(&rand::thread_rng().gen_range(10..100).to_string());
        }

        Err(AuthError::internal("could not derive a unique username"))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────────

    /// Mint a session token for an account that has already been authenticated.
    pub fn issue_session(&self, user: &User, provider: Provider, now: DateTime<Utc>) -> AuthResult<SignIn> {
        let (token, claims) = self.signer.issue(user, provider, now)?;
        Ok(SignIn {
            token,
            claims,
            user: user.to_public(),
        })
    }

    /// Resolve a presented session token to the current user record.
    pub fn validate_session_token(&self, token: &str, now: DateTime<Utc>) -> AuthResult<User> {
        let claims = self.signer.verify(token, now).map_err(|e| {
            debug!(error = %e, "session token rejected");
            AuthError::from(e)
        })?;

        let Some(user) = self.store.find_by_id(claims.user_id)? else {
            debug!(user_id = %claims.user_id, "session token for missing account");
            return Err(AuthError::InvalidCredentials);
        };

        claims.ensure_generation(&user.identity_generation).map_err(|e| {
            debug!(user_id = %user.id, "session token from an older identity generation");
            AuthError::from(e)
        })?;
        self.ensure_status(user.status)?;

        Ok(user)
    }

    /// Regenerate the identity generation, killing every session issued so far.
    pub fn invalidate_all_sessions(&self, user_id: UserId) -> AuthResult<User> {
        let mut user = self.store.find_by_id(user_id)?.ok_or(AuthError::NotFound)?;
        let expected = ExpectedVersion::of(&user);
        user.regenerate_identity();
        let saved = self.store.save(user, expected)?;
        info!(user_id = %saved.id, "invalidated all sessions");
        Ok(saved)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Passwords
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply the password policy, then hash.
    pub fn hash_password(&self, password: &str) -> AuthResult<String> {
        validate_password(password).map_err(AuthError::Validation)?;
        self.hasher.hash(password).map_err(|e| AuthError::internal(e.to_string()))
    }

    /// Compare `password` with the stored hash. A corrupt hash is logged and denied.
    pub fn check_password(&self, user: &User, password: &str) -> AuthResult<()> {
        let Some(hash) = user.password_hash.as_deref() else {
            return Err(AuthError::InvalidCredentials);
        };
        match self.hasher.verify(password, hash) {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(user_id = %user.id, "password mismatch");
                Err(AuthError::InvalidCredentials)
            }
            Err(e) => {
                error!(user_id = %user.id, error = %e, "stored password hash is unusable");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Status gate shared by sign-in and session validation.
    pub fn ensure_status(&self, status: UserStatus) -> AuthResult<()> {
        match status {
            UserStatus::Active => Ok(()),
            UserStatus::Disabled => Err(AuthError::AccountDisabled),
            UserStatus::UnverifiedEmail if self.config.verify_email => Err(AuthError::EmailNotVerified),
            // Only the error differs with enforcement on; the account is not active either way.
            UserStatus::UnverifiedEmail => Err(AuthError::AccountDisabled),
        }
    }
}

/// Username derived from the email local part, or from the person's name.
fn username_base(email: &EmailAddress, first_name: &str, last_name: &str) -> String {
    let clean = |s: &str| -> String { s.chars().filter(|c| is_username_char(*c)).collect() };

    let mut base = clean(email.local_part());
    if base.len() < USERNAME_MIN_LEN {
        base = clean(&format!("{first_name}.{last_name}")).trim_matches('.').to_string();
    }
    if base.len() < USERNAME_MIN_LEN {
        base = format!("user{base}");
    }
    base.truncate(USERNAME_BASE_LEN);
    base
}
