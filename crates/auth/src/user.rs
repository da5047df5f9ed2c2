//! The user record and its public projection.

use core::str::FromStr;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gatehouse_core::{AggregateRoot, UserId};

use crate::error::AuthError;
use crate::identity::{EmailAddress, IdentityGeneration, Username};
use crate::permissions::Permissions;
use crate::roles::Role;
use crate::token::ActionToken;

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

/// Account status.
///
/// ```text
/// unverifiedEmail --(verify)--> active
/// active <--(admin)--> disabled
/// unverifiedEmail --(admin)--> disabled
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum UserStatus {
    #[default]
    Active,
    Disabled,
    UnverifiedEmail,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Disabled => "disabled",
            UserStatus::UnverifiedEmail => "unverifiedEmail",
        }
    }

    /// Transitions an administrator may apply through the management path.
    ///
    /// Setting the current status again is a no-op and always allowed.
    /// `unverifiedEmail -> active` is reserved for email verification.
    pub fn admin_can_set(self, next: UserStatus) -> bool {
        use UserStatus::*;
        self == next
            || matches!(
                (self, next),
                (Active, Disabled) | (Disabled, Active) | (UnverifiedEmail, Disabled)
            )
    }
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "disabled" => Ok(UserStatus::Disabled),
            "unverifiedEmail" => Ok(UserStatus::UnverifiedEmail),
            _ => Err(AuthError::InvalidAccountStatus),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────────────────────────────────────

/// Sign-in provider.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Local,
    Google,
    Facebook,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::Google => "google",
            Provider::Facebook => "facebook",
        }
    }
}

impl core::fmt::Display for Provider {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Provider::Local),
            "google" => Ok(Provider::Google),
            "facebook" => Ok(Provider::Facebook),
            other => Err(AuthError::Validation(format!("unknown provider '{other}'"))),
        }
    }
}

/// A provider-specific sub-identity linked to a user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderIdentity {
    /// The user's id at the provider (the user id itself for `local`).
    pub external_id: String,
    pub display_name: Option<String>,
    pub picture: Option<String>,
    /// Provider access token. Never leaves the record.
    pub access_token: Option<String>,
    pub linked_at: DateTime<Utc>,
}

impl core::fmt::Debug for ProviderIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProviderIdentity")
            .field("external_id", &self.external_id)
            .field("display_name", &self.display_name)
            .field("picture", &self.picture)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("linked_at", &self.linked_at)
            .finish()
    }
}

/// Provider sub-identity as shown to clients (no provider tokens).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProviderIdentity {
    pub external_id: String,
    pub display_name: Option<String>,
    pub picture: Option<String>,
    pub linked_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Pending one-time action
// ─────────────────────────────────────────────────────────────────────────────

/// What a one-time action token proves.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionPurpose {
    VerifyEmail,
    ResetPassword,
}

impl ActionPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionPurpose::VerifyEmail => "verifyEmail",
            ActionPurpose::ResetPassword => "resetPassword",
        }
    }
}

impl core::fmt::Display for ActionPurpose {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single pending action of a user: a token always travels with its purpose.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    pub token: ActionToken,
    pub purpose: ActionPurpose,
    pub issued_at: DateTime<Utc>,
}

impl core::fmt::Debug for PendingAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PendingAction")
            .field("token", &"<redacted>")
            .field("purpose", &self.purpose)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A user record as held by the credential store.
///
/// # Invariants
/// - `id` never changes after creation.
/// - `permissions` only matter while `role == Role::User`.
/// - At most one pending action exists at a time.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub email: EmailAddress,
    pub first_name: String,
    pub last_name: String,
    /// Absent for accounts that only ever signed in through an OAuth provider.
    pub password_hash: Option<String>,
    pub role: Role,
    pub permissions: Permissions,
    pub status: UserStatus,
    pub identity_generation: IdentityGeneration,
    pub pending_action: Option<PendingAction>,
    pub linked_providers: BTreeMap<Provider, ProviderIdentity>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Store-managed write counter (0 = never persisted).
    pub version: u64,
}

impl User {
    /// A fresh, unsaved `user`-role record with no permissions and no providers.
    pub fn new(username: Username, email: EmailAddress, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            username,
            email,
            first_name: String::new(),
            last_name: String::new(),
            password_hash: None,
            role: Role::User,
            permissions: Permissions::none(),
            status: UserStatus::Active,
            identity_generation: IdentityGeneration::fresh(),
            pending_action: None,
            linked_providers: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn is_linked(&self, provider: Provider) -> bool {
        self.linked_providers.contains_key(&provider)
    }

    /// Link the `local` provider once a password hash has been set.
    pub fn link_local(&mut self, now: DateTime<Utc>) {
        let external_id = self.id.to_string();
        self.linked_providers
            .entry(Provider::Local)
            .or_insert_with(|| ProviderIdentity {
                external_id,
                display_name: None,
                picture: None,
                access_token: None,
                linked_at: now,
            });
    }

    /// Invalidate every session token issued so far.
    pub fn regenerate_identity(&mut self) {
        self.identity_generation = IdentityGeneration::fresh();
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn to_public(&self) -> PublicUser {
        PublicUser::from(self)
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl core::fmt::Debug for User {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("permissions", &self.permissions)
            .field("status", &self.status)
            .field("pending_action", &self.pending_action)
            .field("linked_providers", &self.linked_providers)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// What crosses the boundary to clients.
///
/// Excludes the password hash, the pending action and the identity generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub permissions: Permissions,
    pub status: UserStatus,
    pub linked_providers: BTreeMap<Provider, PublicProviderIdentity>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.as_str().to_string(),
            email: user.email.as_str().to_string(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            permissions: user.permissions,
            status: user.status,
            linked_providers: user
                .linked_providers
                .iter()
                .map(|(provider, identity)| {
                    (
                        *provider,
                        PublicProviderIdentity {
                            external_id: identity.external_id.clone(),
                            display_name: identity.display_name.clone(),
                            picture: identity.picture.clone(),
                            linked_at: identity.linked_at,
                        },
                    )
                })
                .collect(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
