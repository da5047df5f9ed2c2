//! `gatehouse-auth`: authentication and authorization for user accounts.
//!
//! Decoupled from HTTP, storage and email delivery: those are reached through
//! the [`UserStore`] and [`NotificationSender`] ports.

pub mod action_token;
pub mod authn;
pub mod authorize;
pub mod claims;
pub mod config;
pub mod error;
pub mod identity;
pub mod notify;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod store;
pub mod token;
pub mod user;

pub use action_token::ActionTokenManager;
pub use authn::{AuthService, ExternalProfile, SignIn};
pub use authorize::{
    AuthzError, UserAction, authorize_permission_grant, authorize_role_assignment, authorize_role_change,
    authorize_user_action, can_act_on_user, has_permission, require_permissions,
};
pub use claims::{SessionClaims, validate_claims};
pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use identity::{EmailAddress, IdentityGeneration, Username};
pub use notify::{NotificationSender, NotifyError, TemplateKind, TemplateParams};
pub use password::{BcryptHasher, HashError, PasswordHasher, validate_password};
pub use permissions::{MatchMode, Permission, Permissions};
pub use roles::Role;
pub use store::{StoreError, UserStore};
pub use token::{ActionToken, SessionTokenSigner, TokenError, extract_bearer};
pub use user::{
    ActionPurpose, PendingAction, Provider, ProviderIdentity, PublicProviderIdentity, PublicUser, User,
    UserStatus,
};
