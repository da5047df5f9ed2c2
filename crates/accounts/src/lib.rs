//! Account workflows on top of the auth services.
//!
//! [`AccountService`] wires the authentication service, the action-token
//! manager, the credential store and the notification sender together. It
//! owns no transport: callers pass in already-authenticated actors and get
//! typed [`AuthError`](gatehouse_auth::AuthError)s back.

pub mod dto;
pub mod errors;
pub mod management;
pub mod service;

pub use dto::{NewAccount, NewUser, ProfileUpdate, UserUpdate};
pub use errors::{ErrorBody, error_body};
pub use service::AccountService;
