//! Notification port (email delivery is somebody else's job).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

/// Which message to send.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    VerifyEmail,
    ResetPassword,
    PasswordChanged,
}

/// Template parameters, e.g. `username` and `link`.
pub type TemplateParams = BTreeMap<String, String>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

pub trait NotificationSender: Send + Sync {
    fn send(&self, to: &str, template: TemplateKind, params: &TemplateParams) -> Result<(), NotifyError>;
}

impl<N> NotificationSender for Arc<N>
where
    N: NotificationSender + ?Sized,
{
    fn send(&self, to: &str, template: TemplateKind, params: &TemplateParams) -> Result<(), NotifyError> {
        (**self).send(to, template, params)
    }
}
