//! Notification senders.
//!
//! Real email delivery is an external collaborator; these two cover local
//! development (`LogNotifier`) and tests (`Outbox`).

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use gatehouse_auth::{NotificationSender, NotifyError, TemplateKind, TemplateParams};

/// Logs each notification instead of delivering it.
///
/// Parameter values carry one-time links, so only their keys are logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationSender for LogNotifier {
    fn send(&self, to: &str, template: TemplateKind, params: &TemplateParams) -> Result<(), NotifyError> {
        let keys: Vec<&str> = params.keys().map(String::as_str).collect();
        tracing::info!(recipient = %to, ?template, params = ?keys, "notification queued");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub to: String,
    pub template: TemplateKind,
    pub params: TemplateParams,
}

/// Records every notification in memory.
#[derive(Debug, Default)]
pub struct Outbox {
    sent: Mutex<Vec<SentNotification>>,
    failing: AtomicBool,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail (delivery outage).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Most recent notification addressed to `to`.
    pub fn last_for(&self, to: &str) -> Option<SentNotification> {
        self.sent().into_iter().rev().find(|n| n.to == to)
    }
}

impl NotificationSender for Outbox {
    fn send(&self, to: &str, template: TemplateKind, params: &TemplateParams) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError("outbox is failing".to_string()));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| NotifyError("lock poisoned".to_string()))?;
        sent.push(SentNotification {
            to: to.to_string(),
            template,
            params: params.clone(),
        });
        Ok(())
    }
}
