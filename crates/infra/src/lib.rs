//! Infrastructure adapters: credential store, notification senders, config loading.

pub mod config;
pub mod notify;
pub mod store;

pub use config::{auth_config_from, load_auth_config};
pub use notify::{LogNotifier, Outbox, SentNotification};
pub use store::InMemoryUserStore;
