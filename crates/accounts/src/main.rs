use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;

use gatehouse_accounts::AccountService;
use gatehouse_auth::BcryptHasher;
use gatehouse_infra::{InMemoryUserStore, LogNotifier, load_auth_config};
use gatehouse_observability::LogFormat;

fn main() -> anyhow::Result<()> {
    let log_format = match std::env::var("GATEHOUSE_LOG_FORMAT") {
        Ok(raw) => raw.parse().context("invalid GATEHOUSE_LOG_FORMAT")?,
        Err(_) => LogFormat::default(),
    };
    gatehouse_observability::init(log_format);

    let config = load_auth_config()?;
    let hasher = Arc::new(BcryptHasher::new(config.bcrypt_cost));
    let store = Arc::new(InMemoryUserStore::new());
    let accounts = AccountService::new(store, hasher, Arc::new(LogNotifier), config)
        .context("failed to build account service")?;

    let username = required("GATEHOUSE_ROOT_USERNAME")?;
    let email = required("GATEHOUSE_ROOT_EMAIL")?;
    let password = required("GATEHOUSE_ROOT_PASSWORD")?;

    let now = Utc::now();
    let root = accounts
        .bootstrap_root(&username, &email, &password, now)
        .context("failed to bootstrap root account")?;
    let session = accounts
        .sign_in(&username, &password, now)
        .context("root account cannot sign in")?;

    tracing::info!(
        user_id = %root.id,
        expires_at = %session.claims.exp,
        "root account ready"
    );
    Ok(())
}

fn required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).with_context(|| format!("{key} must be set"))
}
