//! Environment-driven configuration for the auth services.
//!
//! | Variable                            | Default                  |
//! |-------------------------------------|--------------------------|
//! | `JWT_SECRET`                        | `dev-secret` (warns)     |
//! | `GATEHOUSE_SESSION_LIFETIME_DAYS`   | 60                       |
//! | `GATEHOUSE_BCRYPT_COST`             | bcrypt default           |
//! | `GATEHOUSE_VERIFY_EMAIL`            | false                    |
//! | `GATEHOUSE_RESET_PASSWORD`          | true                     |
//! | `GATEHOUSE_ACTION_TOKEN_TTL_HOURS`  | 24 (0 disables expiry)   |
//! | `GATEHOUSE_PUBLIC_URL`              | `http://localhost:3000`  |

use std::str::FromStr;

use anyhow::Context;
use chrono::Duration;

use gatehouse_auth::AuthConfig;

/// Load from the process environment.
pub fn load_auth_config() -> anyhow::Result<AuthConfig> {
    auth_config_from(|key| std::env::var(key).ok())
}

const MAX_SESSION_LIFETIME_DAYS: i64 = 3650;
const MAX_ACTION_TOKEN_TTL_HOURS: i64 = 8760;

/// Load through an arbitrary variable lookup.
pub fn auth_config_from(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<AuthConfig> {
    let secret = lookup("JWT_SECRET").filter(|s| !s.is_empty()).unwrap_or_else(|| {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
        "dev-secret".to_string()
    });

    let mut config = AuthConfig::new(secret.into_bytes());

    if let Some(days) = parsed::<i64>(&lookup, "GATEHOUSE_SESSION_LIFETIME_DAYS")? {
        anyhow::ensure!(
            (1..=MAX_SESSION_LIFETIME_DAYS).contains(&days),
            "GATEHOUSE_SESSION_LIFETIME_DAYS must be within 1..={MAX_SESSION_LIFETIME_DAYS}"
        );
        config.session_lifetime = Duration::try_days(days).context("GATEHOUSE_SESSION_LIFETIME_DAYS out of range")?;
    }
    if let Some(cost) = parsed::<u32>(&lookup, "GATEHOUSE_BCRYPT_COST")? {
        anyhow::ensure!((4..=31).contains(&cost), "GATEHOUSE_BCRYPT_COST must be within 4..=31");
        config.bcrypt_cost = cost;
    }
    if let Some(on) = parsed::<bool>(&lookup, "GATEHOUSE_VERIFY_EMAIL")? {
        config.verify_email = on;
    }
    if let Some(on) = parsed::<bool>(&lookup, "GATEHOUSE_RESET_PASSWORD")? {
        config.reset_password = on;
    }
    if let Some(hours) = parsed::<i64>(&lookup, "GATEHOUSE_ACTION_TOKEN_TTL_HOURS")? {
        anyhow::ensure!(
            (0..=MAX_ACTION_TOKEN_TTL_HOURS).contains(&hours),
            "GATEHOUSE_ACTION_TOKEN_TTL_HOURS must be within 0..={MAX_ACTION_TOKEN_TTL_HOURS}"
        );
        config.action_token_ttl = match hours {
            0 => None,
            hours => Some(Duration::try_hours(hours).context("GATEHOUSE_ACTION_TOKEN_TTL_HOURS out of range")?),
        };
    }
    if let Some(url) = lookup("GATEHOUSE_PUBLIC_URL") {
        config.public_url = url;
    }

    tracing::debug!(?config, "auth config loaded");
    Ok(config)
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| raw.trim().parse::<T>().with_context(|| format!("invalid {key}: {raw:?}")))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<AuthConfig> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        auth_config_from(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.session_secret, b"dev-secret");
        assert_eq!(config.session_lifetime, Duration::days(60));
        assert!(!config.verify_email);
        assert!(config.reset_password);
        assert_eq!(config.action_token_ttl, Some(Duration::hours(24)));
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("JWT_SECRET", "s3cret"),
            ("GATEHOUSE_SESSION_LIFETIME_DAYS", "7"),
            ("GATEHOUSE_BCRYPT_COST", "4"),
            ("GATEHOUSE_VERIFY_EMAIL", "true"),
            ("GATEHOUSE_RESET_PASSWORD", "false"),
            ("GATEHOUSE_ACTION_TOKEN_TTL_HOURS", "0"),
            ("GATEHOUSE_PUBLIC_URL", "https://app.example.com"),
        ])
        .unwrap();

        assert_eq!(config.session_secret, b"s3cret");
        assert_eq!(config.session_lifetime, Duration::days(7));
        assert_eq!(config.bcrypt_cost, 4);
        assert!(config.verify_email);
        assert!(!config.reset_password);
        assert_eq!(config.action_token_ttl, None);
        assert_eq!(config.public_url, "https://app.example.com");
    }

    #[test]
    fn bad_values_are_reported_by_name() {
        let err = load(&[("GATEHOUSE_VERIFY_EMAIL", "yes please")]).unwrap_err();
        assert!(err.to_string().contains("GATEHOUSE_VERIFY_EMAIL"));

        assert!(load(&[("GATEHOUSE_SESSION_LIFETIME_DAYS", "0")]).is_err());
        assert!(load(&[("GATEHOUSE_BCRYPT_COST", "2")]).is_err());
    }

    #[test]
    fn oversized_durations_are_rejected() {
        assert!(load(&[("GATEHOUSE_SESSION_LIFETIME_DAYS", "1000000000")]).is_err());
        assert!(load(&[("GATEHOUSE_SESSION_LIFETIME_DAYS", "3651")]).is_err());
        assert!(load(&[("GATEHOUSE_ACTION_TOKEN_TTL_HOURS", "9999999999999")]).is_err());
        assert!(load(&[("GATEHOUSE_ACTION_TOKEN_TTL_HOURS", "-1")]).is_err());

        let config = load(&[("GATEHOUSE_ACTION_TOKEN_TTL_HOURS", "8760")]).unwrap();
        assert_eq!(config.action_token_ttl, Some(Duration::days(365)));
    }
}
