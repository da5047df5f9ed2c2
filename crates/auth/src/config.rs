use chrono::Duration;

use crate::password::DEFAULT_BCRYPT_COST;

/// Default session lifetime: 60 days.
pub const DEFAULT_SESSION_LIFETIME_DAYS: i64 = 60;

/// Default lifetime of a pending action token.
pub const DEFAULT_ACTION_TOKEN_TTL_HOURS: i64 = 24;

/// Settings injected into the auth services at construction.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for session tokens.
    pub session_secret: Vec<u8>,
    pub session_lifetime: Duration,
    pub bcrypt_cost: u32,
    /// Require a verified email before sign-in.
    pub verify_email: bool,
    /// Allow the forgot/reset password flow.
    pub reset_password: bool,
    /// `None` keeps pending tokens valid until used or superseded.
    pub action_token_ttl: Option<Duration>,
    /// Base URL that verification and reset links are built on.
    pub public_url: String,
}

impl AuthConfig {
    pub fn new(session_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            session_secret: session_secret.into(),
            ..Self::default()
        }
    }

    /// Link embedded in outbound notifications, e.g. `{public_url}/verify-email/{token}`.
    pub fn action_link(&self, path: &str, token: &str) -> String {
        format!("{}/{}/{}", self.public_url.trim_end_matches('/'), path.trim_matches('/'), token)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: Vec::new(),
            session_lifetime: Duration::days(DEFAULT_SESSION_LIFETIME_DAYS),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            verify_email: false,
            reset_password: true,
            action_token_ttl: Some(Duration::hours(DEFAULT_ACTION_TOKEN_TTL_HOURS)),
            public_url: "http://localhost:3000".to_string(),
        }
    }
}

impl core::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("session_secret", &"<redacted>")
            .field("session_lifetime", &self.session_lifetime)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("verify_email", &self.verify_email)
            .field("reset_password", &self.reset_password)
            .field("action_token_ttl", &self.action_token_ttl)
            .field("public_url", &self.public_url)
            .finish()
    }
}
