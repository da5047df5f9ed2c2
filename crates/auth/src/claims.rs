use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use gatehouse_core::UserId;

use crate::identity::IdentityGeneration;
use crate::token::TokenError;
use crate::user::{Provider, User};

/// Session token claims.
///
/// Wire form: `{"sub", "userId", "provider", "iat", "exp"}` with Unix-second
/// timestamps. `sub` is the user's identity generation, not the user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub sub: IdentityGeneration,
    pub user_id: UserId,
    pub provider: Provider,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub iat: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub exp: DateTime<Utc>,
}

impl SessionClaims {
    /// Claims for `user` issued at `now` (truncated to whole seconds).
    ///
    /// Fails with `InvalidTimeWindow` when `iat + lifetime` is not representable.
    pub fn new(
        user: &User,
        provider: Provider,
        now: DateTime<Utc>,
        lifetime: Duration,
    ) -> Result<Self, TokenError> {
        let iat = now - Duration::nanoseconds(i64::from(now.timestamp_subsec_nanos()));
        let exp = iat.checked_add_signed(lifetime).ok_or(TokenError::InvalidTimeWindow)?;
        Ok(Self {
            sub: user.identity_generation,
            user_id: user.id,
            provider,
            iat,
            exp,
        })
    }

    pub fn ensure_generation(&self, current: &IdentityGeneration) -> Result<(), TokenError> {
        if &self.sub == current {
            Ok(())
        } else {
            Err(TokenError::GenerationMismatch)
        }
    }
}

/// Deterministically validate the time window of session claims.
///
/// Signature verification happens before this, in the signer.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), TokenError> {
    if claims.exp <= claims.iat {
        return Err(TokenError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{EmailAddress, Username};

    fn claims_at(now: DateTime<Utc>) -> SessionClaims {
        let user = User::new(
            Username::parse("alice").unwrap(),
            EmailAddress::parse("a@x.com").unwrap(),
            now,
        );
        SessionClaims::new(&user, Provider::Local, now, Duration::days(60)).unwrap()
    }

    #[test]
    fn window_is_checked_against_injected_clock() {
        let now = Utc::now();
        let claims = claims_at(now);
        assert!(validate_claims(&claims, now).is_ok());
        assert_eq!(validate_claims(&claims, now - Duration::minutes(1)), Err(TokenError::NotYetValid));
        assert_eq!(validate_claims(&claims, now + Duration::days(60)), Err(TokenError::Expired));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let now = Utc::now();
        let mut claims = claims_at(now);
        claims.exp = claims.iat;
        assert_eq!(validate_claims(&claims, now), Err(TokenError::InvalidTimeWindow));
    }

    #[test]
    fn wire_form_uses_unix_seconds() {
        let now = Utc::now();
        let claims = claims_at(now);
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["iat"], now.timestamp());
        assert_eq!(json["exp"], now.timestamp() + 60 * 24 * 3600);
        assert_eq!(json["provider"], "local");
        assert_eq!(json["userId"], claims.user_id.to_string());
    }

    #[test]
    fn lifetime_past_the_end_of_time_is_rejected() {
        let now = Utc::now();
        let user = User::new(
            Username::parse("alice").unwrap(),
            EmailAddress::parse("a@x.com").unwrap(),
            now,
        );
        let result = SessionClaims::new(&user, Provider::Local, now, Duration::MAX);
        assert_eq!(result, Err(TokenError::InvalidTimeWindow));
    }

    #[test]
    fn generation_must_match() {
        let claims = claims_at(Utc::now());
        assert!(claims.ensure_generation(&claims.sub).is_ok());
        assert_eq!(
            claims.ensure_generation(&IdentityGeneration::fresh()),
            Err(TokenError::GenerationMismatch)
        );
    }
}
