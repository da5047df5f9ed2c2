//! Token generation: signed session tokens and opaque one-time action tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::claims::{SessionClaims, validate_claims};
use crate::user::{Provider, User};

/// Signing algorithm for session tokens.
pub const SESSION_ALGORITHM: Algorithm = Algorithm::HS512;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("bad token signature")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("token generation no longer matches the account")]
    GenerationMismatch,

    #[error("session signing secret is missing")]
    MissingSecret,

    #[error("token signing failed: {0}")]
    Signing(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Action tokens
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque one-time token for email verification or password reset.
///
/// 122 random bits (UUIDv4) rendered as 32 hex characters.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionToken(String);

impl ActionToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wrap a token received from a client. No validation: unknown tokens
    /// simply never match a pending action.
    pub fn from_client(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for ActionToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("ActionToken(<redacted>)")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session tokens
// ─────────────────────────────────────────────────────────────────────────────

/// Issues and verifies HS512-signed session tokens.
///
/// The secret is the only source of trust. Expiry is checked against the
/// caller's clock (see [`validate_claims`]) rather than the library's.
#[derive(Clone)]
pub struct SessionTokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl SessionTokenSigner {
    pub fn new(secret: &[u8], lifetime: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        if lifetime <= Duration::zero() {
            return Err(TokenError::InvalidTimeWindow);
        }

        let mut validation = Validation::new(SESSION_ALGORITHM);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            lifetime,
        })
    }

    /// Mint a session token for `user`, signed in through `provider`.
    pub fn issue(
        &self,
        user: &User,
        provider: Provider,
        now: DateTime<Utc>,
    ) -> Result<(String, SessionClaims), TokenError> {
        let claims = SessionClaims::new(user, provider, now, self.lifetime)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        let token = encode(&Header::new(SESSION_ALGORITHM), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok((token, claims))
    }

    /// Check format, signature and time window. Does not consult the user record.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

impl core::fmt::Debug for SessionTokenSigner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionTokenSigner")
            .field("algorithm", &SESSION_ALGORITHM)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn extract_bearer(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{EmailAddress, Username};

    fn signer() -> SessionTokenSigner {
        SessionTokenSigner::new(b"test-secret", Duration::days(60)).unwrap()
    }

    fn user() -> User {
        User::new(
            Username::parse("alice").unwrap(),
            EmailAddress::parse("a@x.com").unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn issued_token_verifies() {
        let now = Utc::now();
        let user = user();
        let (token, claims) = signer().issue(&user, Provider::Local, now).unwrap();
        let decoded = signer().verify(&token, now).unwrap();
        assert_eq!(decoded, claims);
        assert_eq!(decoded.user_id, user.id);
        assert_eq!(decoded.sub, user.identity_generation);
    }

    #[test]
    fn header_names_hs512() {
        let (token, _) = signer().issue(&user(), Provider::Google, Utc::now()).unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS512);
    }

    #[test]
    fn other_secret_is_a_bad_signature() {
        let now = Utc::now();
        let (token, _) = signer().issue(&user(), Provider::Local, now).unwrap();
        let other = SessionTokenSigner::new(b"another-secret", Duration::days(60)).unwrap();
        assert_eq!(other.verify(&token, now), Err(TokenError::BadSignature));
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = Utc::now();
        let short = SessionTokenSigner::new(b"test-secret", Duration::seconds(30)).unwrap();
        let (token, _) = short.issue(&user(), Provider::Local, now).unwrap();
        assert_eq!(short.verify(&token, now + Duration::minutes(1)), Err(TokenError::Expired));
    }

    #[test]
    fn unrepresentable_expiry_is_a_signing_failure() {
        let huge = SessionTokenSigner::new(b"test-secret", Duration::MAX).unwrap();
        let result = huge.issue(&user(), Provider::Local, Utc::now());
        assert!(matches!(result, Err(TokenError::Signing(_))));
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(signer().verify("not.a.jwt", Utc::now()), Err(TokenError::Malformed));
        assert_eq!(signer().verify("", Utc::now()), Err(TokenError::Malformed));
    }

    #[test]
    fn empty_secret_is_a_configuration_error() {
        assert_eq!(
            SessionTokenSigner::new(b"", Duration::days(1)).unwrap_err(),
            TokenError::MissingSecret
        );
    }

    #[test]
    fn action_tokens_are_unique_and_opaque() {
        let a = ActionToken::generate();
        let b = ActionToken::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(!format!("{a:?}").contains(a.as_str()));
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer   "), None);
        assert_eq!(extract_bearer("Basic dXNlcg=="), None);
    }
}
