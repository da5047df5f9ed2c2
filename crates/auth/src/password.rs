//! Password hashing and policy.

use thiserror::Error;

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// bcrypt only looks at the first 72 bytes.
pub const MAX_PASSWORD_LENGTH: usize = 72;

const COMMON_PASSWORDS: &[&str] = &[
    "password", "12345678", "123456789", "1234567890", "qwertyuiop", "password1", "iloveyou",
    "sunshine1", "football", "baseball", "trustno1", "letmein1", "passw0rd", "superman",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("password cannot be empty")]
    EmptyPassword,

    /// The stored hash is not a valid bcrypt string (data corruption).
    #[error("malformed password hash: {0}")]
    MalformedHash(String),

    #[error("hashing engine failure: {0}")]
    Engine(String),
}

/// One-way password hashing.
pub trait PasswordHasher: Send + Sync {
    /// Salted, slow one-way transform. Fails only on empty input or engine error.
    fn hash(&self, plaintext: &str) -> Result<String, HashError>;

    /// `Ok(false)` on mismatch; `Err` only when `hashed` is not a valid hash.
    fn verify(&self, plaintext: &str, hashed: &str) -> Result<bool, HashError>;
}

/// bcrypt-backed hasher with a configurable cost factor.
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        if plaintext.is_empty() {
            return Err(HashError::EmptyPassword);
        }
        bcrypt::hash(plaintext, self.cost).map_err(|e| HashError::Engine(e.to_string()))
    }

    fn verify(&self, plaintext: &str, hashed: &str) -> Result<bool, HashError> {
        bcrypt::verify(plaintext, hashed).map_err(|e| HashError::MalformedHash(e.to_string()))
    }
}

/// Check a candidate password against the password policy.
///
/// Returns the user-facing reason on failure.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!("password must be at least {MIN_PASSWORD_LENGTH} characters"));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(format!("password must be at most {MAX_PASSWORD_LENGTH} bytes"));
    }
    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        return Err("password is too common".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Lowest cost bcrypt accepts; keeps the suite fast.
    const TEST_COST: u32 = 4;

    #[test]
    fn hash_and_verify() {
        let hasher = BcryptHasher::new(TEST_COST);
        let hash = hasher.hash("longenough1").unwrap();
        assert!(hash.starts_with("$2b$04$"));
        assert!(hasher.verify("longenough1", &hash).unwrap());
        assert!(!hasher.verify("longenough2", &hash).unwrap());
    }

    #[test]
    fn salts_differ() {
        let hasher = BcryptHasher::new(TEST_COST);
        assert_ne!(hasher.hash("longenough1").unwrap(), hasher.hash("longenough1").unwrap());
    }

    #[test]
    fn empty_password_is_rejected() {
        assert_eq!(BcryptHasher::new(TEST_COST).hash(""), Err(HashError::EmptyPassword));
    }

    #[test]
    fn corrupt_hash_is_an_error_not_a_mismatch() {
        let result = BcryptHasher::new(TEST_COST).verify("longenough1", "not-a-bcrypt-hash");
        assert!(matches!(result, Err(HashError::MalformedHash(_))));
    }

    #[test]
    fn policy() {
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"x".repeat(73)).is_err());
        assert!(validate_password("Password1").is_err());
        assert!(validate_password("longenough1").is_ok());
    }

    #[test]
    fn minimum_length_counts_characters_not_bytes() {
        // Eight bytes of UTF-8 but only four characters.
        assert_eq!("éééé".len(), 8);
        assert!(validate_password("éééé").is_err());
        assert!(validate_password("éééééééé").is_ok());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                // bcrypt is deliberately slow, even at the minimum cost.
                cases: 24,
                ..ProptestConfig::default()
            })]

            /// Property: any single-character mutation of the password fails verification.
            #[test]
            fn single_char_mutation_never_verifies(
                password in "[ -~]{1,32}",
                index in any::<prop::sample::Index>(),
                replacement in prop::char::range(' ', '~'),
            ) {
                let hasher = BcryptHasher::new(TEST_COST);
                let hash = hasher.hash(&password).unwrap();
                prop_assert!(hasher.verify(&password, &hash).unwrap());

                let mut chars: Vec<char> = password.chars().collect();
                let i = index.index(chars.len());
                prop_assume!(chars[i] != replacement);
                chars[i] = replacement;
                let mutated: String = chars.into_iter().collect();

                prop_assert!(!hasher.verify(&mutated, &hash).unwrap());
            }
        }
    }
}
