use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Coarse access tier.
///
/// Totally ordered: `Root > Admin > User`. The derived `Ord` relies on the
/// declaration order below, lowest first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    Root,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Root => "root",
        }
    }

    /// `admin` and `root` implicitly hold every permission.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin | Role::Root)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "root" => Ok(Role::Root),
            other => Err(AuthError::Validation(format!("unknown role '{other}'"))),
        }
    }
}
