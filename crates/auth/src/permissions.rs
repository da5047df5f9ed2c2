use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Fine-grained capability name.
///
/// Only meaningful for accounts with role `user`; privileged roles satisfy
/// every permission implicitly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Permission {
    UserRead,
    UserModify,
    UserInsert,
    UserDelete,
    Debug,
}

impl Permission {
    pub const ALL: [Permission; 5] = [
        Permission::UserRead,
        Permission::UserModify,
        Permission::UserInsert,
        Permission::UserDelete,
        Permission::Debug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::UserRead => "userRead",
            Permission::UserModify => "userModify",
            Permission::UserInsert => "userInsert",
            Permission::UserDelete => "userDelete",
            Permission::Debug => "debug",
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| AuthError::Validation(format!("unknown permission '{s}'")))
    }
}

/// The fixed permission set carried on every user record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Permissions {
    pub user_read: bool,
    pub user_modify: bool,
    pub user_insert: bool,
    pub user_delete: bool,
    pub debug: bool,
}

impl Permissions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            user_read: true,
            user_modify: true,
            user_insert: true,
            user_delete: true,
            debug: true,
        }
    }

    pub fn of(granted: &[Permission]) -> Self {
        let mut perms = Self::none();
        for p in granted {
            perms.set(*p, true);
        }
        perms
    }

    pub fn has(&self, permission: Permission) -> bool {
        match permission {
            Permission::UserRead => self.user_read,
            Permission::UserModify => self.user_modify,
            Permission::UserInsert => self.user_insert,
            Permission::UserDelete => self.user_delete,
            Permission::Debug => self.debug,
        }
    }

    pub fn set(&mut self, permission: Permission, value: bool) {
        let slot = match permission {
            Permission::UserRead => &mut self.user_read,
            Permission::UserModify => &mut self.user_modify,
            Permission::UserInsert => &mut self.user_insert,
            Permission::UserDelete => &mut self.user_delete,
            Permission::Debug => &mut self.debug,
        };
        *slot = value;
    }

    /// Permissions that are set in `self`, in declaration order.
    pub fn granted(&self) -> Vec<Permission> {
        Permission::ALL.into_iter().filter(|p| self.has(*p)).collect()
    }
}

/// How a list of required permissions is matched.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Every listed permission must be held.
    #[default]
    All,
    /// At least one listed permission must be held.
    Any,
}
