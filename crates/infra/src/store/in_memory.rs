use std::collections::HashMap;
use std::sync::RwLock;

use gatehouse_auth::{ActionToken, Provider, StoreError, User, UserStore};
use gatehouse_core::{ExpectedVersion, UserId};

/// In-memory user store.
///
/// Intended for tests/dev. Every call takes the lock once, so each read or
/// conditional write is atomic. Lookups are linear scans.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, predicate: impl Fn(&User) -> bool) -> Result<Option<User>, StoreError> {
        let users = self
            .users
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(users.values().find(|u| predicate(u)).cloned())
    }

    fn ensure_unique(users: &HashMap<UserId, User>, candidate: &User) -> Result<(), StoreError> {
        let username = candidate.username.key();
        let pending = candidate.pending_action.as_ref().map(|p| &p.token);

        for other in users.values().filter(|u| u.id != candidate.id) {
            if other.username.key() == username {
                return Err(StoreError::Duplicate("username"));
            }
            if other.email == candidate.email {
                return Err(StoreError::Duplicate("email"));
            }
            if pending.is_some() && other.pending_action.as_ref().map(|p| &p.token) == pending {
                return Err(StoreError::Duplicate("action token"));
            }
        }
        Ok(())
    }
}

impl UserStore for InMemoryUserStore {
    fn find_by_identity(&self, identity: &str) -> Result<Option<User>, StoreError> {
        let key = identity.trim().to_lowercase();
        self.find(|u| u.username.key() == key || u.email.as_str() == key)
    }

    fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let users = self
            .users
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(users.get(&id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let key = email.trim().to_lowercase();
        self.find(|u| u.email.as_str() == key)
    }

    fn find_by_provider_identity(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<User>, StoreError> {
        self.find(|u| {
            u.linked_providers
                .get(&provider)
                .is_some_and(|identity| identity.external_id == external_id)
        })
    }

    fn find_by_action_token(&self, token: &ActionToken) -> Result<Option<User>, StoreError> {
        self.find(|u| u.pending_action.as_ref().is_some_and(|p| &p.token == token))
    }

    fn save(&self, user: User, expected: ExpectedVersion) -> Result<User, StoreError> {
        let mut users = self
            .users
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        let current = users.get(&user.id).map(|u| u.version).unwrap_or(0);
        expected
            .check(current)
            .map_err(|e| StoreError::Conflict(e.to_string()))?;
        Self::ensure_unique(&users, &user)?;

        let mut stored = user;
        stored.version = current + 1;
        users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let mut users = self
            .users
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(users.remove(&id).is_some())
    }

    fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = self
            .users
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by_key(|u| u.id);
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gatehouse_auth::{ActionPurpose, EmailAddress, PendingAction, ProviderIdentity, Username};

    fn user(name: &str, email: &str) -> User {
        User::new(Username::parse(name).unwrap(), EmailAddress::parse(email).unwrap(), Utc::now())
    }

    #[test]
    fn save_assigns_versions() {
        let store = InMemoryUserStore::new();
        let saved = store.save(user("alice", "a@x.com"), ExpectedVersion::Exact(0)).unwrap();
        assert_eq!(saved.version, 1);
        let again = store.save(saved.clone(), ExpectedVersion::of(&saved)).unwrap();
        assert_eq!(again.version, 2);
    }

    #[test]
    fn stale_write_is_a_conflict() {
        let store = InMemoryUserStore::new();
        let saved = store.save(user("alice", "a@x.com"), ExpectedVersion::Exact(0)).unwrap();
        store.save(saved.clone(), ExpectedVersion::of(&saved)).unwrap();

        let result = store.save(saved.clone(), ExpectedVersion::of(&saved));
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert!(store.save(saved, ExpectedVersion::Any).is_ok());
    }

    #[test]
    fn username_and_email_are_unique_case_insensitively() {
        let store = InMemoryUserStore::new();
        store.save(user("alice", "a@x.com"), ExpectedVersion::Exact(0)).unwrap();

        assert_eq!(
            store.save(user("ALICE", "b@x.com"), ExpectedVersion::Exact(0)),
            Err(StoreError::Duplicate("username"))
        );
        assert_eq!(
            store.save(user("bob", "A@X.com"), ExpectedVersion::Exact(0)),
            Err(StoreError::Duplicate("email"))
        );
    }

    #[test]
    fn lookups() {
        let store = InMemoryUserStore::new();
        let mut alice = user("Alice", "a@x.com");
        let token = ActionToken::generate();
        alice.pending_action = Some(PendingAction {
            token: token.clone(),
            purpose: ActionPurpose::ResetPassword,
            issued_at: Utc::now(),
        });
        alice.linked_providers.insert(
            Provider::Google,
            ProviderIdentity {
                external_id: "g-1".to_string(),
                display_name: None,
                picture: None,
                access_token: None,
                linked_at: Utc::now(),
            },
        );
        let alice = store.save(alice, ExpectedVersion::Exact(0)).unwrap();

        assert_eq!(store.find_by_identity("alice").unwrap().unwrap().id, alice.id);
        assert_eq!(store.find_by_identity(" A@x.COM ").unwrap().unwrap().id, alice.id);
        assert_eq!(store.find_by_id(alice.id).unwrap().unwrap(), alice);
        assert!(store.find_by_provider_identity(Provider::Google, "g-1").unwrap().is_some());
        assert!(store.find_by_provider_identity(Provider::Facebook, "g-1").unwrap().is_none());
        assert!(store.find_by_action_token(&token).unwrap().is_some());
        assert!(store.find_by_action_token(&ActionToken::generate()).unwrap().is_none());
    }

    #[test]
    fn delete_and_list() {
        let store = InMemoryUserStore::new();
        let a = store.save(user("alice", "a@x.com"), ExpectedVersion::Exact(0)).unwrap();
        let b = store.save(user("bob", "b@x.com"), ExpectedVersion::Exact(0)).unwrap();
        assert_eq!(store.list().unwrap().len(), 2);
        assert!(store.delete(a.id).unwrap());
        assert!(!store.delete(a.id).unwrap());
        assert_eq!(store.list().unwrap(), vec![b]);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 64,
                ..ProptestConfig::default()
            })]

            /// Property: a username differing only in case is always a duplicate
            /// and always resolves to the first record.
            #[test]
            fn usernames_collide_regardless_of_case(name in "[A-Za-z][A-Za-z0-9._-]{2,20}") {
                let store = InMemoryUserStore::new();
                let first = store.save(user(&name, "first@x.com"), ExpectedVersion::Exact(0)).unwrap();

                let flipped: String = name
                    .chars()
                    .map(|c| if c.is_ascii_uppercase() { c.to_ascii_lowercase() } else { c.to_ascii_uppercase() })
                    .collect();
                prop_assert_eq!(
                    store.save(user(&flipped, "second@x.com"), ExpectedVersion::Exact(0)),
                    Err(StoreError::Duplicate("username"))
                );
                prop_assert_eq!(store.find_by_identity(&flipped).unwrap().map(|u| u.id), Some(first.id));
            }
        }
    }
}
