//! Authorization decisions for user-management actions.
//!
//! - No IO
//! - No panics
//! - Pure functions over roles, permissions and the two records involved

use serde::Serialize;
use thiserror::Error;

use crate::error::AuthError;
use crate::permissions::{MatchMode, Permission, Permissions};
use crate::roles::Role;
use crate::user::User;

/// An operation on another user's record through the management path.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UserAction {
    Read,
    Modify,
    Delete,
}

impl UserAction {
    /// The permission a plain `user` needs for this action.
    pub fn required_permission(self) -> Permission {
        match self {
            UserAction::Read => Permission::UserRead,
            UserAction::Modify => Permission::UserModify,
            UserAction::Delete => Permission::UserDelete,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserAction::Read => "read",
            UserAction::Modify => "modify",
            UserAction::Delete => "delete",
        }
    }
}

impl core::fmt::Display for UserAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a management action was denied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// Self-service changes go through the profile path instead.
    #[error("you cannot {0} your own account through user management")]
    SelfAction(UserAction),

    #[error("a root account cannot {0} another root account")]
    PeerRoot(UserAction),

    #[error("your role does not allow you to {action} a user with role '{target}'")]
    TargetOutranks { action: UserAction, target: Role },

    #[error("missing permission '{0}'")]
    MissingPermission(Permission),

    #[error("cannot {action} a user who also holds the '{permission}' permission")]
    TargetHoldsPermission { action: UserAction, permission: Permission },
}

/// Decide whether `actor` may perform `action` on `target`.
///
/// - `root` acts on anyone except another `root`.
/// - `admin` acts only on `user` accounts.
/// - `user` needs the action's permission, and the target must be a `user`
///   that does not hold that same permission.
/// - `read` is additionally granted to anyone holding `userRead`.
/// - Nobody acts on their own record here.
pub fn authorize_user_action(actor: &User, target: &User, action: UserAction) -> Result<(), AuthzError> {
    if actor.id == target.id {
        return Err(AuthzError::SelfAction(action));
    }

    let decision = match actor.role {
        Role::Root if target.role == Role::Root => Err(AuthzError::PeerRoot(action)),
        Role::Root => Ok(()),
        Role::Admin if target.role == Role::User => Ok(()),
        Role::Admin => Err(AuthzError::TargetOutranks { action, target: target.role }),
        Role::User => authorize_peer(actor, target, action),
    };

    match decision {
        Err(_) if action == UserAction::Read && has_permission(actor, &[Permission::UserRead], MatchMode::All) => {
            Ok(())
        }
        other => other,
    }
}

fn authorize_peer(actor: &User, target: &User, action: UserAction) -> Result<(), AuthzError> {
    if target.role != Role::User {
        return Err(AuthzError::TargetOutranks { action, target: target.role });
    }

    let required = action.required_permission();
    if !actor.permissions.has(required) {
        return Err(AuthzError::MissingPermission(required));
    }
    if target.permissions.has(required) {
        return Err(AuthzError::TargetHoldsPermission { action, permission: required });
    }
    Ok(())
}

/// Boolean form of [`authorize_user_action`].
pub fn can_act_on_user(actor: &User, target: &User, action: UserAction) -> bool {
    authorize_user_action(actor, target, action).is_ok()
}

/// Named-permission check. `root`/`admin` always pass.
pub fn has_permission(user: &User, required: &[Permission], mode: MatchMode) -> bool {
    if user.role.is_privileged() {
        return true;
    }
    match mode {
        MatchMode::All => required.iter().all(|p| user.permissions.has(*p)),
        MatchMode::Any => required.iter().any(|p| user.permissions.has(*p)),
    }
}

/// Like [`has_permission`] with `MatchMode::All`, as a `Result`.
pub fn require_permissions(user: &User, required: &[Permission]) -> Result<(), AuthzError> {
    if user.role.is_privileged() {
        return Ok(());
    }
    match required.iter().find(|p| !user.permissions.has(**p)) {
        Some(missing) => Err(AuthzError::MissingPermission(*missing)),
        None => Ok(()),
    }
}

/// Role-update sub-rule, checked before the general modify check.
///
/// - Keeping the current role is always allowed here.
/// - `root` may set any role on a non-root target.
/// - Everyone else may only set `user`.
pub fn authorize_role_change(actor: &User, target: &User, new_role: Role) -> Result<(), AuthError> {
    if new_role == target.role {
        return Ok(());
    }

    let allowed = match actor.role {
        Role::Root => target.role != Role::Root,
        Role::Admin | Role::User => new_role == Role::User,
    };

    if allowed {
        Ok(())
    } else {
        Err(AuthError::RoleChangeDenied { from: target.role, to: new_role })
    }
}

/// Role a newly created account may be given by `actor`.
pub fn authorize_role_assignment(actor: &User, role: Role) -> Result<(), AuthError> {
    let allowed = match actor.role {
        Role::Root => true,
        Role::Admin | Role::User => role == Role::User,
    };
    if allowed {
        Ok(())
    } else {
        Err(AuthError::RoleChangeDenied { from: Role::User, to: role })
    }
}

/// A plain `user` may only hand out permissions it holds itself.
///
/// Revoking is never restricted here.
pub fn authorize_permission_grant(
    actor: &User,
    current: &Permissions,
    requested: &Permissions,
) -> Result<(), AuthError> {
    if actor.role.is_privileged() {
        return Ok(());
    }
    for permission in requested.granted() {
        if !current.has(permission) && !actor.permissions.has(permission) {
            return Err(AuthError::PermissionGrantDenied(permission));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{EmailAddress, Username};
    use chrono::Utc;

    fn user(role: Role, perms: &[Permission]) -> User {
        let id = gatehouse_core::UserId::new();
        let mut u = User::new(
            Username::parse(&format!("u{}", id.as_uuid().simple())[..12]).unwrap(),
            EmailAddress::parse(&format!("{id}@x.com")).unwrap(),
            Utc::now(),
        );
        u.id = id;
        u.role = role;
        u.permissions = Permissions::of(perms);
        u
    }

    #[test]
    fn admin_never_acts_on_admin() {
        let admin = user(Role::Admin, &[]);
        let admin2 = user(Role::Admin, &[]);
        assert!(!can_act_on_user(&admin, &admin2, UserAction::Modify));
        assert!(!can_act_on_user(&admin, &admin2, UserAction::Delete));
        assert_eq!(
            authorize_user_action(&admin, &admin2, UserAction::Modify),
            Err(AuthzError::TargetOutranks { action: UserAction::Modify, target: Role::Admin })
        );
    }

    #[test]
    fn root_never_acts_on_root() {
        let root = user(Role::Root, &[]);
        let root2 = user(Role::Root, &[]);
        assert!(!can_act_on_user(&root, &root2, UserAction::Modify));
        assert_eq!(
            authorize_user_action(&root, &root2, UserAction::Delete),
            Err(AuthzError::PeerRoot(UserAction::Delete))
        );
    }

    #[test]
    fn root_acts_on_admin_and_user() {
        let root = user(Role::Root, &[]);
        assert!(can_act_on_user(&root, &user(Role::Admin, &[]), UserAction::Modify));
        assert!(can_act_on_user(&root, &user(Role::User, &[]), UserAction::Delete));
    }

    #[test]
    fn admin_acts_on_plain_users() {
        let admin = user(Role::Admin, &[]);
        let target = user(Role::User, &[Permission::UserModify, Permission::UserDelete]);
        assert!(can_act_on_user(&admin, &target, UserAction::Modify));
        assert!(can_act_on_user(&admin, &target, UserAction::Delete));
    }

    #[test]
    fn user_with_permission_acts_on_user_without_it() {
        let actor = user(Role::User, &[Permission::UserModify]);
        let plain = user(Role::User, &[]);
        let peer = user(Role::User, &[Permission::UserModify]);
        assert!(can_act_on_user(&actor, &plain, UserAction::Modify));
        assert_eq!(
            authorize_user_action(&actor, &peer, UserAction::Modify),
            Err(AuthzError::TargetHoldsPermission {
                action: UserAction::Modify,
                permission: Permission::UserModify
            })
        );
        assert_eq!(
            authorize_user_action(&actor, &plain, UserAction::Delete),
            Err(AuthzError::MissingPermission(Permission::UserDelete))
        );
    }

    #[test]
    fn user_never_acts_on_privileged_accounts() {
        let actor = user(Role::User, &[Permission::UserModify, Permission::UserDelete]);
        assert!(!can_act_on_user(&actor, &user(Role::Admin, &[]), UserAction::Modify));
        assert!(!can_act_on_user(&actor, &user(Role::Root, &[]), UserAction::Delete));
    }

    #[test]
    fn read_is_granted_by_user_read() {
        let reader = user(Role::User, &[Permission::UserRead]);
        assert!(can_act_on_user(&reader, &user(Role::Admin, &[]), UserAction::Read));
        assert!(can_act_on_user(&reader, &user(Role::User, &[Permission::UserRead]), UserAction::Read));
        assert!(!can_act_on_user(&reader, &user(Role::User, &[]), UserAction::Modify));
        assert!(!can_act_on_user(&user(Role::User, &[]), &user(Role::User, &[]), UserAction::Read));
    }

    #[test]
    fn self_action_is_never_permitted() {
        for role in [Role::User, Role::Admin, Role::Root] {
            let me = user(role, &Permission::ALL);
            for action in [UserAction::Read, UserAction::Modify, UserAction::Delete] {
                assert_eq!(authorize_user_action(&me, &me, action), Err(AuthzError::SelfAction(action)));
            }
        }
    }

    #[test]
    fn has_permission_match_modes() {
        let u = user(Role::User, &[Permission::UserRead]);
        let both = [Permission::UserRead, Permission::Debug];
        assert!(!has_permission(&u, &both, MatchMode::All));
        assert!(has_permission(&u, &both, MatchMode::Any));
        assert!(has_permission(&user(Role::Admin, &[]), &both, MatchMode::All));
        assert_eq!(
            require_permissions(&u, &both),
            Err(AuthzError::MissingPermission(Permission::Debug))
        );
    }

    #[test]
    fn admin_can_only_set_user_role() {
        let admin = user(Role::Admin, &[]);
        let target = user(Role::User, &[]);
        assert_eq!(
            authorize_role_change(&admin, &target, Role::Admin),
            Err(AuthError::RoleChangeDenied { from: Role::User, to: Role::Admin })
        );
        assert!(authorize_role_change(&admin, &target, Role::User).is_ok());
    }

    #[test]
    fn root_sets_any_role_on_non_root() {
        let root = user(Role::Root, &[]);
        let admin = user(Role::Admin, &[]);
        assert!(authorize_role_change(&root, &admin, Role::User).is_ok());
        assert!(authorize_role_change(&root, &user(Role::User, &[]), Role::Root).is_ok());
        assert!(authorize_role_change(&root, &user(Role::Root, &[]), Role::Admin).is_err());
    }

    #[test]
    fn plain_users_cannot_escalate_permissions() {
        let actor = user(Role::User, &[Permission::UserModify, Permission::UserRead]);
        let current = Permissions::of(&[Permission::Debug]);
        assert!(authorize_permission_grant(&actor, &current, &Permissions::of(&[Permission::UserRead])).is_ok());
        assert_eq!(
            authorize_permission_grant(&actor, &current, &Permissions::of(&[Permission::Debug, Permission::UserDelete])),
            Err(AuthError::PermissionGrantDenied(Permission::UserDelete))
        );
        assert!(authorize_permission_grant(&user(Role::Admin, &[]), &current, &Permissions::all()).is_ok());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn role() -> impl Strategy<Value = Role> {
            prop_oneof![Just(Role::User), Just(Role::Admin), Just(Role::Root)]
        }

        fn action() -> impl Strategy<Value = UserAction> {
            prop_oneof![Just(UserAction::Read), Just(UserAction::Modify), Just(UserAction::Delete)]
        }

        fn perms() -> impl Strategy<Value = Permissions> {
            prop::collection::vec(prop::sample::select(Permission::ALL.to_vec()), 0..5)
                .prop_map(|granted| Permissions::of(&granted))
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 512,
                ..ProptestConfig::default()
            })]

            /// Property: a user can never act on its own record through management.
            #[test]
            fn never_on_self(r in role(), p in perms(), a in action()) {
                let mut me = user(r, &[]);
                me.permissions = p;
                prop_assert!(!can_act_on_user(&me, &me, a));
            }

            /// Property: outside of read, nobody modifies or deletes an account
            /// of equal or higher rank unless it is a root acting on a non-root.
            #[test]
            fn never_upward_or_sideways(
                actor_role in role(),
                target_role in role(),
                actor_perms in perms(),
                target_perms in perms(),
                delete in any::<bool>(),
            ) {
                let action = if delete { UserAction::Delete } else { UserAction::Modify };
                let mut actor = user(actor_role, &[]);
                actor.permissions = actor_perms;
                let mut target = user(target_role, &[]);
                target.permissions = target_perms;

                let allowed = can_act_on_user(&actor, &target, action);
                if target_role >= actor_role && !(actor_role == Role::User && target_role == Role::User) {
                    prop_assert!(!allowed);
                }
                if actor_role == Role::Root && target_role != Role::Root {
                    prop_assert!(allowed);
                }
            }
        }
    }
}
