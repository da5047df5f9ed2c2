//! User management: one user acting on another user's record.
//!
//! Every operation takes an already-authenticated actor and runs the
//! authorization engine before touching the store.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use gatehouse_auth::{
    AuthError, AuthResult, EmailAddress, Permission, Permissions, PublicUser, Role, User, UserAction, UserStatus,
    UserStore, Username, authorize_permission_grant, authorize_role_assignment, authorize_role_change,
    authorize_user_action, can_act_on_user, require_permissions,
};
use gatehouse_core::{ExpectedVersion, UserId};

use crate::dto::{NewAccount, NewUser, UserUpdate};
use crate::service::AccountService;

impl<S> AccountService<S>
where
    S: UserStore + Clone,
{
    pub fn get_user(&self, actor: &User, id: UserId) -> AuthResult<PublicUser> {
        let target = self.reload(id)?;
        authorize_user_action(actor, &target, UserAction::Read)?;
        Ok(target.to_public())
    }

    /// Every account the actor may read.
    pub fn list_users(&self, actor: &User) -> AuthResult<Vec<PublicUser>> {
        require_permissions(actor, &[Permission::UserRead])?;
        Ok(self
            .store()
            .list()?
            .iter()
            .filter(|target| can_act_on_user(actor, target, UserAction::Read))
            .map(User::to_public)
            .collect())
    }

    /// Create an account on someone else's behalf. It starts out active.
    pub fn create_user(&self, actor: &User, new_user: NewUser, now: DateTime<Utc>) -> AuthResult<PublicUser> {
        require_permissions(actor, &[Permission::UserInsert])?;
        authorize_role_assignment(actor, new_user.role)?;
        authorize_permission_grant(actor, &Permissions::none(), &new_user.permissions)?;

        let mut user = self.new_local_user(new_user.account, new_user.role, UserStatus::Active, now)?;
        user.permissions = new_user.permissions;
        let user = self.store().save(user, ExpectedVersion::Exact(0))?;

        info!(actor_id = %actor.id, user_id = %user.id, role = %user.role, "user created");
        Ok(user.to_public())
    }

    /// Apply a partial update to another user's record.
    ///
    /// An update with no fields set is a validation error. Checks run in a
    /// fixed order: role change, permission grant, the general modify rule,
    /// then the status transition. Nothing is written unless all of them pass.
    pub fn update_user(
        &self,
        actor: &User,
        id: UserId,
        update: UserUpdate,
        now: DateTime<Utc>,
    ) -> AuthResult<PublicUser> {
        if update.is_empty() {
            return Err(AuthError::Validation("nothing to update".to_string()));
        }
        let mut target = self.reload(id)?;

        if let Some(role) = update.role {
            authorize_role_change(actor, &target, role).inspect_err(|_| {
                warn!(actor_id = %actor.id, target_id = %target.id, from = %target.role, to = %role, "role change denied");
            })?;
        }
        if let Some(permissions) = &update.permissions {
            authorize_permission_grant(actor, &target.permissions, permissions)?;
        }
        authorize_user_action(actor, &target, UserAction::Modify).inspect_err(|e| {
            warn!(actor_id = %actor.id, target_id = %target.id, reason = %e, "modify denied");
        })?;
        if let Some(status) = update.status.filter(|s| !target.status.admin_can_set(*s)) {
            return Err(AuthError::InvalidStatusTransition {
                from: target.status,
                to: status,
            });
        }

        let expected = ExpectedVersion::of(&target);
        if let Some(username) = update.username {
            target.username = Username::parse(&username)?;
        }
        if let Some(email) = update.email {
            target.email = EmailAddress::parse(&email)?;
        }
        if let Some(first_name) = update.first_name {
            target.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = update.last_name {
            target.last_name = last_name.trim().to_string();
        }
        if let Some(role) = update.role {
            target.role = role;
        }
        if let Some(permissions) = update.permissions {
            target.permissions = permissions;
        }
        if let Some(status) = update.status {
            target.status = status;
        }
        target.touch(now);

        let target = self.store().save(target, expected)?;
        info!(actor_id = %actor.id, user_id = %target.id, "user updated");
        Ok(target.to_public())
    }

    pub fn delete_user(&self, actor: &User, id: UserId) -> AuthResult<()> {
        let target = self.reload(id)?;
        authorize_user_action(actor, &target, UserAction::Delete).inspect_err(|e| {
            warn!(actor_id = %actor.id, target_id = %target.id, reason = %e, "delete denied");
        })?;

        if !self.store().delete(target.id)? {
            return Err(AuthError::NotFound);
        }
        info!(actor_id = %actor.id, user_id = %target.id, "user deleted");
        Ok(())
    }

    /// Create the first `root` account. Once a root exists this returns it
    /// unchanged.
    pub fn bootstrap_root(
        &self,
        username: &str,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<PublicUser> {
        if let Some(root) = self.store().list()?.into_iter().find(|u| u.role == Role::Root) {
            info!(user_id = %root.id, "root account already present");
            return Ok(root.to_public());
        }

        let account = NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            first_name: String::new(),
            last_name: String::new(),
        };
        let mut root = self.new_local_user(account, Role::Root, UserStatus::Active, now)?;
        root.permissions = Permissions::all();
        let root = self.store().save(root, ExpectedVersion::Exact(0))?;

        info!(user_id = %root.id, "root account bootstrapped");
        Ok(root.to_public())
    }
}
