use std::sync::Arc;

use auth::PasswordHasher;
use chrono::Utc;

use crate::domain::user::models::normalize_roles;
use crate::domain::user::models::CreateUserCommand;
use crate::domain::user::models::Principal;
use crate::domain::user::models::UpdateUserCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserActivity;
use crate::domain::user::models::UserId;
use crate::domain::user::models::UserStats;
use crate::domain::user::models::UserView;
use crate::user::errors::UserError;
use crate::user::ports::UserRepository;

/// User management operations.
///
/// Every operation that needs authorization takes the caller's [`Principal`]
/// explicitly.
pub struct UserService<UR>
where
    UR: UserRepository,
{
    repository: Arc<UR>,
    password_hasher: Arc<PasswordHasher>,
}

impl<UR> UserService<UR>
where
    UR: UserRepository,
{
    pub fn new(repository: Arc<UR>, password_hasher: Arc<PasswordHasher>) -> Self {
        Self {
            repository,
            password_hasher,
        }
    }

    /// All users. Admin only.
    pub async fn list_users(&self, principal: &Principal) -> Result<Vec<UserView>, UserError> {
        require_admin(principal, "list users")?;

        let users = self.repository.list_all().await?;
        Ok(users.iter().map(UserView::from).collect())
    }

    /// One user by id. Self or admin.
    pub async fn get_user(&self, principal: &Principal, id: &UserId) -> Result<UserView, UserError> {
        require_self_or_admin(principal, id, "view this user")?;

        let user = self.find_existing(id).await?;
        Ok(UserView::from(&user))
    }

    /// Internal lookup by username.
    ///
    /// # Errors
    /// * `NotFoundByUsername` - No user with this username
    pub async fn get_user_by_username(&self, username: &str) -> Result<User, UserError> {
        self.repository
            .find_by_username(username)
            .await?
            .ok_or_else(|| UserError::NotFoundByUsername(username.to_string()))
    }

    /// Create a user on behalf of an admin.
    ///
    /// # Errors
    /// * `Forbidden` - Caller is not an admin
    /// * `UsernameAlreadyExists` / `EmailAlreadyExists` - Duplicate identity
    pub async fn create_user(
        &self,
        principal: &Principal,
        command: CreateUserCommand,
    ) -> Result<UserView, UserError> {
        require_admin(principal, "create users")?;

        if self
            .repository
            .find_by_username(command.username.as_str())
            .await?
            .is_some()
        {
            return Err(UserError::UsernameAlreadyExists(command.username.to_string()));
        }
        if self
            .repository
            .find_by_email(command.email.as_str())
            .await?
            .is_some()
        {
            return Err(UserError::EmailAlreadyExists(command.email.to_string()));
        }

        let password_hash = self.password_hasher.hash(&command.password)?;
        let user = self
            .repository
            .save(User::new(command, password_hash, Utc::now()))
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User created");
        Ok(UserView::from(&user))
    }

    /// Partial update. Self or admin; role changes only take effect for admins.
    pub async fn update_user(
        &self,
        principal: &Principal,
        id: &UserId,
        command: UpdateUserCommand,
    ) -> Result<UserView, UserError> {
        require_self_or_admin(principal, id, "update this user")?;

        let password_hash = match &command.password {
            Some(password) if !password.is_empty() => Some(self.password_hasher.hash(password)?),
            _ => None,
        };
        let roles = if principal.is_admin() {
            command.roles.map(normalize_roles)
        } else {
            None
        };

        let user = self
            .repository
            .update_with(
                id,
                Box::new(move |user| {
                    if let Some(username) = command.username {
                        user.username = username;
                    }
                    if let Some(email) = command.email {
                        user.email = email;
                    }
                    if let Some(first_name) = command.first_name {
                        user.first_name = first_name;
                    }
                    if let Some(last_name) = command.last_name {
                        user.last_name = last_name;
                    }
                    if let Some(password_hash) = password_hash {
                        user.password_hash = password_hash;
                    }
                    if let Some(roles) = roles {
                        user.roles = roles;
                    }
                    if let Some(enabled) = command.biometric_enabled {
                        user.set_biometric_enabled(enabled);
                    }
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User updated");
        Ok(UserView::from(&user))
    }

    /// Delete a user. Admin only, and never the caller's own account.
    ///
    /// # Errors
    /// * `Forbidden` - Caller is not an admin, or is deleting themselves
    /// * `NotFound` - User does not exist
    pub async fn delete_user(&self, principal: &Principal, id: &UserId) -> Result<(), UserError> {
        require_admin(principal, "delete users")?;
        if principal.user_id == *id {
            return Err(UserError::Forbidden(
                "You cannot delete your own account".to_string(),
            ));
        }

        self.repository.delete(id).await?;

        tracing::info!(user_id = %id, deleted_by = %principal.username, "User deleted");
        Ok(())
    }

    /// Replace a user's password. Self or admin.
    pub async fn reset_password(
        &self,
        principal: &Principal,
        id: &UserId,
        new_password: &str,
    ) -> Result<(), UserError> {
        require_self_or_admin(principal, id, "reset this password")?;

        let password_hash = self.password_hasher.hash(new_password)?;
        let user = self
            .repository
            .update_with(
                id,
                Box::new(move |user| {
                    user.password_hash = password_hash;
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "Password reset");
        Ok(())
    }

    /// Enable or disable the biometric factor. Self or admin.
    pub async fn toggle_biometric(
        &self,
        principal: &Principal,
        id: &UserId,
        enabled: bool,
    ) -> Result<UserView, UserError> {
        require_self_or_admin(principal, id, "change biometric settings")?;

        let user = self
            .repository
            .update_with(
                id,
                Box::new(move |user| {
                    user.set_biometric_enabled(enabled);
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(
            user_id = %user.id,
            username = %user.username,
            enabled,
            "Biometric authentication toggled"
        );
        Ok(UserView::from(&user))
    }

    /// Locked -> Active. Admin only.
    pub async fn unlock_account(
        &self,
        principal: &Principal,
        id: &UserId,
    ) -> Result<UserView, UserError> {
        require_admin(principal, "unlock accounts")?;

        let user = self
            .repository
            .update_with(
                id,
                Box::new(|user| {
                    user.unlock();
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "Account unlocked");
        Ok(UserView::from(&user))
    }

    /// Store-wide counts. Admin only.
    pub async fn get_user_stats(&self, principal: &Principal) -> Result<UserStats, UserError> {
        require_admin(principal, "view user statistics")?;

        let users = self.repository.list_all().await?;
        let admin_count = users.iter().filter(|u| u.is_admin()).count() as u64;
        let total_users = users.len() as u64;

        Ok(UserStats {
            total_users,
            admin_count,
            regular_user_count: total_users - admin_count,
            biometric_enabled_count: users.iter().filter(|u| u.biometric_enabled).count() as u64,
        })
    }

    /// Login activity of the caller.
    pub async fn get_user_activity(&self, principal: &Principal) -> Result<UserActivity, UserError> {
        let user = self.find_existing(&principal.user_id).await?;

        Ok(UserActivity {
            last_login: user.last_login_at,
            last_login_method: user.last_login_method,
            failed_attempts: user.failed_login_attempts,
            offline_enabled: user.biometric_enabled,
        })
    }

    async fn find_existing(&self, id: &UserId) -> Result<User, UserError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UserError::NotFound(id.to_string()))
    }
}

fn require_admin(principal: &Principal, action: &str) -> Result<(), UserError> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(UserError::Forbidden(format!(
            "You don't have permission to {}",
            action
        )))
    }
}

fn require_self_or_admin(principal: &Principal, id: &UserId, action: &str) -> Result<(), UserError> {
    if principal.can_manage(id) {
        Ok(())
    } else {
        Err(UserError::Forbidden(format!(
            "You don't have permission to {}",
            action
        )))
    }
}

#[cfg(test)]
mod tests {
    use auth::HashCost;

    use super::*;
    use crate::domain::errors::ErrorKind;
    use crate::domain::user::models::fixtures;
    use crate::domain::user::models::BiometricInfo;
    use crate::domain::user::models::EmailAddress;
    use crate::domain::user::models::Username;
    use crate::domain::user::models::ROLE_ADMIN;
    use crate::domain::user::models::ROLE_USER;
    use crate::user::ports::MockUserStore;
    use crate::user::ports::UserMutation;

    fn service(repository: MockUserStore) -> UserService<MockUserStore> {
        let hasher = PasswordHasher::with_cost(HashCost {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap();
        UserService::new(Arc::new(repository), Arc::new(hasher))
    }

    /// Apply the mutation to `stored` the way the real store would.
    fn apply_to(
        stored: User,
    ) -> impl FnMut(&UserId, UserMutation) -> Result<User, UserError> + Send + 'static {
        move |_, mutation| {
            let mut user = stored.clone();
            mutation(&mut user)?;
            Ok(user)
        }
    }

    #[tokio::test]
    async fn test_create_user_success() {
        let mut repository = MockUserStore::new();
        repository.expect_find_by_username().times(1).returning(|_| Ok(None));
        repository.expect_find_by_email().times(1).returning(|_| Ok(None));
        repository
            .expect_save()
            .withf(|user| {
                user.username.as_str() == "newuser"
                    && user.password_hash.starts_with("$argon2")
                    && user.roles == vec![ROLE_USER.to_string()]
            })
            .times(1)
            .returning(Ok);

        let admin = Principal::from(&fixtures::admin("admin"));
        let command = CreateUserCommand::new(
            Username::new("newuser".to_string()).unwrap(),
            EmailAddress::new("new@example.com".to_string()).unwrap(),
            "password123".to_string(),
            "New".to_string(),
            "User".to_string(),
        );

        let view = service(repository).create_user(&admin, command).await.unwrap();
        assert_eq!(view.username, "newuser");
        assert_eq!(view.roles, vec![ROLE_USER.to_string()]);
    }

    #[tokio::test]
    async fn test_create_user_requires_admin() {
        let repository = MockUserStore::new();
        let caller = Principal::from(&fixtures::user("alice"));
        let command = CreateUserCommand::new(
            Username::new("newuser".to_string()).unwrap(),
            EmailAddress::new("new@example.com".to_string()).unwrap(),
            "password123".to_string(),
            "New".to_string(),
            "User".to_string(),
        );

        let result = service(repository).create_user(&caller, command).await;
        assert!(matches!(result, Err(UserError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_create_user_duplicate_email() {
        let mut repository = MockUserStore::new();
        repository.expect_find_by_username().times(1).returning(|_| Ok(None));
        repository
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(Some(fixtures::user("other"))));
        repository.expect_save().times(0);

        let admin = Principal::from(&fixtures::admin("admin"));
        let command = CreateUserCommand::new(
            Username::new("newuser".to_string()).unwrap(),
            EmailAddress::new("other@example.com".to_string()).unwrap(),
            "password123".to_string(),
            "New".to_string(),
            "User".to_string(),
        );

        let error = service(repository)
            .create_user(&admin, command)
            .await
            .unwrap_err();
        assert!(matches!(error, UserError::EmailAlreadyExists(_)));
        assert_eq!(error.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_get_user_self_and_other() {
        let alice = fixtures::user("alice");
        let bob = fixtures::user("bobby");
        let alice_id = alice.id;

        let mut repository = MockUserStore::new();
        let returned = alice.clone();
        repository
            .expect_find_by_id()
            .withf(move |id| *id == alice_id)
            .times(1)
            .returning(move |_| Ok(Some(returned.clone())));

        let service = service(repository);
        let caller = Principal::from(&alice);

        let view = service.get_user(&caller, &alice.id).await.unwrap();
        assert_eq!(view.username, "alice");

        let result = service.get_user(&caller, &bob.id).await;
        assert!(matches!(result, Err(UserError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_get_user_by_username_not_found() {
        let mut repository = MockUserStore::new();
        repository
            .expect_find_by_username()
            .times(1)
            .returning(|_| Ok(None));

        let result = service(repository).get_user_by_username("nobody").await;
        assert!(matches!(result, Err(UserError::NotFoundByUsername(_))));
    }

    #[tokio::test]
    async fn test_update_user_ignores_roles_from_non_admin() {
        let alice = fixtures::user("alice");
        let mut repository = MockUserStore::new();
        repository
            .expect_update_with()
            .times(1)
            .returning(apply_to(alice.clone()));

        let command = UpdateUserCommand {
            first_name: Some("Alicia".to_string()),
            roles: Some(vec![ROLE_ADMIN.to_string()]),
            ..Default::default()
        };

        let view = service(repository)
            .update_user(&Principal::from(&alice), &alice.id, command)
            .await
            .unwrap();
        assert_eq!(view.first_name, "Alicia");
        assert_eq!(view.roles, vec![ROLE_USER.to_string()]);
    }

    #[tokio::test]
    async fn test_update_user_admin_sets_roles_and_disables_biometrics() {
        let mut alice = fixtures::user("alice");
        alice.enroll_biometric(BiometricInfo::new(
            "face".to_string(),
            "device".to_string(),
            Utc::now(),
        ));

        let mut repository = MockUserStore::new();
        repository
            .expect_update_with()
            .times(1)
            .returning(apply_to(alice.clone()));

        let command = UpdateUserCommand {
            roles: Some(vec![ROLE_ADMIN.to_string(), ROLE_ADMIN.to_string()]),
            biometric_enabled: Some(false),
            ..Default::default()
        };

        let admin = Principal::from(&fixtures::admin("admin"));
        let view = service(repository)
            .update_user(&admin, &alice.id, command)
            .await
            .unwrap();
        assert_eq!(view.roles, vec![ROLE_ADMIN.to_string()]);
        assert!(!view.biometric_enabled);
        assert!(view.biometric_type.is_none());
    }

    #[tokio::test]
    async fn test_update_user_not_found() {
        let mut repository = MockUserStore::new();
        repository
            .expect_update_with()
            .times(1)
            .returning(|id, _| Err(UserError::NotFound(id.to_string())));

        let admin = Principal::from(&fixtures::admin("admin"));
        let result = service(repository)
            .update_user(&admin, &UserId::new(), UpdateUserCommand::default())
            .await;
        assert!(matches!(result, Err(UserError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_user_success() {
        let target = UserId::new();
        let mut repository = MockUserStore::new();
        repository
            .expect_delete()
            .withf(move |id| *id == target)
            .times(1)
            .returning(|_| Ok(()));

        let admin = Principal::from(&fixtures::admin("admin"));
        assert!(service(repository).delete_user(&admin, &target).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_self_is_forbidden() {
        let mut repository = MockUserStore::new();
        repository.expect_delete().times(0);

        let admin_user = fixtures::admin("admin");
        let admin = Principal::from(&admin_user);
        let result = service(repository).delete_user(&admin, &admin_user.id).await;
        assert!(matches!(result, Err(UserError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_delete_user_not_found() {
        let mut repository = MockUserStore::new();
        repository
            .expect_delete()
            .times(1)
            .returning(|id| Err(UserError::NotFound(id.to_string())));

        let admin = Principal::from(&fixtures::admin("admin"));
        let result = service(repository).delete_user(&admin, &UserId::new()).await;
        assert!(matches!(result, Err(UserError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reset_password_rehashes() {
        let alice = fixtures::user("alice");
        let old_hash = alice.password_hash.clone();
        let mut repository = MockUserStore::new();
        repository
            .expect_update_with()
            .times(1)
            .returning(move |_, mutation| {
                let mut user = alice.clone();
                mutation(&mut user)?;
                assert_ne!(user.password_hash, old_hash);
                assert!(user.password_hash.starts_with("$argon2id$"));
                Ok(user)
            });

        let admin = Principal::from(&fixtures::admin("admin"));
        let result = service(repository)
            .reset_password(&admin, &UserId::new(), "new-password")
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unlock_requires_admin() {
        let alice = fixtures::user("alice");
        let repository = MockUserStore::new();

        let result = service(repository)
            .unlock_account(&Principal::from(&alice), &alice.id)
            .await;
        assert!(matches!(result, Err(UserError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_user_stats() {
        let mut enrolled = fixtures::user("carol");
        enrolled.set_biometric_enabled(true);
        let users = vec![fixtures::admin("admin"), fixtures::user("alice"), enrolled];

        let mut repository = MockUserStore::new();
        repository
            .expect_list_all()
            .times(1)
            .returning(move || Ok(users.clone()));

        let admin = Principal::from(&fixtures::admin("admin"));
        let stats = service(repository).get_user_stats(&admin).await.unwrap();
        assert_eq!(
            stats,
            UserStats {
                total_users: 3,
                admin_count: 1,
                regular_user_count: 2,
                biometric_enabled_count: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_user_activity() {
        let mut alice = fixtures::user("alice");
        alice.failed_login_attempts = 2;
        let principal = Principal::from(&alice);

        let mut repository = MockUserStore::new();
        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(alice.clone())));

        let activity = service(repository)
            .get_user_activity(&principal)
            .await
            .unwrap();
        assert_eq!(activity.failed_attempts, 2);
        assert!(activity.last_login.is_none());
        assert!(!activity.offline_enabled);
    }
}
