use crate::auth::errors::AuthError;
use crate::auth::service::AuthService;
use crate::config::AdminConfig;
use crate::user::errors::UserError;
use crate::user::models::CreateUserCommand;
use crate::user::models::EmailAddress;
use crate::user::models::Principal;
use crate::user::models::UserStats;
use crate::user::models::Username;
use crate::user::models::ROLE_ADMIN;
use crate::user::models::ROLE_USER;
use crate::user::ports::UserRepository;
use crate::user::service::UserService;

/// Register the configured administrator unless a user with that name exists.
///
/// # Returns
/// `true` if the account was created by this call
pub async fn ensure_default_admin<UR>(
    auth_service: &AuthService<UR>,
    admin: &AdminConfig,
) -> Result<bool, AuthError>
where
    UR: UserRepository,
{
    if auth_service.exists_by_username(&admin.username).await? {
        tracing::debug!(username = %admin.username, "Default admin already present");
        return Ok(false);
    }

    let command = CreateUserCommand::new(
        Username::new(admin.username.clone()).map_err(UserError::from)?,
        EmailAddress::new(admin.email.clone()).map_err(UserError::from)?,
        admin.password.clone(),
        admin.first_name.clone(),
        admin.last_name.clone(),
    )
    .with_roles(vec![ROLE_ADMIN.to_string(), ROLE_USER.to_string()])
    .with_biometric_enabled(false);

    let response = auth_service.register(command).await?;
    tracing::info!(
        user_id = %response.user.id,
        username = %response.user.username,
        "Default admin created"
    );
    Ok(true)
}

/// Store statistics as seen by the configured admin account.
///
/// # Returns
/// `None` when that account exists without the ADMIN role
///
/// # Errors
/// * `NotFoundByUsername` - No account with `admin_username`
pub async fn admin_stats<UR>(
    user_service: &UserService<UR>,
    admin_username: &str,
) -> Result<Option<UserStats>, UserError>
where
    UR: UserRepository,
{
    let admin = Principal::from(&user_service.get_user_by_username(admin_username).await?);
    if !admin.is_admin() {
        tracing::warn!(
            username = %admin_username,
            "Configured admin account exists without the ADMIN role"
        );
        return Ok(None);
    }

    user_service.get_user_stats(&admin).await.map(Some)
}
