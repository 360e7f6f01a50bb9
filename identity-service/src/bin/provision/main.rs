use std::sync::Arc;

use auth::PasswordHasher;
use auth::TokenIssuer;
use chrono::Duration;
use identity_service::auth::service::AuthService;
use identity_service::bootstrap::admin_stats;
use identity_service::bootstrap::ensure_default_admin;
use identity_service::config::Config;
use identity_service::outbound::storage::FileStorage;
use identity_service::repositories::FileUserRepository;
use identity_service::user::lifecycle::LockoutPolicy;
use identity_service::user::service::UserService;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "identity_service=debug,provision=debug,auth=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "identity-service",
        version = env!("CARGO_PKG_VERSION"),
        "Provisioning starting"
    );

    let config = Config::load()?;

    tracing::info!(
        users_file = %config.storage.users_file_path().display(),
        access_token_lifetime_secs = config.jwt.access_token_lifetime_secs,
        refresh_token_lifetime_secs = config.jwt.refresh_token_lifetime_secs,
        max_failed_login_attempts = config.security.max_failed_login_attempts,
        "Configuration loaded"
    );

    let storage = FileStorage::new(&config.storage.path);
    storage.ensure_directory().await?;

    let user_repository =
        Arc::new(FileUserRepository::open(storage, &config.storage.users_file).await);
    let password_hasher = Arc::new(PasswordHasher::with_cost(config.password.hash_cost())?);
    let token_issuer = Arc::new(TokenIssuer::new(
        config.jwt.secret.as_bytes(),
        Duration::seconds(config.jwt.access_token_lifetime_secs),
        Duration::seconds(config.jwt.refresh_token_lifetime_secs),
    )?);

    let auth_service = AuthService::new(
        Arc::clone(&user_repository),
        Arc::clone(&password_hasher),
        token_issuer,
        LockoutPolicy::new(config.security.max_failed_login_attempts),
    );
    let user_service = UserService::new(Arc::clone(&user_repository), password_hasher);

    let created = ensure_default_admin(&auth_service, &config.admin).await?;
    if created {
        tracing::warn!(
            username = %config.admin.username,
            "Default admin created with the configured password, change it"
        );
    }

    if let Some(stats) = admin_stats(&user_service, &config.admin.username).await? {
        tracing::info!(
            path = %user_repository.path().display(),
            total_users = stats.total_users,
            admin_count = stats.admin_count,
            biometric_enabled_count = stats.biometric_enabled_count,
            "User store ready"
        );
    }

    Ok(())
}
