#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use auth::HashCost;
use auth::PasswordHasher;
use auth::TokenIssuer;
use chrono::Duration;
use identity_service::auth::models::AuthResponse;
use identity_service::auth::service::AuthService;
use identity_service::outbound::storage::FileStorage;
use identity_service::repositories::FileUserRepository;
use identity_service::user::lifecycle::LockoutPolicy;
use identity_service::user::models::CreateUserCommand;
use identity_service::user::models::EmailAddress;
use identity_service::user::models::Username;
use identity_service::user::service::UserService;

pub const TEST_SECRET: &[u8] =
    b"test-secret-key-for-jwt-signing-with-hs512-needs-at-least-64-bytes!!";
pub const USERS_FILE: &str = "users.json";

/// Services wired over a real file store in a throwaway directory
pub struct TestApp {
    pub dir: TestDir,
    pub repository: Arc<FileUserRepository>,
    pub auth_service: AuthService<FileUserRepository>,
    pub user_service: UserService<FileUserRepository>,
    pub token_issuer: Arc<TokenIssuer>,
}

/// Unique temporary directory, removed on drop
pub struct TestDir {
    pub path: PathBuf,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_lifetime(Duration::hours(1)).await
    }

    pub async fn spawn_with_lifetime(access_token_lifetime: Duration) -> Self {
        Self::open(TestDir::new(), access_token_lifetime).await
    }

    /// Reopen the same directory, as a restart would.
    pub async fn restart(self) -> Self {
        let TestApp { dir, .. } = self;
        Self::open(dir, Duration::hours(1)).await
    }

    async fn open(dir: TestDir, access_token_lifetime: Duration) -> Self {
        let repository = Arc::new(FileUserRepository::open(dir.storage(), USERS_FILE).await);
        let password_hasher = Arc::new(fast_hasher());
        let token_issuer = Arc::new(
            TokenIssuer::new(TEST_SECRET, access_token_lifetime, Duration::days(7))
                .expect("Failed to create token issuer"),
        );

        let auth_service = AuthService::new(
            Arc::clone(&repository),
            Arc::clone(&password_hasher),
            Arc::clone(&token_issuer),
            LockoutPolicy::default(),
        );
        let user_service = UserService::new(Arc::clone(&repository), password_hasher);

        Self {
            dir,
            repository,
            auth_service,
            user_service,
            token_issuer,
        }
    }

    /// Register `username` with `<username>@example.com`.
    pub async fn register(&self, username: &str, password: &str) -> AuthResponse {
        self.auth_service
            .register(create_command(username, password))
            .await
            .expect("Failed to register user")
    }

    pub async fn register_admin(&self, username: &str, password: &str) -> AuthResponse {
        self.auth_service
            .register(
                create_command(username, password)
                    .with_roles(vec!["ADMIN".to_string(), "USER".to_string()]),
            )
            .await
            .expect("Failed to register admin")
    }
}

impl TestDir {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!(
            "identity_service_test_{}",
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::create_dir_all(&path).expect("Failed to create test directory");
        Self { path }
    }

    pub fn storage(&self) -> FileStorage {
        FileStorage::new(&self.path)
    }

    pub fn users_file(&self) -> PathBuf {
        self.path.join(USERS_FILE)
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

pub fn fast_hasher() -> PasswordHasher {
    PasswordHasher::with_cost(HashCost {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .expect("Failed to create password hasher")
}

pub fn create_command(username: &str, password: &str) -> CreateUserCommand {
    CreateUserCommand::new(
        Username::new(username.to_string()).expect("Invalid username"),
        EmailAddress::new(format!("{}@example.com", username)).expect("Invalid email"),
        password.to_string(),
        "Test".to_string(),
        "User".to_string(),
    )
}
