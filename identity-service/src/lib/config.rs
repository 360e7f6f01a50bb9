use std::env;
use std::path::PathBuf;

use auth::HashCost;
use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub password: PasswordConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
    #[serde(default = "default_users_file")]
    pub users_file: String,
}

impl StorageConfig {
    /// Full path of the users file.
    pub fn users_file_path(&self) -> PathBuf {
        PathBuf::from(&self.path).join(&self.users_file)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            users_file: default_users_file(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime_secs: i64,
    #[serde(default = "default_refresh_token_lifetime")]
    pub refresh_token_lifetime_secs: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecurityConfig {
    #[serde(default = "default_max_failed_login_attempts")]
    pub max_failed_login_attempts: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_failed_login_attempts: default_max_failed_login_attempts(),
        }
    }
}

/// Argon2 cost. Unset fields use the library defaults.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PasswordConfig {
    pub memory_kib: Option<u32>,
    pub iterations: Option<u32>,
    pub parallelism: Option<u32>,
}

impl PasswordConfig {
    pub fn hash_cost(&self) -> HashCost {
        let defaults = HashCost::default();
        HashCost {
            memory_kib: self.memory_kib.unwrap_or(defaults.memory_kib),
            iterations: self.iterations.unwrap_or(defaults.iterations),
            parallelism: self.parallelism.unwrap_or(defaults.parallelism),
        }
    }
}

/// Default administrator created on first start.
#[derive(Debug, Deserialize, Clone)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

fn default_storage_path() -> String {
    "data".to_string()
}

fn default_users_file() -> String {
    "users.json".to_string()
}

fn default_access_token_lifetime() -> i64 {
    24 * 60 * 60
}

fn default_refresh_token_lifetime() -> i64 {
    7 * 24 * 60 * 60
}

fn default_max_failed_login_attempts() -> u32 {
    5
}

impl Config {
    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (JWT__SECRET, STORAGE__PATH, etc.)
    /// 2. Environment-specific config file (config/{environment}.toml)
    /// 3. Default config file (config/default.toml)
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = ConfigBuilder::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Example: JWT__SECRET=... overrides jwt.secret
            .add_source(Environment::default().separator("__"))
            .build()?;

        configuration.try_deserialize()
    }
}
