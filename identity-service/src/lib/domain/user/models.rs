use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::user::errors::EmailError;
use crate::user::errors::UserIdError;
use crate::user::errors::UsernameError;

pub const ROLE_USER: &str = "USER";
pub const ROLE_ADMIN: &str = "ADMIN";

/// Biometric type recorded when none was supplied.
pub const DEFAULT_BIOMETRIC_TYPE: &str = "fingerprint";

/// User aggregate entity.
///
/// Identity and security state of a registered user. The credential store
/// owns these; everything else works on owned copies.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub first_name: String,
    pub last_name: String,
    pub email: EmailAddress,
    pub password_hash: String,
    pub roles: Vec<String>,
    pub biometric_enabled: bool,
    pub biometric_info: Option<BiometricInfo>,
    pub last_login_ip: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_method: Option<LoginMethod>,
    pub failed_login_attempts: u32,
    pub account_locked: bool,
    pub account_locked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a new, never-logged-in user from a create command.
    ///
    /// The plaintext password in the command is dropped here; only
    /// `password_hash` is kept. Roles are normalized (see [`normalize_roles`]).
    pub fn new(command: CreateUserCommand, password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            username: command.username,
            first_name: command.first_name,
            last_name: command.last_name,
            email: command.email,
            password_hash,
            roles: normalize_roles(command.roles),
            biometric_enabled: command.biometric_enabled,
            biometric_info: None,
            last_login_ip: None,
            last_login_at: None,
            last_login_method: None,
            failed_login_attempts: 0,
            account_locked: false,
            account_locked_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ROLE_ADMIN)
    }

    /// Turn biometric login on or off. Turning it off discards enrollment.
    pub fn set_biometric_enabled(&mut self, enabled: bool) {
        self.biometric_enabled = enabled;
        if !enabled {
            self.biometric_info = None;
        }
    }

    /// Attach a fresh enrollment and require the second factor from now on.
    pub fn enroll_biometric(&mut self, info: BiometricInfo) {
        self.biometric_enabled = true;
        self.biometric_info = Some(info);
    }

    /// Identity claims for token issuance.
    pub fn token_subject(&self) -> auth::TokenSubject {
        auth::TokenSubject {
            username: self.username.as_str().to_string(),
            user_id: self.id.to_string(),
            roles: self.roles.clone(),
        }
    }
}

/// Collapse duplicate role names keeping first-seen order; empty becomes `[USER]`.
pub fn normalize_roles(roles: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(roles.len());
    for role in roles {
        let role = role.trim().to_string();
        if !role.is_empty() && !normalized.contains(&role) {
            normalized.push(role);
        }
    }

    if normalized.is_empty() {
        normalized.push(ROLE_USER.to_string());
    }
    normalized
}

/// Enrolled second-factor device.
#[derive(Debug, Clone, PartialEq)]
pub struct BiometricInfo {
    /// "fingerprint", "face", "device-password", ...
    pub biometric_type: String,
    pub device_id: String,
    pub public_key_id: Option<String>,
    pub public_key: Option<String>,
    pub challenge: Option<String>,
    pub enrolled_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub usage_count: u32,
}

impl BiometricInfo {
    pub fn new(biometric_type: String, device_id: String, now: DateTime<Utc>) -> Self {
        Self {
            biometric_type,
            device_id,
            public_key_id: None,
            public_key: None,
            challenge: None,
            enrolled_at: now,
            last_used_at: None,
            usage_count: 0,
        }
    }

    pub fn record_usage(&mut self, now: DateTime<Utc>) {
        self.usage_count = self.usage_count.saturating_add(1);
        self.last_used_at = Some(now);
    }

    /// Enrollments expire one year after they were made.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.enrolled_at + Duration::days(365) > now
    }
}

/// How the last successful login was completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoginMethod {
    Password,
    Biometric,
}

impl fmt::Display for LoginMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginMethod::Password => f.write_str("PASSWORD"),
            LoginMethod::Biometric => f.write_str("BIOMETRIC"),
        }
    }
}

/// User unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generate a new random user ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a user ID from string.
    ///
    /// # Errors
    /// * `InvalidFormat` - String is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self, UserIdError> {
        Uuid::parse_str(s)
            .map(UserId)
            .map_err(|e| UserIdError::InvalidFormat(e.to_string()))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Username value type
///
/// 4 to 50 characters, not blank. Compared case-sensitively, no normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    const MIN_LENGTH: usize = 4;
    const MAX_LENGTH: usize = 50;

    /// Create a new valid username.
    ///
    /// # Errors
    /// * `Blank` - Username is only whitespace
    /// * `TooShort` - Username shorter than 4 characters
    /// * `TooLong` - Username longer than 50 characters
    pub fn new(username: String) -> Result<Self, UsernameError> {
        let length = username.chars().count();
        if length < Self::MIN_LENGTH {
            Err(UsernameError::TooShort {
                min: Self::MIN_LENGTH,
                actual: length,
            })
        } else if length > Self::MAX_LENGTH {
            Err(UsernameError::TooLong {
                max: Self::MAX_LENGTH,
                actual: length,
            })
        } else if username.trim().is_empty() {
            Err(UsernameError::Blank)
        } else {
            Ok(Self(username))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Email address type
///
/// Validates email format using RFC 5322 compliant parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Create a new validated email address.
    ///
    /// # Errors
    /// * `InvalidFormat` - Email does not conform to RFC 5322
    pub fn new(email: String) -> Result<Self, EmailError> {
        email_address::EmailAddress::from_str(&email)
            .map(|_| EmailAddress(email))
            .map_err(|e| EmailError::InvalidFormat(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Authenticated caller, passed explicitly to every operation that authorizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub username: String,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ROLE_ADMIN)
    }

    /// Whether the caller may act on the record with `id` (self or admin).
    pub fn can_manage(&self, id: &UserId) -> bool {
        self.user_id == *id || self.is_admin()
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.as_str().to_string(),
            roles: user.roles.clone(),
        }
    }
}

/// Command to create a new user with domain types
#[derive(Debug)]
pub struct CreateUserCommand {
    pub username: Username,
    pub email: EmailAddress,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// Empty defaults to `[USER]`
    pub roles: Vec<String>,
    pub biometric_enabled: bool,
}

impl CreateUserCommand {
    /// Construct a create command with no explicit roles and biometrics off.
    pub fn new(
        username: Username,
        email: EmailAddress,
        password: String,
        first_name: String,
        last_name: String,
    ) -> Self {
        Self {
            username,
            email,
            password,
            first_name,
            last_name,
            roles: Vec::new(),
            biometric_enabled: false,
        }
    }

    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    pub fn with_biometric_enabled(mut self, enabled: bool) -> Self {
        self.biometric_enabled = enabled;
        self
    }
}

/// Command to update an existing user with optional validated fields.
///
/// Only provided fields will be updated. `roles` is only honored for admin callers.
#[derive(Debug, Default)]
pub struct UpdateUserCommand {
    pub username: Option<Username>,
    pub email: Option<EmailAddress>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
    pub roles: Option<Vec<String>>,
    pub biometric_enabled: Option<bool>,
}

/// Outward view of a user. Never carries the password hash or lock state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub roles: Vec<String>,
    pub biometric_enabled: bool,
    pub biometric_type: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_method: Option<LoginMethod>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username.as_str().to_string(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.as_str().to_string(),
            roles: user.roles.clone(),
            biometric_enabled: user.biometric_enabled,
            biometric_type: user
                .biometric_info
                .as_ref()
                .map(|info| info.biometric_type.clone()),
            last_login_at: user.last_login_at,
            last_login_method: user.last_login_method,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Aggregate counts over the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_users: u64,
    pub admin_count: u64,
    pub regular_user_count: u64,
    pub biometric_enabled_count: u64,
}

/// Login activity of the calling user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActivity {
    pub last_login: Option<DateTime<Utc>>,
    pub last_login_method: Option<LoginMethod>,
    pub failed_attempts: u32,
    pub offline_enabled: bool,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A persisted-looking user with a placeholder hash.
    pub fn user(username: &str) -> User {
        let command = CreateUserCommand::new(
            Username::new(username.to_string()).unwrap(),
            EmailAddress::new(format!("{}@example.com", username)).unwrap(),
            "unused".to_string(),
            "Test".to_string(),
            "User".to_string(),
        );
        User::new(command, "$argon2id$test_hash".to_string(), Utc::now())
    }

    pub fn admin(username: &str) -> User {
        let mut user = user(username);
        user.roles = vec![ROLE_ADMIN.to_string(), ROLE_USER.to_string()];
        user
    }
}
