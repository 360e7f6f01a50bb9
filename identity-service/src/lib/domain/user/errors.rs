use thiserror::Error;

use crate::domain::errors::ErrorKind;

/// Error for UserId parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UserIdError {
    #[error("Invalid UUID format: {0}")]
    InvalidFormat(String),
}

/// Error for Username validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UsernameError {
    #[error("Username too short: minimum {min} characters, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("Username too long: maximum {max} characters, got {actual}")]
    TooLong { max: usize, actual: usize },

    #[error("Username cannot be blank")]
    Blank,
}

/// Error for EmailAddress validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("Invalid email format: {0}")]
    InvalidFormat(String),
}

/// Rejected account lifecycle transition
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Account is locked")]
    AccountLocked,

    #[error("Biometric authentication not enabled")]
    BiometricNotEnabled,

    #[error("Biometric enrollment has expired, enroll again")]
    BiometricEnrollmentExpired,
}

/// Top-level error for all user-related operations
#[derive(Debug, Clone, Error)]
pub enum UserError {
    // Value object validation errors (automatically converted via #[from])
    #[error("Invalid user ID: {0}")]
    InvalidUserId(#[from] UserIdError),

    #[error("Invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Password error: {0}")]
    Password(#[from] auth::PasswordError),

    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),

    // Domain-level errors
    #[error("User not found: {0}")]
    NotFound(String),

    #[error("User not found with username: {0}")]
    NotFoundByUsername(String),

    #[error("Username already exists: {0}")]
    UsernameAlreadyExists(String),

    #[error("Email already exists: {0}")]
    EmailAlreadyExists(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Infrastructure errors
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl UserError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UserError::InvalidUserId(_)
            | UserError::InvalidUsername(_)
            | UserError::InvalidEmail(_) => ErrorKind::InvalidInput,
            UserError::Lifecycle(LifecycleError::AccountLocked) => ErrorKind::InvalidCredentials,
            UserError::Lifecycle(
                LifecycleError::BiometricNotEnabled | LifecycleError::BiometricEnrollmentExpired,
            ) => ErrorKind::InvalidState,
            UserError::NotFound(_) | UserError::NotFoundByUsername(_) => ErrorKind::NotFound,
            UserError::UsernameAlreadyExists(_) | UserError::EmailAlreadyExists(_) => {
                ErrorKind::Conflict
            }
            UserError::Forbidden(_) => ErrorKind::Forbidden,
            UserError::StorageFailure(_) => ErrorKind::StorageFailure,
            UserError::Password(_) | UserError::Unknown(_) => ErrorKind::Internal,
        }
    }
}

impl From<anyhow::Error> for UserError {
    fn from(err: anyhow::Error) -> Self {
        UserError::Unknown(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            UserError::UsernameAlreadyExists("alice".to_string()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            UserError::NotFoundByUsername("alice".to_string()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            UserError::from(LifecycleError::AccountLocked).kind(),
            ErrorKind::InvalidCredentials
        );
        assert_eq!(
            UserError::from(UsernameError::Blank).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            UserError::from(anyhow::anyhow!("boom")).kind(),
            ErrorKind::Internal
        );
    }
}
