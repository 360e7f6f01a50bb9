use thiserror::Error;

use crate::domain::errors::ErrorKind;
use crate::user::errors::UserError;

/// Failures of the authentication flows.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Unknown user, wrong password, locked account and bad challenge all look alike.
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    User(#[from] UserError),

    #[error("Password error: {0}")]
    Password(#[from] auth::PasswordError),

    #[error("Token issuance failed: {0}")]
    TokenIssuance(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidCredentials => ErrorKind::InvalidCredentials,
            AuthError::InvalidToken(_) => ErrorKind::InvalidToken,
            AuthError::InvalidState(_) => ErrorKind::InvalidState,
            AuthError::User(err) => err.kind(),
            AuthError::Password(_) | AuthError::TokenIssuance(_) => ErrorKind::Internal,
        }
    }
}

/// Map a verification failure onto the token error surfaced to callers.
pub(crate) fn rejected_token(err: auth::JwtError) -> AuthError {
    match err {
        auth::JwtError::TokenExpired => AuthError::InvalidToken("Token has expired".to_string()),
        other => AuthError::InvalidToken(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::errors::LifecycleError;

    #[test]
    fn test_kinds() {
        assert_eq!(AuthError::InvalidCredentials.kind(), ErrorKind::InvalidCredentials);
        assert_eq!(
            rejected_token(auth::JwtError::TokenExpired).kind(),
            ErrorKind::InvalidToken
        );
        assert_eq!(
            AuthError::from(UserError::EmailAlreadyExists("a@b.c".to_string())).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            AuthError::from(UserError::from(LifecycleError::BiometricNotEnabled)).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            AuthError::TokenIssuance("boom".to_string()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_credentials_message_is_uniform() {
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "Invalid username or password"
        );
    }
}
