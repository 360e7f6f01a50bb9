use serde::Serialize;

use crate::user::models::UserView;

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Outcome of a registration or login step.
///
/// Either carries a token pair, or (when a second factor is pending) a
/// biometric challenge and no tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: Option<i64>,
    pub user: UserView,
    pub requires_biometric: bool,
    pub biometric_challenge: Option<String>,
}

impl AuthResponse {
    pub fn success(pair: auth::TokenPair, expires_in: i64, user: UserView) -> Self {
        Self {
            token: Some(pair.access_token),
            refresh_token: Some(pair.refresh_token),
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: Some(expires_in),
            user,
            requires_biometric: false,
            biometric_challenge: None,
        }
    }

    pub fn biometric_required(user: UserView, challenge: String) -> Self {
        Self {
            token: None,
            refresh_token: None,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: None,
            user,
            requires_biometric: true,
            biometric_challenge: Some(challenge),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginCommand {
    pub username: String,
    pub password: String,
    pub ip_address: Option<String>,
}

impl LoginCommand {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ip_address: None,
        }
    }

    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }
}

/// Second login step for biometric-enabled users.
#[derive(Debug, Clone)]
pub struct BiometricVerificationCommand {
    pub username: String,
    pub biometric_type: Option<String>,
    pub device_id: Option<String>,
    /// Value returned in `AuthResponse::biometric_challenge`
    pub challenge: String,
    /// Opaque device assertion; recorded nowhere
    pub credential_data: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BiometricEnrollmentCommand {
    pub username: String,
    pub biometric_type: String,
    /// Random when absent
    pub device_id: Option<String>,
}
