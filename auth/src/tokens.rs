use chrono::Duration;
use chrono::Utc;

use crate::jwt::Claims;
use crate::jwt::JwtError;
use crate::jwt::JwtHandler;

/// Identity a token is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub username: String,
    pub user_id: String,
    pub roles: Vec<String>,
}

/// Signed, time-boxed access/refresh token pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues and validates access and refresh tokens.
///
/// Holds the signing key and the two token lifetimes.
pub struct TokenIssuer {
    jwt_handler: JwtHandler,
    access_token_lifetime: Duration,
    refresh_token_lifetime: Duration,
}

impl TokenIssuer {
    /// Minimum secret length for HS512 (512 bits).
    pub const MIN_SECRET_LENGTH: usize = 64;

    /// Create a new token issuer.
    ///
    /// # Arguments
    /// * `secret` - HMAC signing secret, at least 64 bytes
    /// * `access_token_lifetime` - Lifetime of access tokens
    /// * `refresh_token_lifetime` - Lifetime of refresh tokens
    ///
    /// # Errors
    /// * `WeakSecret` - Secret shorter than 64 bytes
    pub fn new(
        secret: &[u8],
        access_token_lifetime: Duration,
        refresh_token_lifetime: Duration,
    ) -> Result<Self, JwtError> {
        if secret.len() < Self::MIN_SECRET_LENGTH {
            return Err(JwtError::WeakSecret {
                min: Self::MIN_SECRET_LENGTH,
                actual: secret.len(),
            });
        }

        Ok(Self {
            jwt_handler: JwtHandler::new(secret),
            access_token_lifetime,
            refresh_token_lifetime,
        })
    }

    /// Lifetime of access tokens.
    pub fn access_token_lifetime(&self) -> Duration {
        self.access_token_lifetime
    }

    /// Sign an access token carrying subject, user id and roles.
    pub fn issue_access_token(&self, subject: &TokenSubject) -> Result<String, JwtError> {
        let claims = Claims::access(
            &subject.username,
            &subject.user_id,
            subject.roles.clone(),
            Utc::now(),
            self.access_token_lifetime,
        );
        self.jwt_handler.encode(&claims)
    }

    /// Sign a refresh token carrying subject and user id.
    pub fn issue_refresh_token(&self, subject: &TokenSubject) -> Result<String, JwtError> {
        let claims = Claims::refresh(
            &subject.username,
            &subject.user_id,
            Utc::now(),
            self.refresh_token_lifetime,
        );
        self.jwt_handler.encode(&claims)
    }

    /// Sign both tokens for the same subject.
    pub fn issue_pair(&self, subject: &TokenSubject) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(subject)?,
            refresh_token: self.issue_refresh_token(subject)?,
        })
    }

    /// Verify signature and expiry and return the claims.
    ///
    /// # Errors
    /// * `TokenExpired` - Token is past its expiry
    /// * `InvalidToken` / `DecodingFailed` - Signature or structure is wrong
    pub fn extract_claims(&self, token: &str) -> Result<Claims, JwtError> {
        let claims: Claims = self.jwt_handler.decode(token)?;

        if claims.is_expired(Utc::now().timestamp()) {
            return Err(JwtError::TokenExpired);
        }

        Ok(claims)
    }

    /// Validate a token for a specific subject.
    ///
    /// Succeeds only if the token verifies, is unexpired, and its subject
    /// equals `expected_username`.
    pub fn validate(&self, token: &str, expected_username: &str) -> Result<Claims, JwtError> {
        let claims = self.extract_claims(token)?;

        if claims.sub != expected_username {
            return Err(JwtError::InvalidToken("subject mismatch".to_string()));
        }

        Ok(claims)
    }
}
