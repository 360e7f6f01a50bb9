use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Claims carried by access and refresh tokens.
///
/// Access tokens carry `roles`; refresh tokens carry `refresh = true` instead.
/// Both always carry `sub` (username), `iat`, `exp` and `id` (user id).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// User identifier
    pub id: String,

    /// Role names (access tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,

    /// Refresh marker (refresh tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<bool>,
}

impl Claims {
    /// Create access token claims valid for `lifetime` from `now`.
    ///
    /// # Arguments
    /// * `subject` - Username the token is issued to
    /// * `user_id` - Unique user identifier
    /// * `roles` - Role names granted to the user
    /// * `now` - Issue time
    /// * `lifetime` - Time until expiry
    pub fn access(
        subject: impl ToString,
        user_id: impl ToString,
        roles: Vec<String>,
        now: DateTime<Utc>,
        lifetime: Duration,
    ) -> Self {
        Self {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            id: user_id.to_string(),
            roles: Some(roles),
            refresh: None,
        }
    }

    /// Create refresh token claims valid for `lifetime` from `now`.
    pub fn refresh(
        subject: impl ToString,
        user_id: impl ToString,
        now: DateTime<Utc>,
        lifetime: Duration,
    ) -> Self {
        Self {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            id: user_id.to_string(),
            roles: None,
            refresh: Some(true),
        }
    }

    /// Whether these claims belong to a refresh token.
    pub fn is_refresh(&self) -> bool {
        self.refresh.unwrap_or(false)
    }

    /// Role names, empty for refresh tokens.
    pub fn roles(&self) -> &[String] {
        self.roles.as_deref().unwrap_or(&[])
    }

    /// Expiry as a UTC timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Check if token is expired.
    pub fn is_expired(&self, current_timestamp: i64) -> bool {
        self.exp < current_timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_claims() {
        let now = Utc::now();
        let claims = Claims::access(
            "alice",
            "user-1",
            vec!["USER".to_string()],
            now,
            Duration::hours(24),
        );

        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.id, "user-1");
        assert_eq!(claims.roles(), &["USER".to_string()]);
        assert!(!claims.is_refresh());
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn test_refresh_claims_have_no_roles() {
        let claims = Claims::refresh("alice", "user-1", Utc::now(), Duration::days(7));

        assert!(claims.is_refresh());
        assert!(claims.roles().is_empty());
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_serialized_field_names() {
        let access = Claims::access("alice", "user-1", vec![], Utc::now(), Duration::hours(1));
        let value = serde_json::to_value(&access).unwrap();
        assert!(value.get("roles").is_some());
        assert!(value.get("refresh").is_none());

        let refresh = Claims::refresh("alice", "user-1", Utc::now(), Duration::hours(1));
        let value = serde_json::to_value(&refresh).unwrap();
        assert_eq!(value["refresh"], serde_json::json!(true));
        assert!(value.get("roles").is_none());
    }

    #[test]
    fn test_is_expired() {
        let claims = Claims::refresh("alice", "user-1", Utc::now(), Duration::zero());
        let exp = claims.exp;

        assert!(!claims.is_expired(exp - 1));
        assert!(!claims.is_expired(exp));
        assert!(claims.is_expired(exp + 1));
    }
}
