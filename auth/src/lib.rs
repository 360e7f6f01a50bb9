//! Credential primitives for the identity service.
//!
//! - Password hashing (Argon2id, with bcrypt verification for older digests)
//! - JWT encoding and validation (HS512)
//! - Access/refresh token issuance
//!
//! Nothing in this crate knows about users or storage; callers describe the
//! token subject with [`TokenSubject`].
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! assert!(hasher.verify("my_password", &hash));
//! ```
//!
//! ## Tokens
//! ```
//! use auth::{TokenIssuer, TokenSubject};
//! use chrono::Duration;
//!
//! let secret = [7u8; 64];
//! let issuer = TokenIssuer::new(&secret, Duration::hours(24), Duration::days(7)).unwrap();
//! let subject = TokenSubject {
//!     username: "alice".to_string(),
//!     user_id: "42".to_string(),
//!     roles: vec!["USER".to_string()],
//! };
//! let token = issuer.issue_access_token(&subject).unwrap();
//! let claims = issuer.validate(&token, "alice").unwrap();
//! assert_eq!(claims.id, "42");
//! ```

pub mod jwt;
pub mod password;
pub mod tokens;

pub use jwt::Claims;
pub use jwt::JwtError;
pub use jwt::JwtHandler;
pub use password::HashCost;
pub use password::PasswordError;
pub use password::PasswordHasher;
pub use tokens::TokenIssuer;
pub use tokens::TokenPair;
pub use tokens::TokenSubject;
