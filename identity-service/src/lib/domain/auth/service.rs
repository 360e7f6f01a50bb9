use std::sync::Arc;

use auth::PasswordHasher;
use auth::TokenIssuer;
use chrono::Utc;
use uuid::Uuid;

use crate::auth::challenge::ChallengeRegistry;
use crate::auth::errors::rejected_token;
use crate::auth::errors::AuthError;
use crate::auth::models::AuthResponse;
use crate::auth::models::BiometricEnrollmentCommand;
use crate::auth::models::BiometricVerificationCommand;
use crate::auth::models::LoginCommand;
use crate::user::errors::LifecycleError;
use crate::user::errors::UserError;
use crate::user::lifecycle::AccountState;
use crate::user::lifecycle::LockoutPolicy;
use crate::user::models::BiometricInfo;
use crate::user::models::CreateUserCommand;
use crate::user::models::LoginMethod;
use crate::user::models::Principal;
use crate::user::models::User;
use crate::user::models::UserId;
use crate::user::models::UserView;
use crate::user::models::DEFAULT_BIOMETRIC_TYPE;
use crate::user::ports::UserRepository;

/// Device id recorded when a biometric login arrives for a user with no enrollment.
const DEFAULT_DEVICE_ID: &str = "default-device";

/// Authentication orchestrator.
///
/// Composes the user store, the password hasher, the token issuer, the
/// challenge registry and the lockout policy into the register, login,
/// biometric and refresh flows. Every record change goes through
/// [`UserRepository::update_with`] so the lifecycle transition and its
/// persistence form one critical section.
pub struct AuthService<UR>
where
    UR: UserRepository,
{
    repository: Arc<UR>,
    password_hasher: Arc<PasswordHasher>,
    token_issuer: Arc<TokenIssuer>,
    challenges: ChallengeRegistry,
    lockout_policy: LockoutPolicy,
}

impl<UR> AuthService<UR>
where
    UR: UserRepository,
{
    pub fn new(
        repository: Arc<UR>,
        password_hasher: Arc<PasswordHasher>,
        token_issuer: Arc<TokenIssuer>,
        lockout_policy: LockoutPolicy,
    ) -> Self {
        Self {
            repository,
            password_hasher,
            token_issuer,
            challenges: ChallengeRegistry::new(),
            lockout_policy,
        }
    }

    /// Create an account and log it in.
    ///
    /// # Errors
    /// * `UsernameAlreadyExists` / `EmailAlreadyExists` - Duplicate identity
    /// * `StorageFailure` - The new record could not be persisted
    pub async fn register(&self, command: CreateUserCommand) -> Result<AuthResponse, AuthError> {
        if self.exists_by_username(command.username.as_str()).await? {
            return Err(UserError::UsernameAlreadyExists(command.username.to_string()).into());
        }
        if self.exists_by_email(command.email.as_str()).await? {
            return Err(UserError::EmailAlreadyExists(command.email.to_string()).into());
        }

        let password_hash = self.password_hasher.hash(&command.password)?;
        let user = self
            .repository
            .save(User::new(command, password_hash, Utc::now()))
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");
        self.issue_tokens(&user)
    }

    pub async fn exists_by_username(&self, username: &str) -> Result<bool, AuthError> {
        Ok(self.repository.find_by_username(username).await?.is_some())
    }

    pub async fn exists_by_email(&self, email: &str) -> Result<bool, AuthError> {
        Ok(self.repository.find_by_email(email).await?.is_some())
    }

    /// Password login.
    ///
    /// Locked accounts are rejected before the password is looked at. A user
    /// with biometrics enabled gets a challenge instead of tokens and no login
    /// stamp until the second factor succeeds.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown user, locked account or wrong password
    /// * `StorageFailure` - The failure counter or login stamp could not be persisted
    pub async fn login(&self, command: LoginCommand) -> Result<AuthResponse, AuthError> {
        let user = match self.repository.find_by_username(&command.username).await? {
            Some(user) => user,
            None => {
                tracing::debug!(username = %command.username, "Login for unknown user");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if user.account_state() == AccountState::Locked {
            tracing::warn!(user_id = %user.id, "Login attempt on locked account");
            return Err(AuthError::InvalidCredentials);
        }

        if !self
            .password_hasher
            .verify(&command.password, &user.password_hash)
        {
            self.record_failed_login(&user.id).await?;
            return Err(AuthError::InvalidCredentials);
        }

        if user.biometric_enabled {
            let challenge = self.challenges.issue(user.username.as_str()).await;
            tracing::info!(user_id = %user.id, "Password accepted, biometric verification required");
            return Ok(AuthResponse::biometric_required(
                UserView::from(&user),
                challenge,
            ));
        }

        // Digests from older deployments are replaced once the password is known.
        let verified_hash = user.password_hash.clone();
        let upgraded_hash = if self.password_hasher.needs_rehash(&verified_hash) {
            Some(self.password_hasher.hash(&command.password)?)
        } else {
            None
        };

        let ip_address = command.ip_address;
        let user = self
            .repository
            .update_with(
                &user.id,
                Box::new(move |user| {
                    user.record_successful_login(LoginMethod::Password, ip_address, Utc::now())?;
                    if let Some(upgraded_hash) = upgraded_hash {
                        if user.password_hash == verified_hash {
                            user.password_hash = upgraded_hash;
                        }
                    }
                    Ok(())
                }),
            )
            .await
            .map_err(login_failure)?;

        tracing::info!(user_id = %user.id, username = %user.username, "User logged in");
        self.issue_tokens(&user)
    }

    /// Second factor for a biometric-enabled user.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown user, locked account, or a challenge that
    ///   is missing or does not match
    /// * `InvalidState` - Biometrics are not enabled for the user, or the
    ///   enrollment is older than a year
    pub async fn verify_biometric(
        &self,
        command: BiometricVerificationCommand,
    ) -> Result<AuthResponse, AuthError> {
        let user = self
            .repository
            .find_by_username(&command.username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if user.account_state() == AccountState::Locked {
            tracing::warn!(user_id = %user.id, "Biometric attempt on locked account");
            return Err(AuthError::InvalidCredentials);
        }
        if !user.biometric_enabled {
            return Err(AuthError::InvalidState(
                LifecycleError::BiometricNotEnabled.to_string(),
            ));
        }
        let now = Utc::now();
        if user
            .biometric_info
            .as_ref()
            .map_or(false, |info| !info.is_valid(now))
        {
            tracing::info!(user_id = %user.id, "Biometric enrollment expired");
            return Err(AuthError::InvalidState(
                LifecycleError::BiometricEnrollmentExpired.to_string(),
            ));
        }
        if !self
            .challenges
            .verify(user.username.as_str(), &command.challenge)
            .await
        {
            tracing::warn!(user_id = %user.id, "Biometric challenge rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let biometric_type = command.biometric_type;
        let device_id = command.device_id;
        let user = self
            .repository
            .update_with(
                &user.id,
                Box::new(move |user| {
                    if !user.biometric_enabled {
                        return Err(LifecycleError::BiometricNotEnabled.into());
                    }

                    let now = Utc::now();
                    let info = user.biometric_info.get_or_insert_with(|| {
                        BiometricInfo::new(
                            biometric_type.unwrap_or_else(|| DEFAULT_BIOMETRIC_TYPE.to_string()),
                            device_id.unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string()),
                            now,
                        )
                    });
                    info.record_usage(now);

                    user.record_successful_login(LoginMethod::Biometric, None, now)
                        .map_err(UserError::from)
                }),
            )
            .await
            .map_err(|err| match err {
                UserError::Lifecycle(LifecycleError::BiometricNotEnabled) => {
                    AuthError::InvalidState(err.to_string())
                }
                other => login_failure(other),
            })?;

        tracing::info!(
            user_id = %user.id,
            username = %user.username,
            "User logged in with biometrics"
        );
        self.issue_tokens(&user)
    }

    /// Create or replace the user's biometric enrollment and enable the second factor.
    ///
    /// # Errors
    /// * `NotFoundByUsername` - No such user
    pub async fn enroll_biometric(
        &self,
        command: BiometricEnrollmentCommand,
    ) -> Result<UserView, AuthError> {
        let user = self
            .repository
            .find_by_username(&command.username)
            .await?
            .ok_or_else(|| UserError::NotFoundByUsername(command.username.clone()))?;

        let device_id = command
            .device_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let info = BiometricInfo::new(command.biometric_type, device_id, Utc::now());

        let user = self
            .repository
            .update_with(
                &user.id,
                Box::new(move |user| {
                    user.enroll_biometric(info);
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "Biometric enrolled");
        Ok(UserView::from(&user))
    }

    /// Reissue both tokens from the caller's current stored state.
    ///
    /// # Errors
    /// * `InvalidToken` - The caller no longer exists
    pub async fn refresh_token(&self, principal: &Principal) -> Result<AuthResponse, AuthError> {
        let user = self
            .repository
            .find_by_id(&principal.user_id)
            .await?
            .ok_or_else(|| AuthError::InvalidToken("Subject no longer exists".to_string()))?;

        tracing::debug!(user_id = %user.id, "Tokens refreshed");
        self.issue_tokens(&user)
    }

    /// End the caller's session. Tokens already issued stay valid until they expire.
    pub fn logout(&self, principal: Principal) {
        tracing::info!(user_id = %principal.user_id, username = %principal.username, "User logged out");
    }

    /// Resolve a bearer token into the caller's identity.
    ///
    /// Roles come from the stored record, not from the token.
    ///
    /// # Errors
    /// * `InvalidToken` - Bad signature or structure, expired, or unknown subject
    pub async fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.token_issuer.extract_claims(token).map_err(rejected_token)?;

        let user_id = UserId::from_string(&claims.id)
            .map_err(|err| AuthError::InvalidToken(err.to_string()))?;
        let user = self
            .repository
            .find_by_id(&user_id)
            .await?
            .ok_or_else(|| AuthError::InvalidToken("Unknown subject".to_string()))?;

        self.token_issuer
            .validate(token, user.username.as_str())
            .map_err(rejected_token)?;

        Ok(Principal::from(&user))
    }

    pub async fn generate_challenge(&self, username: &str) -> String {
        self.challenges.issue(username).await
    }

    pub async fn verify_challenge(&self, username: &str, challenge: &str) -> bool {
        self.challenges.verify(username, challenge).await
    }

    async fn record_failed_login(&self, id: &UserId) -> Result<(), AuthError> {
        let policy = self.lockout_policy;
        let result = self
            .repository
            .update_with(
                id,
                Box::new(move |user| {
                    user.record_failed_login(policy, Utc::now());
                    Ok(())
                }),
            )
            .await;

        match result {
            Ok(user) if user.account_state() == AccountState::Locked => {
                tracing::warn!(
                    user_id = %user.id,
                    attempts = user.failed_login_attempts,
                    "Account locked after failed logins"
                );
                Ok(())
            }
            Ok(user) => {
                tracing::debug!(
                    user_id = %user.id,
                    attempts = user.failed_login_attempts,
                    "Failed login recorded"
                );
                Ok(())
            }
            // Deleted between lookup and update.
            Err(UserError::NotFound(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn issue_tokens(&self, user: &User) -> Result<AuthResponse, AuthError> {
        let pair = self
            .token_issuer
            .issue_pair(&user.token_subject())
            .map_err(|err| AuthError::TokenIssuance(err.to_string()))?;

        Ok(AuthResponse::success(
            pair,
            self.token_issuer.access_token_lifetime().num_seconds(),
            UserView::from(user),
        ))
    }
}

/// A record that vanished or locked mid-login is a credentials failure.
fn login_failure(err: UserError) -> AuthError {
    match err {
        UserError::NotFound(_) | UserError::Lifecycle(LifecycleError::AccountLocked) => {
            AuthError::InvalidCredentials
        }
        other => other.into(),
    }
}
