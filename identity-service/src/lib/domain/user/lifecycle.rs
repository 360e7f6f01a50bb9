//! Account lockout state machine.
//!
//! ```text
//! Active --failed login (attempts < threshold)--> Active
//! Active --failed login (attempts = threshold)--> Locked
//! Locked --any login attempt--> Locked            (no credential check, no counting)
//! Active --successful login--> Active             (attempts reset)
//! Locked --explicit unlock--> Active
//! ```
//!
//! There is no time-based unlock.

use chrono::DateTime;
use chrono::Utc;

use crate::user::errors::LifecycleError;
use crate::user::models::LoginMethod;
use crate::user::models::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    Active,
    Locked,
}

/// Number of consecutive failed logins that locks an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    max_failed_attempts: u32,
}

impl LockoutPolicy {
    pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;

    /// A threshold of 0 is treated as 1.
    pub fn new(max_failed_attempts: u32) -> Self {
        Self {
            max_failed_attempts: max_failed_attempts.max(1),
        }
    }

    pub fn max_failed_attempts(&self) -> u32 {
        self.max_failed_attempts
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_FAILED_ATTEMPTS)
    }
}

impl User {
    pub fn account_state(&self) -> AccountState {
        if self.account_locked {
            AccountState::Locked
        } else {
            AccountState::Active
        }
    }

    /// Count a failed login, locking the account when the threshold is reached.
    ///
    /// A locked account is left untouched.
    pub fn record_failed_login(&mut self, policy: LockoutPolicy, now: DateTime<Utc>) -> AccountState {
        if self.account_locked {
            return AccountState::Locked;
        }

        self.failed_login_attempts = self.failed_login_attempts.saturating_add(1);
        if self.failed_login_attempts >= policy.max_failed_attempts() {
            self.account_locked = true;
            self.account_locked_at = Some(now);
        }

        self.account_state()
    }

    /// Record a completed login: resets the failure counter and stamps login info.
    ///
    /// # Errors
    /// * `AccountLocked` - Only an active account can log in
    pub fn record_successful_login(
        &mut self,
        method: LoginMethod,
        ip_address: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        if self.account_locked {
            return Err(LifecycleError::AccountLocked);
        }

        self.failed_login_attempts = 0;
        self.last_login_at = Some(now);
        self.last_login_method = Some(method);
        self.last_login_ip = ip_address;
        Ok(())
    }

    /// Explicit unlock: clears the flag, the lock time and the counter.
    pub fn unlock(&mut self) {
        self.account_locked = false;
        self.account_locked_at = None;
        self.failed_login_attempts = 0;
    }
}
