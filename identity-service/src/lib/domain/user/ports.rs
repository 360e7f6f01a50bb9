use async_trait::async_trait;

use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::user::errors::UserError;

/// In-place change applied to one record inside the store's writer section.
///
/// Returning an error aborts the write; nothing is persisted.
pub type UserMutation = Box<dyn FnOnce(&mut User) -> Result<(), UserError> + Send>;

/// Persistence operations for user aggregate.
///
/// Implementations serialize writers against each other and hand out owned
/// copies; callers never hold a reference into the store.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Retrieve user by identifier.
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    ///
    /// # Errors
    /// * `StorageFailure` - Store could not be read
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError>;

    /// Retrieve user by exact, case-sensitive username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserError>;

    /// Retrieve user by exact, case-sensitive email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError>;

    /// Snapshot of all users.
    async fn list_all(&self) -> Result<Vec<User>, UserError>;

    /// Insert or replace by id, stamping `updated_at`, then persist.
    ///
    /// # Returns
    /// The record as stored
    ///
    /// # Errors
    /// * `UsernameAlreadyExists` - Username belongs to another record
    /// * `EmailAlreadyExists` - Email belongs to another record
    /// * `StorageFailure` - Persisting failed; the store is unchanged
    async fn save(&self, user: User) -> Result<User, UserError>;

    /// Read-modify-write one record as a single critical section.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * Any error returned by `mutation`
    /// * `UsernameAlreadyExists` / `EmailAlreadyExists` - Mutation introduced a duplicate
    /// * `StorageFailure` - Persisting failed; the store is unchanged
    async fn update_with(&self, id: &UserId, mutation: UserMutation) -> Result<User, UserError>;

    /// Remove user from storage.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `StorageFailure` - Persisting failed; the store is unchanged
    async fn delete(&self, id: &UserId) -> Result<(), UserError>;
}

#[cfg(test)]
mockall::mock! {
    pub UserStore {}

    #[async_trait]
    impl UserRepository for UserStore {
        async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError>;
        async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserError>;
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError>;
        async fn list_all(&self) -> Result<Vec<User>, UserError>;
        async fn save(&self, user: User) -> Result<User, UserError>;
        async fn update_with(&self, id: &UserId, mutation: UserMutation) -> Result<User, UserError>;
        async fn delete(&self, id: &UserId) -> Result<(), UserError>;
    }
}
