use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::domain::user::models::normalize_roles;
use crate::domain::user::models::BiometricInfo;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::LoginMethod;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::domain::user::ports::UserMutation;
use crate::domain::user::ports::UserRepository;
use crate::outbound::storage::FileStorage;
use crate::user::errors::UserError;

/// User store backed by a single JSON file.
///
/// The full record set lives in memory behind an `RwLock`. Writers hold the
/// write lock for the whole read-modify-persist sequence; the new set is
/// written to disk first and only then swapped into memory, so a failed
/// write leaves both sides unchanged.
pub struct FileUserRepository {
    storage: FileStorage,
    path: PathBuf,
    users: RwLock<Vec<User>>,
}

impl FileUserRepository {
    /// Open the store, loading whatever the file holds.
    ///
    /// Never fails: a missing file gives an empty store, and an unreadable or
    /// corrupt one is copied to a `.bak` sibling before starting empty.
    pub async fn open(storage: FileStorage, file_name: &str) -> Self {
        let path = storage.path_of(file_name);
        let users = load(&storage, &path).await;

        Self {
            storage,
            path,
            users: RwLock::new(users),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, users: &[User]) -> Result<(), UserError> {
        let records: Vec<UserRecord> = users.iter().map(UserRecord::from).collect();
        let bytes = serde_json::to_vec_pretty(&records)
            .map_err(|e| UserError::StorageFailure(format!("Failed to encode users: {}", e)))?;

        self.storage.write(&self.path, &bytes).await.map_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to write user store");
            UserError::StorageFailure("Failed to persist users".to_string())
        })?;

        tracing::debug!(count = users.len(), "User store persisted");
        Ok(())
    }
}

async fn load(storage: &FileStorage, path: &Path) -> Vec<User> {
    let bytes = match storage.read(path).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            tracing::info!(path = %path.display(), "No user store found, starting empty");
            return Vec::new();
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to read user store, starting empty");
            back_up(storage, path).await;
            return Vec::new();
        }
    };

    let values: Vec<serde_json::Value> = match serde_json::from_slice(&bytes) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Corrupt user store, starting empty");
            back_up(storage, path).await;
            return Vec::new();
        }
    };

    let mut users: Vec<User> = Vec::with_capacity(values.len());
    let mut skipped = 0usize;
    for (index, value) in values.into_iter().enumerate() {
        let user = serde_json::from_value::<UserRecord>(value)
            .map_err(|e| e.to_string())
            .and_then(|record| User::try_from(record).map_err(|e| e.to_string()))
            .and_then(|user| check_unique(&users, &user).map(|_| user).map_err(|e| e.to_string()));

        match user {
            Ok(user) => users.push(user),
            Err(reason) => {
                skipped += 1;
                tracing::warn!(index, reason = %reason, "Skipping invalid user record");
            }
        }
    }

    if skipped > 0 {
        back_up(storage, path).await;
    }

    tracing::info!(path = %path.display(), count = users.len(), skipped, "Loaded users");
    users
}

async fn back_up(storage: &FileStorage, path: &Path) {
    match storage.create_backup(path).await {
        Ok(backup) => tracing::warn!(backup = %backup.display(), "Kept a copy of the unreadable user store"),
        Err(e) => tracing::error!(error = %e, "Failed to back up user store"),
    }
}

/// A record without a password hash would be dropped by the next load.
fn check_persistable(user: &User) -> Result<(), UserError> {
    if user.password_hash.is_empty() {
        return Err(UserError::StorageFailure(format!(
            "User {} has no password hash",
            user.id
        )));
    }
    Ok(())
}

/// Username and email must not belong to any other id.
fn check_unique(users: &[User], candidate: &User) -> Result<(), UserError> {
    for other in users.iter().filter(|u| u.id != candidate.id) {
        if other.username == candidate.username {
            return Err(UserError::UsernameAlreadyExists(candidate.username.to_string()));
        }
        if other.email == candidate.email {
            return Err(UserError::EmailAlreadyExists(candidate.email.to_string()));
        }
    }
    Ok(())
}

#[async_trait]
impl UserRepository for FileUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == *id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserError> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|u| u.username.as_str() == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email.as_str() == email).cloned())
    }

    async fn list_all(&self) -> Result<Vec<User>, UserError> {
        Ok(self.users.read().await.clone())
    }

    async fn save(&self, mut user: User) -> Result<User, UserError> {
        let mut users = self.users.write().await;

        user.updated_at = Utc::now();
        check_persistable(&user)?;
        check_unique(&users, &user)?;

        let mut next = users.clone();
        match next.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => *existing = user.clone(),
            None => next.push(user.clone()),
        }

        self.persist(&next).await?;
        *users = next;
        Ok(user)
    }

    async fn update_with(&self, id: &UserId, mutation: UserMutation) -> Result<User, UserError> {
        let mut users = self.users.write().await;

        let index = users
            .iter()
            .position(|u| u.id == *id)
            .ok_or_else(|| UserError::NotFound(id.to_string()))?;

        let mut user = users[index].clone();
        mutation(&mut user)?;
        user.id = *id;
        user.updated_at = Utc::now();
        check_persistable(&user)?;
        check_unique(&users, &user)?;

        let mut next = users.clone();
        next[index] = user.clone();

        self.persist(&next).await?;
        *users = next;
        Ok(user)
    }

    async fn delete(&self, id: &UserId) -> Result<(), UserError> {
        let mut users = self.users.write().await;

        let index = users
            .iter()
            .position(|u| u.id == *id)
            .ok_or_else(|| UserError::NotFound(id.to_string()))?;

        let mut next = users.clone();
        next.remove(index);

        self.persist(&next).await?;
        *users = next;
        Ok(())
    }
}

/// On-disk shape of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    id: String,
    username: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    email: String,
    #[serde(rename = "password")]
    password_hash: String,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    biometric_enabled: bool,
    #[serde(default)]
    biometric_info: Option<BiometricInfoRecord>,
    #[serde(default)]
    last_login_ip: Option<String>,
    #[serde(default, with = "timestamp::optional")]
    last_login_at: Option<DateTime<Utc>>,
    #[serde(default)]
    last_login_method: Option<LoginMethod>,
    #[serde(default)]
    failed_login_attempts: u32,
    #[serde(default)]
    account_locked: bool,
    #[serde(default, with = "timestamp::optional")]
    account_locked_at: Option<DateTime<Utc>>,
    #[serde(with = "timestamp")]
    created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BiometricInfoRecord {
    #[serde(rename = "type")]
    biometric_type: String,
    #[serde(default)]
    device_id: String,
    #[serde(default)]
    public_key_id: Option<String>,
    #[serde(default)]
    public_key: Option<String>,
    #[serde(default)]
    challenge: Option<String>,
    #[serde(with = "timestamp")]
    enrolled_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::optional")]
    last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    usage_count: u32,
}

impl From<&User> for UserRecord {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username.as_str().to_string(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.as_str().to_string(),
            password_hash: user.password_hash.clone(),
            roles: user.roles.clone(),
            biometric_enabled: user.biometric_enabled,
            biometric_info: user.biometric_info.as_ref().map(BiometricInfoRecord::from),
            last_login_ip: user.last_login_ip.clone(),
            last_login_at: user.last_login_at,
            last_login_method: user.last_login_method,
            failed_login_attempts: user.failed_login_attempts,
            account_locked: user.account_locked,
            account_locked_at: user.account_locked_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<&BiometricInfo> for BiometricInfoRecord {
    fn from(info: &BiometricInfo) -> Self {
        Self {
            biometric_type: info.biometric_type.clone(),
            device_id: info.device_id.clone(),
            public_key_id: info.public_key_id.clone(),
            public_key: info.public_key.clone(),
            challenge: info.challenge.clone(),
            enrolled_at: info.enrolled_at,
            last_used_at: info.last_used_at,
            usage_count: info.usage_count,
        }
    }
}

impl TryFrom<UserRecord> for User {
    type Error = UserError;

    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        if record.password_hash.is_empty() {
            return Err(UserError::StorageFailure(format!(
                "User {} has no password hash",
                record.id
            )));
        }

        // Info without the flag is stale enrollment data.
        let biometric_info = if record.biometric_enabled {
            record.biometric_info.map(|info| BiometricInfo {
                biometric_type: info.biometric_type,
                device_id: info.device_id,
                public_key_id: info.public_key_id,
                public_key: info.public_key,
                challenge: info.challenge,
                enrolled_at: info.enrolled_at,
                last_used_at: info.last_used_at,
                usage_count: info.usage_count,
            })
        } else {
            None
        };

        Ok(User {
            id: UserId::from_string(&record.id)?,
            username: Username::new(record.username)?,
            first_name: record.first_name,
            last_name: record.last_name,
            email: EmailAddress::new(record.email)?,
            password_hash: record.password_hash,
            roles: normalize_roles(record.roles),
            biometric_enabled: record.biometric_enabled,
            biometric_info,
            last_login_ip: record.last_login_ip,
            last_login_at: record.last_login_at,
            last_login_method: record.last_login_method,
            failed_login_attempts: record.failed_login_attempts,
            account_locked: record.account_locked,
            account_locked_at: record.account_locked_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// RFC 3339 on write. Reads also accept offset-less ISO-8601 and take it as UTC.
mod timestamp {
    use chrono::DateTime;
    use chrono::NaiveDateTime;
    use chrono::TimeZone;
    use chrono::Utc;
    use serde::de;
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
            return Ok(value.with_timezone(&Utc));
        }

        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Utc.from_utc_datetime(&naive))
            .map_err(|e| format!("invalid timestamp {:?}: {}", raw, e))
    }

    pub mod optional {
        use super::*;

        pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| parse(&raw).map_err(de::Error::custom))
                .transpose()
        }
    }
}
