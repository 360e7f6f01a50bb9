use std::io;
use std::path::Path;
use std::path::PathBuf;

/// Directory-backed file I/O rooted at the configured storage path.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Create the root directory and any missing parents.
    pub async fn ensure_directory(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Whole-file read; `None` when the file does not exist.
    pub async fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Replace the file contents. The bytes land in a sibling `.tmp` file
    /// first and are renamed over the target, so readers never see a
    /// half-written file.
    pub async fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = with_suffix(path, "tmp");
        tokio::fs::write(&temp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&temp, path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }
        Ok(())
    }

    /// Copy `path` to a sibling `.bak` file, overwriting an older backup.
    pub async fn create_backup(&self, path: &Path) -> io::Result<PathBuf> {
        let backup = with_suffix(path, "bak");
        tokio::fs::copy(path, &backup).await?;
        Ok(backup)
    }
}

/// `users.json` -> `users.json.<suffix>`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn temp_storage() -> FileStorage {
        FileStorage::new(std::env::temp_dir().join(format!("storage-test-{}", Uuid::new_v4())))
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let storage = temp_storage();
        let result = storage.read(&storage.path_of("absent.json")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_write_creates_directory_and_replaces() {
        let storage = temp_storage();
        let path = storage.path_of("nested/users.json");

        storage.write(&path, b"first").await.unwrap();
        storage.write(&path, b"second").await.unwrap();

        assert_eq!(storage.read(&path).await.unwrap().unwrap(), b"second");
        assert!(!with_suffix(&path, "tmp").exists());

        tokio::fs::remove_dir_all(storage.root()).await.unwrap();
    }

    #[tokio::test]
    async fn test_backup_copies_contents() {
        let storage = temp_storage();
        storage.ensure_directory().await.unwrap();
        let path = storage.path_of("users.json");
        storage.write(&path, b"{ broken").await.unwrap();

        let backup = storage.create_backup(&path).await.unwrap();

        assert_eq!(backup, storage.path_of("users.json.bak"));
        assert_eq!(tokio::fs::read(&backup).await.unwrap(), b"{ broken");

        tokio::fs::remove_dir_all(storage.root()).await.unwrap();
    }
}
