// Local filesystem FileStore
// Layout: {staging_dir}/{job_id}/{file} and {payload_dir}/{job_id}/{file}

use async_trait::async_trait;
use bulkex_core::domain::JobId;
use bulkex_core::error::{AppError, Result};
use bulkex_core::port::FileStore;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

pub struct LocalFileStore {
    staging_dir: PathBuf,
    payload_dir: PathBuf,
}

impl LocalFileStore {
    pub fn new(staging_dir: impl Into<PathBuf>, payload_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            payload_dir: payload_dir.into(),
        }
    }

    pub fn staging_path(&self, job_id: JobId) -> PathBuf {
        self.staging_dir.join(job_id.to_string())
    }

    pub fn payload_path(&self, job_id: JobId) -> PathBuf {
        self.payload_dir.join(job_id.to_string())
    }
}

fn storage_error(action: &str, path: &Path, err: std::io::Error) -> AppError {
    AppError::Storage(format!("{} {}: {}", action, path.display(), err))
}

async fn remove_dir_if_present(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Directory removed");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(storage_error("remove", path, e)),
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn write_staged(&self, job_id: JobId, file_name: &str, bytes: &[u8]) -> Result<()> {
        let dir = self.staging_path(job_id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_error("create", &dir, e))?;
        let path = dir.join(file_name);
        fs::write(&path, bytes)
            .await
            .map_err(|e| storage_error("write", &path, e))
    }

    async fn remove_staged(&self, job_id: JobId, file_name: &str) -> Result<()> {
        let path = self.staging_path(job_id).join(file_name);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("remove", &path, e)),
        }
    }

    async fn publish(&self, job_id: JobId, file_name: &str, bytes: &[u8]) -> Result<()> {
        let dir = self.payload_path(job_id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_error("create", &dir, e))?;

        // Readers never see a partial file
        let temp = dir.join(format!(".{}.{:016x}.tmp", file_name, rand::random::<u64>()));
        let target = dir.join(file_name);
        if let Err(e) = fs::write(&temp, bytes).await {
            let _ = fs::remove_file(&temp).await;
            return Err(storage_error("write", &temp, e));
        }
        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(storage_error("rename", &target, e));
        }
        Ok(())
    }

    async fn read_payload(&self, job_id: JobId, file_name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.payload_path(job_id).join(file_name);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error("read", &path, e)),
        }
    }

    async fn remove_staging_dir(&self, job_id: JobId) -> Result<()> {
        remove_dir_if_present(&self.staging_path(job_id)).await
    }

    async fn remove_payload_dir(&self, job_id: JobId) -> Result<()> {
        remove_dir_if_present(&self.payload_path(job_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalFileStore) {
        let root = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(root.path().join("staging"), root.path().join("payload"));
        (root, store)
    }

    #[tokio::test]
    async fn test_publish_overwrites_and_leaves_no_temp_files() {
        let (_root, store) = store();

        store.publish(7, "A0001-0.ndjson", b"first").await.unwrap();
        store.publish(7, "A0001-0.ndjson", b"second").await.unwrap();

        assert_eq!(
            store.read_payload(7, "A0001-0.ndjson").await.unwrap(),
            Some(b"second".to_vec())
        );
        let mut entries = std::fs::read_dir(store.payload_path(7)).unwrap();
        assert_eq!(
            entries.next().unwrap().unwrap().file_name(),
            "A0001-0.ndjson"
        );
        assert!(entries.next().is_none());
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let (_root, store) = store();
        // A directory at the target path makes the rename fail
        let blocker = store.payload_path(7).join("A0001-0.ndjson");
        std::fs::create_dir_all(blocker.join("inner")).unwrap();

        let err = store.publish(7, "A0001-0.ndjson", b"data").await.unwrap_err();

        assert!(matches!(err, AppError::Storage(_)));
        let names: Vec<_> = std::fs::read_dir(store.payload_path(7))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["A0001-0.ndjson"]);
    }

    #[tokio::test]
    async fn test_staging_lifecycle() {
        let (_root, store) = store();

        store.write_staged(7, "a.ndjson", b"x").await.unwrap();
        assert!(store.staging_path(7).join("a.ndjson").exists());

        store.remove_staged(7, "a.ndjson").await.unwrap();
        store.remove_staged(7, "a.ndjson").await.unwrap();
        assert!(!store.staging_path(7).join("a.ndjson").exists());

        store.remove_staging_dir(7).await.unwrap();
        assert!(!store.staging_path(7).exists());
        store.remove_staging_dir(7).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_payload_is_none() {
        let (_root, store) = store();
        assert_eq!(store.read_payload(1, "nope.ndjson").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_payload_dir() {
        let (_root, store) = store();
        store.publish(3, "f.ndjson", b"x").await.unwrap();

        store.remove_payload_dir(3).await.unwrap();

        assert!(!store.payload_path(3).exists());
        assert_eq!(store.read_payload(3, "f.ndjson").await.unwrap(), None);
    }
}
