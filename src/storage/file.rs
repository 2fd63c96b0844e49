//! Filesystem certificate store
//!
//! Mirrors the derived path hierarchy as directories under a root:
//!
//! ```text
//! <home>/com/example/www/certificate.json
//! ```
//!
//! Each document holds both halves of the record. Writes go to a temp file
//! in the same directory followed by a rename. There is no versioning.

use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::engine::{with_deadline, StoreAddress, StoreEngine, StoreEngineType};
use crate::certificate::documents::CertificateDocument;
use crate::certificate::{CertType, CertificateRecord};
use crate::errors::{KnoxError, Result};

pub const DOCUMENT_FILE: &str = "certificate.json";

#[derive(Debug, Clone)]
pub struct FileStoreEngine {
    home: PathBuf,
    request_timeout: Duration,
}

impl FileStoreEngine {
    /// Opens the store, creating the root directory if needed.
    pub async fn open(home: impl Into<PathBuf>, request_timeout: Duration) -> Result<Self> {
        let home = home.into();
        tokio::fs::create_dir_all(&home)
            .await
            .map_err(|e| KnoxError::io(e, format!("Failed to create store root {}", home.display())))?;
        debug!(home = %home.display(), "File store ready");
        Ok(Self { home, request_timeout })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Directory for a store path. Only plain segments are accepted, so the
    /// result always stays under `home`.
    fn directory(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_matches('/'));
        let mut directory = self.home.clone();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => directory.push(segment),
                _ => {
                    return Err(KnoxError::invalid_subject_name(
                        path,
                        "path escapes the store root",
                    ))
                }
            }
        }
        Ok(directory)
    }

    async fn call<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        with_deadline(self.request_timeout, operation, call).await
    }

    async fn write_document(&self, directory: &Path, document: &CertificateDocument) -> Result<()> {
        tokio::fs::create_dir_all(directory)
            .await
            .map_err(|e| KnoxError::io(e, format!("Failed to create {}", directory.display())))?;

        let contents = serde_json::to_vec_pretty(document)?;
        let target = directory.join(DOCUMENT_FILE);
        let temp = directory.join(format!(".{}.{}.tmp", DOCUMENT_FILE, uuid::Uuid::new_v4()));

        tokio::fs::write(&temp, &contents)
            .await
            .map_err(|e| KnoxError::io(e, format!("Failed to write {}", temp.display())))?;

        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(KnoxError::io(e, format!("Failed to replace {}", target.display())));
        }
        Ok(())
    }

    async fn read_document(&self, file: &Path) -> Result<CertificateRecord> {
        let contents = match tokio::fs::read(file).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(KnoxError::not_found(file.display().to_string()))
            }
            Err(e) => return Err(KnoxError::io(e, format!("Failed to read {}", file.display()))),
        };

        let document: CertificateDocument = serde_json::from_slice(&contents)
            .map_err(|e| KnoxError::serialization(e, format!("Malformed document {}", file.display())))?;
        document.into_record()
    }

    /// Every document file under `directory`, depth first in name order.
    async fn collect_documents(&self, directory: &Path) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        let mut stack = vec![directory.to_path_buf()];

        while let Some(dir) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if dir == directory => {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        return Err(KnoxError::not_found(dir.display().to_string()));
                    }
                    return Err(KnoxError::io(e, format!("Failed to list {}", dir.display())));
                }
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "Skipping unreadable directory");
                    continue;
                }
            };

            let mut children = Vec::new();
            loop {
                match entries.next_entry().await {
                    Ok(Some(entry)) => {
                        let path = entry.path();
                        let is_dir = entry.file_type().await.map(|kind| kind.is_dir()).unwrap_or(false);
                        if is_dir {
                            children.push(path);
                        } else if entry.file_name() == DOCUMENT_FILE {
                            found.push(path);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(path = %dir.display(), error = %e, "Stopped listing directory early");
                        break;
                    }
                }
            }

            children.sort();
            stack.extend(children.into_iter().rev());
        }
        Ok(found)
    }
}

#[async_trait]
impl StoreEngine for FileStoreEngine {
    #[instrument(skip(self, record), fields(path = %record.path()))]
    async fn save(&self, record: &mut CertificateRecord) -> Result<()> {
        record.ensure_storable()?;

        let directory = self.directory(record.path())?;
        let document = CertificateDocument::from_record(record);
        self.call("file write", self.write_document(&directory, &document)).await?;

        info!(path = %record.path(), file = %directory.join(DOCUMENT_FILE).display(), "Saved certificate to file store");
        Ok(())
    }

    #[instrument(skip(self, address), fields(address = %address))]
    async fn get(&self, address: &StoreAddress, _name: &str, _cert_type: CertType) -> Result<CertificateRecord> {
        let file = self.directory(address.as_str())?.join(DOCUMENT_FILE);
        self.call("file read", self.read_document(&file)).await.map_err(|e| {
            if e.is_not_found() {
                KnoxError::not_found(address.to_string())
            } else {
                e
            }
        })
    }

    #[instrument(skip(self))]
    async fn find(&self, path: &str, name: &str) -> Result<Vec<CertificateRecord>> {
        let directory = self.directory(path)?;
        let files = self.call("file list", self.collect_documents(&directory)).await.map_err(|e| {
            if e.is_not_found() {
                KnoxError::not_found(path)
            } else {
                e
            }
        })?;

        let mut records = Vec::new();
        for file in files {
            match self.call("file read", self.read_document(&file)).await {
                Ok(record) => records.push(record),
                Err(e) => warn!(file = %file.display(), error = %e, "Skipping unreadable certificate"),
            }
        }

        if records.is_empty() {
            return Err(KnoxError::not_found(path));
        }
        Ok(records)
    }

    fn engine_type(&self) -> StoreEngineType {
        StoreEngineType::File
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("nested/store");
        let store = FileStoreEngine::open(&home, Duration::from_secs(5)).await.unwrap();
        assert!(store.home().is_dir());
    }

    #[tokio::test]
    async fn test_directory_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStoreEngine::open(dir.path(), Duration::from_secs(5)).await.unwrap();
        assert_eq!(store.directory("/com/example/www").unwrap(), dir.path().join("com/example/www"));
        assert_eq!(store.directory("/").unwrap(), dir.path());
    }

    #[tokio::test]
    async fn test_directory_rejects_parent_segments() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStoreEngine::open(dir.path().join("store"), Duration::from_secs(5)).await.unwrap();
        for path in ["/../outside", "/com/../../outside", ".."] {
            let err = store.directory(path).unwrap_err();
            assert!(matches!(err, KnoxError::InvalidSubjectName { .. }), "{}", path);
        }
    }

    #[tokio::test]
    async fn test_missing_subtree_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStoreEngine::open(dir.path(), Duration::from_secs(5)).await.unwrap();
        let err = store.find("/org/example", "example.org").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
