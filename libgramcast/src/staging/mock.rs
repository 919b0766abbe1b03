//! Mock staging backend for testing
//!
//! Keeps an in-memory "remote directory" and records every call, so cycle
//! tests can assert what was uploaded and cleaned up without an SFTP server.
//! Pair it with an HTTP mock server as `public_base_url` to exercise the
//! reachability probe.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{Result, StagingError};
use crate::media::sanitize_name;
use crate::staging::{join_public_url, Staging};

/// Configuration for mock staging behavior
#[derive(Debug, Clone)]
pub struct MockStagingConfig {
    pub public_base_url: String,

    /// Whether uploads should succeed
    pub upload_succeeds: bool,

    /// Whether deletes should succeed
    pub delete_succeeds: bool,

    /// Accept the upload but do not keep the file (remote listing misses it)
    pub lose_uploads: bool,

    /// Names currently "on the server"
    pub remote_files: Arc<Mutex<BTreeSet<String>>>,

    /// Remote names returned by successful uploads, in call order
    pub uploads: Arc<Mutex<Vec<String>>>,

    /// Remote names passed to delete, in call order
    pub deletes: Arc<Mutex<Vec<String>>>,
}

impl Default for MockStagingConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://127.0.0.1/uploads/".to_string(),
            upload_succeeds: true,
            delete_succeeds: true,
            lose_uploads: false,
            remote_files: Arc::new(Mutex::new(BTreeSet::new())),
            uploads: Arc::new(Mutex::new(Vec::new())),
            deletes: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock staging for tests
#[derive(Debug, Clone)]
pub struct MockStaging {
    config: MockStagingConfig,
}

impl MockStaging {
    pub fn new(config: MockStagingConfig) -> Self {
        Self { config }
    }

    /// Mock staging that always succeeds
    pub fn success(public_base_url: &str) -> Self {
        Self::new(MockStagingConfig {
            public_base_url: public_base_url.to_string(),
            ..Default::default()
        })
    }

    /// Mock staging whose uploads fail
    pub fn upload_failure(public_base_url: &str) -> Self {
        Self::new(MockStagingConfig {
            public_base_url: public_base_url.to_string(),
            upload_succeeds: false,
            ..Default::default()
        })
    }

    /// Mock staging whose deletes fail
    pub fn delete_failure(public_base_url: &str) -> Self {
        Self::new(MockStagingConfig {
            public_base_url: public_base_url.to_string(),
            delete_succeeds: false,
            ..Default::default()
        })
    }

    pub fn uploads(&self) -> Vec<String> {
        self.config.uploads.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.config.deletes.lock().unwrap().clone()
    }

    pub fn remote_files(&self) -> Vec<String> {
        self.config
            .remote_files
            .lock()
            .unwrap()
            .iter()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Staging for MockStaging {
    async fn upload(&self, local_path: &Path) -> Result<String> {
        if !self.config.upload_succeeds {
            return Err(StagingError::Connect("Mock upload failed".to_string()).into());
        }

        // Surface a missing local file the way a real transfer would
        tokio::fs::metadata(local_path)
            .await
            .map_err(StagingError::from)?;

        let original = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let remote_name = sanitize_name(&original);

        if self.config.lose_uploads {
            tracing::warn!("File {} not found on server after upload", remote_name);
        } else {
            self.config
                .remote_files
                .lock()
                .unwrap()
                .insert(remote_name.clone());
        }
        self.config.uploads.lock().unwrap().push(remote_name.clone());

        Ok(remote_name)
    }

    async fn delete(&self, remote_name: &str) -> Result<()> {
        self.config
            .deletes
            .lock()
            .unwrap()
            .push(remote_name.to_string());

        if !self.config.delete_succeeds {
            return Err(StagingError::Sftp {
                operation: format!("remove {}", remote_name),
                message: "Mock delete failed".to_string(),
            }
            .into());
        }

        self.config.remote_files.lock().unwrap().remove(remote_name);
        Ok(())
    }

    fn public_url(&self, remote_name: &str) -> String {
        join_public_url(&self.config.public_base_url, remote_name)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[tokio::test]
    async fn test_mock_upload_then_delete() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("Beach Day!.JPG");
        File::create(&path).unwrap();

        let staging = MockStaging::success("http://localhost/u");
        let remote = staging.upload(&path).await.unwrap();
        assert_eq!(remote, "Beach_Day.jpg");
        assert_eq!(staging.remote_files(), vec!["Beach_Day.jpg"]);
        assert_eq!(staging.public_url(&remote), "http://localhost/u/Beach_Day.jpg");

        staging.delete(&remote).await.unwrap();
        assert!(staging.remote_files().is_empty());
        assert_eq!(staging.deletes(), vec!["Beach_Day.jpg"]);
    }

    #[tokio::test]
    async fn test_mock_delete_absent_is_ok() {
        let staging = MockStaging::success("http://localhost/u");
        assert!(staging.delete("ghost.jpg").await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_upload_failure() {
        let staging = MockStaging::upload_failure("http://localhost/u");
        let err = staging.upload(Path::new("/whatever.jpg")).await.unwrap_err();
        assert!(err.to_string().contains("Mock upload failed"));
        assert!(staging.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_mock_upload_missing_local_file() {
        let staging = MockStaging::success("http://localhost/u");
        assert!(staging.upload(Path::new("/no/such/file.jpg")).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_delete_failure_is_recorded() {
        let staging = MockStaging::delete_failure("http://localhost/u");
        assert!(staging.delete("a.jpg").await.is_err());
        assert_eq!(staging.deletes(), vec!["a.jpg"]);
    }
}
