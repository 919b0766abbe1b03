//! SFTP staging backend
//!
//! Uses libssh2 through the `ssh2` crate. The library is blocking, so each
//! operation runs on tokio's blocking pool with its own short-lived session.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use ssh2::{Session, Sftp};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::StagingConfig;
use crate::error::{Result, StagingError};
use crate::media::sanitize_name;
use crate::staging::{join_public_url, Staging};

/// Staging on a web host reachable over SFTP
#[derive(Clone)]
pub struct SftpStaging {
    host: String,
    port: u16,
    username: String,
    password: SecretString,
    remote_dir: String,
    public_base_url: String,
    timeout: Duration,
}

/// An open session; dropped (and disconnected) at the end of each call
struct Connection {
    session: Session,
    sftp: Sftp,
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.session.disconnect(None, "gramcast done", None) {
            debug!("SFTP disconnect: {}", e);
        }
    }
}

fn sftp_error(operation: impl Into<String>) -> impl FnOnce(ssh2::Error) -> StagingError {
    let operation = operation.into();
    move |e| StagingError::Sftp {
        operation,
        message: e.to_string(),
    }
}

impl SftpStaging {
    pub fn from_config(config: &StagingConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            password: SecretString::from(config.password.clone()),
            remote_dir: config.remote_dir.clone(),
            public_base_url: config.public_base_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn remote_path(&self, remote_name: &str) -> PathBuf {
        PathBuf::from(format!(
            "{}/{}",
            self.remote_dir.trim_end_matches('/'),
            remote_name
        ))
    }

    fn connect(&self) -> std::result::Result<Connection, StagingError> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| StagingError::Connect(format!("resolve {}: {}", self.host, e)))?
            .next()
            .ok_or_else(|| StagingError::Connect(format!("no address for {}", self.host)))?;

        let tcp = TcpStream::connect_timeout(&addr, self.timeout)
            .map_err(|e| StagingError::Connect(format!("{}: {}", addr, e)))?;

        let mut session = Session::new().map_err(sftp_error("create session"))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(self.timeout.as_millis().min(u32::MAX as u128) as u32);
        session.handshake().map_err(sftp_error("handshake"))?;

        if let Some(hash) = session.host_key_hash(ssh2::HashType::Sha256) {
            let fingerprint: String = hash.iter().map(|b| format!("{:02x}", b)).collect();
            debug!(host = %self.host, %fingerprint, "Host key");
        }

        session
            .userauth_password(&self.username, self.password.expose_secret())
            .map_err(sftp_error("authenticate"))?;
        if !session.authenticated() {
            return Err(StagingError::Connect(format!(
                "authentication as {} rejected",
                self.username
            )));
        }

        let sftp = session.sftp().map_err(sftp_error("open sftp channel"))?;
        debug!(host = %self.host, "Connected to SFTP server");

        let dir = Path::new(&self.remote_dir);
        let stat = sftp
            .stat(dir)
            .map_err(sftp_error(format!("chdir {}", self.remote_dir)))?;
        if !stat.is_dir() {
            return Err(StagingError::Sftp {
                operation: format!("chdir {}", self.remote_dir),
                message: "not a directory".to_string(),
            });
        }

        Ok(Connection { session, sftp })
    }

    fn list(&self, conn: &Connection) -> std::result::Result<Vec<String>, StagingError> {
        let entries = conn
            .sftp
            .readdir(Path::new(&self.remote_dir))
            .map_err(sftp_error(format!("list {}", self.remote_dir)))?;

        Ok(entries
            .into_iter()
            .filter_map(|(path, _)| {
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .collect())
    }

    fn upload_blocking(&self, local_path: &Path) -> std::result::Result<String, StagingError> {
        let original = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let remote_name = sanitize_name(&original);

        let mut local = std::fs::File::open(local_path)?;
        let conn = self.connect()?;

        let before = self.list(&conn)?;
        debug!("Files in directory before upload: {}", before.len());

        info!(local = %local_path.display(), remote = %remote_name, "Uploading");
        let mut remote = conn
            .sftp
            .create(&self.remote_path(&remote_name))
            .map_err(sftp_error(format!("create {}", remote_name)))?;
        let bytes = std::io::copy(&mut local, &mut remote)?;
        drop(remote);
        debug!(bytes, "Upload completed");

        let after = self.list(&conn)?;
        if after.iter().any(|name| name == &remote_name) {
            debug!("File {} confirmed on server", remote_name);
        } else {
            warn!("File {} not found on server after upload", remote_name);
        }

        Ok(remote_name)
    }

    fn delete_blocking(&self, remote_name: &str) -> std::result::Result<(), StagingError> {
        let conn = self.connect()?;

        let before = self.list(&conn)?;
        if !before.iter().any(|name| name == remote_name) {
            debug!("File {} not on server, nothing to delete", remote_name);
            return Ok(());
        }

        conn.sftp
            .unlink(&self.remote_path(remote_name))
            .map_err(sftp_error(format!("remove {}", remote_name)))?;

        let after = self.list(&conn)?;
        if after.iter().any(|name| name == remote_name) {
            warn!("File {} still exists after deletion", remote_name);
        } else {
            info!("Deleted {} from staging", remote_name);
        }

        Ok(())
    }
}

#[async_trait]
impl Staging for SftpStaging {
    async fn upload(&self, local_path: &Path) -> Result<String> {
        let this = self.clone();
        let local_path = local_path.to_path_buf();
        let remote_name = tokio::task::spawn_blocking(move || this.upload_blocking(&local_path))
            .await
            .map_err(StagingError::from)??;
        Ok(remote_name)
    }

    async fn delete(&self, remote_name: &str) -> Result<()> {
        let this = self.clone();
        let remote_name = remote_name.to_string();
        tokio::task::spawn_blocking(move || this.delete_blocking(&remote_name))
            .await
            .map_err(StagingError::from)??;
        Ok(())
    }

    fn public_url(&self, remote_name: &str) -> String {
        join_public_url(&self.public_base_url, remote_name)
    }

    fn name(&self) -> &str {
        "sftp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GramcastError;

    fn config() -> StagingConfig {
        StagingConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: "poster".to_string(),
            password: "secret".to_string(),
            remote_dir: "/public_html/uploads/".to_string(),
            public_base_url: "https://example.com/uploads/".to_string(),
            timeout_secs: 1,
        }
    }

    #[test]
    fn test_remote_path_joins_directory() {
        let staging = SftpStaging::from_config(&config());
        assert_eq!(
            staging.remote_path("a.jpg"),
            PathBuf::from("/public_html/uploads/a.jpg")
        );
    }

    #[test]
    fn test_public_url_uses_base() {
        let staging = SftpStaging::from_config(&config());
        assert_eq!(
            staging.public_url("My_Trip_2024.mp4"),
            "https://example.com/uploads/My_Trip_2024.mp4"
        );
        assert_eq!(staging.name(), "sftp");
    }

    #[tokio::test]
    async fn test_upload_missing_local_file_fails_before_connecting() {
        let staging = SftpStaging::from_config(&config());
        let err = staging
            .upload(Path::new("/no/such/file.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, GramcastError::Staging(StagingError::Io(_))));
    }

    #[tokio::test]
    async fn test_delete_unreachable_server_is_connect_error() {
        // Port 1 on localhost refuses connections
        let staging = SftpStaging::from_config(&config());
        let err = staging.delete("a.jpg").await.unwrap_err();
        assert!(matches!(
            err,
            GramcastError::Staging(StagingError::Connect(_))
        ));
    }
}
