//! Staging transport: temporary public hosting for media files
//!
//! The graph API does not accept uploads directly; it fetches media from a
//! public URL. A staging backend places the file somewhere a web server
//! exposes, hands back the remote name, and removes it again after the post.
//!
//! # Examples
//!
//! ```no_run
//! use libgramcast::config::Config;
//! use libgramcast::staging::{sftp::SftpStaging, Staging};
//! use std::path::Path;
//!
//! # async fn example() -> libgramcast::Result<()> {
//! let config = Config::load()?;
//! let staging = SftpStaging::from_config(&config.staging);
//!
//! let remote_name = staging.upload(Path::new("/srv/media/My Trip.mp4")).await?;
//! println!("Public at {}", staging.public_url(&remote_name));
//!
//! staging.delete(&remote_name).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;

pub mod sftp;

// Available outside tests so integration tests can drive the cycle without a server
pub mod mock;

/// A place where files can be made publicly reachable for a while
///
/// Implementations open and close their own connection per call; calls are
/// rare (one upload and one delete per multi-hour cycle).
#[async_trait]
pub trait Staging: Send + Sync {
    /// Upload a local file under its sanitized name
    ///
    /// Returns the remote name. A file that cannot be confirmed on the remote
    /// side afterwards is only logged as a warning.
    ///
    /// # Errors
    ///
    /// Returns `StagingError` if the connection, the directory change or the
    /// transfer fails. Nothing is known to exist remotely in that case.
    async fn upload(&self, local_path: &Path) -> Result<String>;

    /// Remove a previously uploaded file
    ///
    /// Absence of the file is not an error.
    async fn delete(&self, remote_name: &str) -> Result<()>;

    /// Public URL under which `remote_name` is served
    fn public_url(&self, remote_name: &str) -> String;

    /// Short identifier for logs (e.g. "sftp", "mock")
    fn name(&self) -> &str;
}

/// Join a public base URL and a remote file name with exactly one slash
pub fn join_public_url(base: &str, remote_name: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        remote_name.trim_start_matches('/')
    )
}
