//! Posting cycle orchestration
//!
//! One cycle moves a single local file through
//! select, validate, stage, probe, publish and cleanup. Every step reports
//! into a [`CycleReport`] instead of returning early with an error, so the
//! daemon loop only has to decide how long to idle afterwards.
//!
//! Once a file has been staged and the probe passed, both the staged copy
//! and the local file are removed no matter how publishing went.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::error::GraphError;
use crate::graph::{GraphClient, Publisher};
use crate::hashtags::HashtagPool;
use crate::logging::preview;
use crate::media::{self, MediaKind, MediaLimits};
use crate::probe;
use crate::schedule::{DelayClass, Schedule, WaitOutcome};
use crate::staging::sftp::SftpStaging;
use crate::staging::Staging;
use crate::token::TokenStore;

/// What happened to a file that made it to the graph API
#[derive(Debug, Clone)]
pub struct PostReport {
    pub file_name: String,
    pub remote_name: String,
    pub kind: MediaKind,
    /// Published media id for images, container id for reels
    pub post: std::result::Result<String, GraphError>,
    /// Only attempted after an image post was published
    pub story: Option<std::result::Result<String, GraphError>>,
    pub remote_deleted: bool,
    pub local_deleted: bool,
}

/// Outcome of a single cycle
#[derive(Debug, Clone)]
pub enum CycleReport {
    /// No file could be selected
    NoFile,
    /// The selected file failed validation and was left alone
    Rejected { file_name: String, reason: String },
    /// Upload failed; nothing is known to exist remotely
    StagingFailed { file_name: String, error: String },
    /// The staged copy was not publicly reachable and has been removed again
    Unreachable {
        remote_name: String,
        remote_deleted: bool,
    },
    Posted(PostReport),
}

impl CycleReport {
    /// Delay before the next cycle; `None` means start again right away
    pub fn next_delay(&self) -> Option<DelayClass> {
        match self {
            CycleReport::NoFile | CycleReport::Posted(_) => Some(DelayClass::Long),
            CycleReport::Rejected { .. }
            | CycleReport::StagingFailed { .. }
            | CycleReport::Unreachable { .. } => None,
        }
    }
}

/// Runs posting cycles against a staging backend and a publisher
pub struct CycleRunner {
    media_dir: PathBuf,
    limits: MediaLimits,
    hashtags: HashtagPool,
    hashtag_count: usize,
    staging: Arc<dyn Staging>,
    publisher: Arc<dyn Publisher>,
    http: reqwest::Client,
    schedule: Schedule,
}

impl CycleRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        media_dir: PathBuf,
        limits: MediaLimits,
        hashtags: HashtagPool,
        hashtag_count: usize,
        staging: Arc<dyn Staging>,
        publisher: Arc<dyn Publisher>,
        http: reqwest::Client,
        schedule: Schedule,
    ) -> Self {
        Self {
            media_dir,
            limits,
            hashtags,
            hashtag_count,
            staging,
            publisher,
            http,
            schedule,
        }
    }

    /// Wire up SFTP staging and the graph client from configuration
    pub fn from_config(config: &Config, tokens: Arc<TokenStore>, http: reqwest::Client) -> Self {
        let hashtags = HashtagPool::load(&config.hashtags_path());
        info!("Loaded {} hashtags", hashtags.len());

        let staging: Arc<dyn Staging> = Arc::new(SftpStaging::from_config(&config.staging));
        let publisher: Arc<dyn Publisher> =
            Arc::new(GraphClient::new(&config.graph, http.clone(), tokens));

        Self::new(
            config.media_directory(),
            MediaLimits::from_config(&config.media),
            hashtags,
            config.hashtags.count,
            staging,
            publisher,
            http,
            Schedule::from_config(config),
        )
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Build the caption: cleaned display name, a blank line, hashtags
    pub fn caption(&self, base_name: &str) -> String {
        let name = media::clean_caption_name(base_name);
        let tags = self.hashtags.caption_line(self.hashtag_count);
        format!("{}\n\n{}", name, tags).trim_end().to_string()
    }

    /// Run one cycle inside its own span
    pub async fn run_cycle(&self, shutdown: &AtomicBool) -> CycleReport {
        let span = tracing::info_span!("cycle", id = %Uuid::new_v4());
        self.run_cycle_inner(shutdown).instrument(span).await
    }

    async fn run_cycle_inner(&self, shutdown: &AtomicBool) -> CycleReport {
        info!("Starting new cycle");

        let Some(file) = media::pick_random(&self.media_dir) else {
            error!("Could not select a file to process");
            return CycleReport::NoFile;
        };
        info!(file = %file.file_name, "Processing file");

        let item = match media::validate(&file.path, &self.limits) {
            Ok(item) => item,
            Err(rejection) => {
                error!(file = %file.file_name, "File validation failed: {}", rejection);
                return CycleReport::Rejected {
                    file_name: file.file_name,
                    reason: rejection.0,
                };
            }
        };
        debug!(kind = %item.kind, size = item.size, "File validation passed");

        let remote_name = match self.staging.upload(&item.path).await {
            Ok(name) => name,
            Err(e) => {
                error!(backend = self.staging.name(), "Upload failed: {}", e);
                return CycleReport::StagingFailed {
                    file_name: file.file_name,
                    error: e.to_string(),
                };
            }
        };

        let url = self.staging.public_url(&remote_name);
        debug!(%url, "Staged");

        if !probe::is_reachable(&self.http, &url).await {
            error!(%url, "URL is not accessible, skipping post");
            let remote_deleted = self.delete_remote(&remote_name).await;
            return CycleReport::Unreachable {
                remote_name,
                remote_deleted,
            };
        }

        let caption = self.caption(&file.base_name);
        debug!(caption = %preview(&caption, 100), "Prepared caption");

        let (post, story) = match item.kind {
            MediaKind::Video => (self.post_video(&caption, &url, shutdown).await, None),
            MediaKind::Image => self.post_image(&caption, &url).await,
        };

        let remote_deleted = self.delete_remote(&remote_name).await;
        let local_deleted = delete_local(&item.path).await;

        info!("Cycle completed");
        CycleReport::Posted(PostReport {
            file_name: file.file_name,
            remote_name,
            kind: item.kind,
            post,
            story,
            remote_deleted,
            local_deleted,
        })
    }

    async fn post_video(
        &self,
        caption: &str,
        url: &str,
        shutdown: &AtomicBool,
    ) -> std::result::Result<String, GraphError> {
        let container = self
            .publisher
            .create_video_container(caption, url)
            .await
            .inspect_err(|e| error!("Video upload failed: {}", e))?;

        info!(container_id = %container.id, "Video upload initiated");
        if self.schedule.wait(DelayClass::Short, shutdown).await == WaitOutcome::Cancelled {
            warn!("Shutdown during processing wait, cleaning up now");
        }
        Ok(container.id)
    }

    async fn post_image(
        &self,
        caption: &str,
        url: &str,
    ) -> (
        std::result::Result<String, GraphError>,
        Option<std::result::Result<String, GraphError>>,
    ) {
        let post = match self.publisher.create_image_container(caption, url).await {
            Ok(container) => self.publisher.publish(&container.id).await,
            Err(e) => Err(e),
        };

        match post {
            Ok(media_id) => {
                info!(%media_id, "Post published");
                let story = self.post_story(url).await;
                (Ok(media_id), Some(story))
            }
            Err(e) => {
                error!("Image post failed: {}", e);
                (Err(e), None)
            }
        }
    }

    async fn post_story(&self, url: &str) -> std::result::Result<String, GraphError> {
        let story = match self.publisher.create_story_container(url).await {
            Ok(container) => self.publisher.publish(&container.id).await,
            Err(e) => Err(e),
        };

        match &story {
            Ok(media_id) => info!(%media_id, "Story published"),
            Err(e) => error!("Story failed: {}", e),
        }
        story
    }

    async fn delete_remote(&self, remote_name: &str) -> bool {
        match self.staging.delete(remote_name).await {
            Ok(()) => true,
            Err(e) => {
                error!(%remote_name, "Could not remove staged file: {}", e);
                false
            }
        }
    }

    /// Run cycles until `shutdown` is set
    ///
    /// With `once`, a single cycle runs and its report is returned without
    /// idling afterwards.
    pub async fn run(&self, shutdown: &AtomicBool, once: bool) -> Option<CycleReport> {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Shutdown requested, stopping cycle loop");
                return None;
            }

            let report = self.run_cycle(shutdown).await;
            if once {
                return Some(report);
            }

            match report.next_delay() {
                Some(class) => {
                    debug!("Scheduling next cycle");
                    if self.schedule.wait(class, shutdown).await == WaitOutcome::Cancelled {
                        info!("Shutdown requested during idle");
                        return None;
                    }
                }
                None => debug!("Continuing with the next file immediately"),
            }
        }
    }
}

/// Remove the local copy after it has been handled
async fn delete_local(path: &Path) -> bool {
    debug!(path = %path.display(), "Deleting local file");
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            info!(path = %path.display(), "Local file deleted");
            true
        }
        Err(e) => {
            error!(path = %path.display(), "Error deleting local file: {}", e);
            false
        }
    }
}
