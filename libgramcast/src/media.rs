//! Local media selection and validation
//!
//! One file is picked at random per cycle, checked against the size ceiling
//! for its kind, and given a name that is safe to publish at a URL.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::config::MediaConfig;

const MB_TO_BYTES: u64 = 1024 * 1024;

/// Stem used when nothing of the original name survives sanitizing
const FALLBACK_STEM: &str = "media";

static DISALLOWED_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex"));
static UNDERSCORE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").expect("static regex"));
static NUMERIC_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"_\d+$").expect("static regex"));
static WORD_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)_(copy|final|new|old|backup)$").expect("static regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// A file picked from the media directory, not yet validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// File name without extension, used for the caption
    pub base_name: String,
    pub file_name: String,
    pub path: PathBuf,
}

/// A validated file ready to be staged
#[derive(Debug, Clone)]
pub struct MediaItem {
    pub path: PathBuf,
    pub display_name: String,
    pub extension: String,
    pub size: u64,
    pub kind: MediaKind,
}

/// Why a file was not posted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection(pub String);

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Size ceilings and video classification
#[derive(Debug, Clone)]
pub struct MediaLimits {
    pub max_image_mb: u64,
    pub max_video_mb: u64,
    pub video_extensions: Vec<String>,
}

impl MediaLimits {
    pub fn from_config(config: &MediaConfig) -> Self {
        Self {
            max_image_mb: config.max_image_mb,
            max_video_mb: config.max_video_mb,
            video_extensions: config
                .video_extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
        }
    }

    pub fn kind_of(&self, file_name: &str) -> MediaKind {
        let ext = normalize_extension(split_extension(file_name).1);
        if !ext.is_empty() && self.video_extensions.contains(&ext) {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }

    fn ceiling_bytes(&self, kind: MediaKind) -> u64 {
        match kind {
            MediaKind::Image => self.max_image_mb * MB_TO_BYTES,
            MediaKind::Video => self.max_video_mb * MB_TO_BYTES,
        }
    }
}

impl Default for MediaLimits {
    fn default() -> Self {
        Self {
            max_image_mb: 8,
            max_video_mb: 100,
            video_extensions: [".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

/// Lower-case with a single leading dot
fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().trim_start_matches('.');
    if ext.is_empty() {
        String::new()
    } else {
        format!(".{}", ext.to_lowercase())
    }
}

/// Split at the last dot; a name's leading dot does not start an extension
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if name[..idx].chars().any(|c| c != '.') => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Pick a random regular file from `directory`
///
/// Returns `None` if the directory is missing, unreadable or holds no files.
pub fn pick_random(directory: &Path) -> Option<MediaFile> {
    debug!(dir = %directory.display(), "Looking for files");

    if !directory.is_dir() {
        error!("{} is not a valid directory", directory.display());
        return None;
    }

    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            error!("Could not list {}: {}", directory.display(), e);
            return None;
        }
    };

    let files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();

    debug!("Found {} files in directory", files.len());

    let path = files.choose(&mut rand::thread_rng())?.clone();
    let file_name = path.file_name()?.to_string_lossy().into_owned();
    let base_name = split_extension(&file_name).0.to_string();

    debug!(file = %file_name, "Selected random file");
    Some(MediaFile {
        base_name,
        file_name,
        path,
    })
}

/// Check existence and size ceiling; the ceiling itself is allowed
pub fn validate(path: &Path, limits: &MediaLimits) -> Result<MediaItem, Rejection> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Err(Rejection("File does not exist".to_string())),
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let kind = limits.kind_of(&file_name);
    let size = metadata.len();

    debug!(
        size,
        size_mb = size as f64 / MB_TO_BYTES as f64,
        %kind,
        "Validating file"
    );

    if size > limits.ceiling_bytes(kind) {
        let reason = match kind {
            MediaKind::Video => format!("Video too large (max {}MB)", limits.max_video_mb),
            MediaKind::Image => format!("Image too large (max {}MB)", limits.max_image_mb),
        };
        return Err(Rejection(reason));
    }

    let (stem, ext) = split_extension(&file_name);
    Ok(MediaItem {
        path: path.to_path_buf(),
        display_name: stem.to_string(),
        extension: normalize_extension(ext),
        size,
        kind,
    })
}

/// Make a file name safe for the staging server and its public URL
///
/// Runs of characters outside `[A-Za-z0-9._-]` become one underscore,
/// repeated underscores collapse, the stem loses leading and trailing
/// underscores, and the extension is lower-cased.
pub fn sanitize_name(name: &str) -> String {
    let (stem, ext) = split_extension(name.trim());

    let stem = DISALLOWED_RUN.replace_all(stem.trim(), "_");
    let stem = UNDERSCORE_RUN.replace_all(&stem, "_");
    let stem = stem.trim_matches('_');
    let stem = if stem.is_empty() { FALLBACK_STEM } else { stem };

    let ext = DISALLOWED_RUN.replace_all(ext, "");
    let sanitized = format!("{}{}", stem, ext.to_lowercase());

    debug!(original = name, %sanitized, "Sanitized file name");
    sanitized
}

/// Drop copy/duplicate suffixes such as `_1` or `_final` from a caption
pub fn clean_caption_name(base_name: &str) -> String {
    let cleaned = NUMERIC_SUFFIX.replace(base_name, "");
    WORD_SUFFIX.replace(&cleaned, "").into_owned()
}
