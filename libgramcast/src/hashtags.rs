//! Static hashtag pool sampled for each caption

use rand::seq::SliceRandom;
use std::path::Path;
use tracing::{debug, warn};

/// Ordered set of hashtags loaded once per run
#[derive(Debug, Clone, Default)]
pub struct HashtagPool {
    tags: Vec<String>,
}

impl HashtagPool {
    pub fn new(tags: Vec<String>) -> Self {
        Self { tags }
    }

    /// Load tags from a text file
    ///
    /// Only lines starting with `#` (after trimming) count. A missing or
    /// unreadable file yields an empty pool; captions then go out without
    /// tags.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let pool = Self::parse(&content);
                debug!(path = %path.display(), "Loaded {} hashtags", pool.len());
                pool
            }
            Err(e) => {
                warn!(path = %path.display(), "Could not read hashtags file: {}", e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Self {
        let tags = content
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with('#'))
            .map(str::to_string)
            .collect();
        Self { tags }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Sample up to `count` distinct tags, without replacement
    pub fn sample(&self, count: usize) -> Vec<String> {
        let mut rng = rand::thread_rng();
        self.tags
            .choose_multiple(&mut rng, count.min(self.tags.len()))
            .cloned()
            .collect()
    }

    /// Sampled tags joined for a caption, empty when the pool is
    pub fn caption_line(&self, count: usize) -> String {
        let selected = self.sample(count).join(" ");
        debug!("Selected hashtags: {}", selected);
        selected
    }
}
