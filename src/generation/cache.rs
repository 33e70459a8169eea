//! Content-keyed generator cache.
//!
//! Entries are JSON files named by the BLAKE3 hash of the request. The cache lives
//! outside pipeline ownership and may be shared between runs; read and write failures
//! are logged and otherwise ignored. Responses shorter than the configured minimum are
//! neither stored nor served, so a rejected attempt can be retried.

use crate::error::GenerationError;
use crate::generation::StepGenerator;
use async_trait::async_trait;
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    step_description: String,
    content: String,
    created_at: String,
}

/// Wraps a generator, serving repeated requests from disk.
pub struct CachedGenerator<G> {
    inner: G,
    dir: PathBuf,
    min_length: usize,
}

impl<G: StepGenerator> CachedGenerator<G> {
    pub fn new(inner: G, dir: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            dir: dir.into(),
            min_length: 0,
        }
    }

    /// Only responses with at least `min_length` characters (trimmed) are cached.
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    fn cacheable(&self, content: &str) -> bool {
        let length = content.trim().chars().count();
        length > 0 && length >= self.min_length
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, step_description: &str, prior_context: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", cache_key(step_description, prior_context)))
    }

    fn load(&self, path: &Path) -> Option<String> {
        let raw = fs::read_to_string(path).ok()?;
        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if self.cacheable(&entry.content) => Some(entry.content),
            Ok(_) => {
                debug!(path = %path.display(), "Ignoring cache entry below minimum length");
                None
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Ignoring unreadable cache entry");
                None
            }
        }
    }

    fn store(&self, path: &Path, step_description: &str, content: &str) {
        let entry = CacheEntry {
            step_description: step_description.to_string(),
            content: content.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        let result = fs::create_dir_all(&self.dir)
            .and_then(|_| {
                serde_json::to_string_pretty(&entry)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            })
            .and_then(|serialized| fs::write(path, serialized));
        if let Err(err) = result {
            warn!(path = %path.display(), error = %err, "Failed to write cache entry");
        }
    }
}

#[async_trait]
impl<G: StepGenerator> StepGenerator for CachedGenerator<G> {
    async fn generate(
        &self,
        step_description: &str,
        prior_context: &str,
    ) -> Result<String, GenerationError> {
        let path = self.entry_path(step_description, prior_context);
        if let Some(content) = self.load(&path) {
            debug!(path = %path.display(), "Generator cache hit");
            return Ok(content);
        }

        let content = self.inner.generate(step_description, prior_context).await?;
        if self.cacheable(&content) {
            self.store(&path, step_description, &content);
        }
        Ok(content)
    }
}

/// Hex BLAKE3 digest of a request. Fields are length-prefixed so that
/// `("ab", "c")` and `("a", "bc")` never collide.
pub fn cache_key(step_description: &str, prior_context: &str) -> String {
    let mut hasher = Hasher::new();
    for part in [step_description, prior_context] {
        hasher.update(&(part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize().as_bytes())
}
