//! Content-addressed build cache.
//!
//! Maps a `(purpose, exact input bytes)` pair to a previously computed
//! payload. The key is the purpose tag concatenated with the SHA-256 hex
//! digest of the input, so identical inputs under distinct purposes never
//! clash. Caching is best-effort: every I/O failure degrades to a miss, and
//! entries never expire until `clear` runs.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

pub struct BuildCache {
    cache_dir: PathBuf,
}

impl BuildCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).ok();
        }
        Self { cache_dir }
    }

    pub fn compute_hash(input: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(input);
        format!("{:x}", hasher.finalize())
    }

    fn entry_path(&self, purpose: &str, input: &[u8]) -> PathBuf {
        self.cache_dir
            .join(format!("{}_{}", purpose, Self::compute_hash(input)))
    }

    /// Store a payload for the given purpose and input. No-op when either
    /// `purpose` or `input` is empty.
    pub fn save(&self, purpose: &str, input: &[u8], payload: &[u8]) {
        if purpose.is_empty() || input.is_empty() {
            return;
        }
        let path = self.entry_path(purpose, input);
        if fs::write(&path, payload).is_err() {
            tracing::warn!(path = %path.display(), "cache write failed, skipping entry");
        }
    }

    /// Fetch a previously stored payload. Returns `None` on a miss, on empty
    /// arguments, or when the entry cannot be read back.
    pub fn get(&self, purpose: &str, input: &[u8]) -> Option<Vec<u8>> {
        if purpose.is_empty() || input.is_empty() {
            return None;
        }
        let path = self.entry_path(purpose, input);
        if !path.exists() {
            return None;
        }
        fs::read(&path).ok()
    }

    pub fn get_text(&self, purpose: &str, input: &[u8]) -> Option<String> {
        self.get(purpose, input)
            .and_then(|bytes| String::from_utf8(bytes).ok())
    }

    /// Remove every stored entry. Explicit maintenance operation; the build
    /// never invokes this on its own.
    pub fn clear(&self) {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() {
                fs::remove_file(path).ok();
            }
        }
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }
}
