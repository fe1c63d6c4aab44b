//! In-memory asset source for testing
//!
//! Serves registered byte blobs and records every request so tests can
//! assert which URLs were (or were not) fetched.

use super::{AssetSource, FetchError, FetchMode};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Memory-backed asset source
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    entries: Arc<RwLock<HashMap<String, Bytes>>>,
    failing: Arc<RwLock<HashSet<String>>>,
    requests: Arc<RwLock<Vec<(String, FetchMode)>>>,
}

impl MemorySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `data` at `url`
    pub fn insert(&self, url: impl Into<String>, data: impl Into<Bytes>) {
        self.entries.write().insert(url.into(), data.into());
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(self, url: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.insert(url, data);
        self
    }

    /// Make requests for `url` fail with a transport error
    pub fn fail(&self, url: impl Into<String>) {
        self.failing.write().insert(url.into());
    }

    /// All requests made so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.read().iter().map(|(u, _)| u.clone()).collect()
    }

    /// All requests with the fetch mode they used
    pub fn requests_with_mode(&self) -> Vec<(String, FetchMode)> {
        self.requests.read().clone()
    }

    /// Number of times `url` was requested
    pub fn request_count(&self, url: &str) -> usize {
        self.requests.read().iter().filter(|(u, _)| u == url).count()
    }

    /// Forget recorded requests
    pub fn clear_requests(&self) {
        self.requests.write().clear();
    }
}

#[async_trait::async_trait]
impl AssetSource for MemorySource {
    async fn fetch(&self, url: &str, mode: FetchMode) -> Result<Bytes, FetchError> {
        self.requests.write().push((url.to_string(), mode));

        if self.failing.read().contains(url) {
            return Err(FetchError::Transport {
                url: url.to_string(),
                reason: "simulated failure".to_string(),
            });
        }

        self.entries
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }

    fn source_name(&self) -> &'static str {
        "Memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_serves_and_records() {
        let source = MemorySource::new().with("a.obj", "v 0 0 0");
        let data = futures::executor::block_on(source.fetch("a.obj", FetchMode::Default));
        assert_eq!(data.unwrap(), Bytes::from_static(b"v 0 0 0"));

        let missing = futures::executor::block_on(source.fetch("b.obj", FetchMode::Reload));
        assert!(matches!(missing, Err(FetchError::NotFound(_))));
        assert_eq!(source.requests(), vec!["a.obj", "b.obj"]);
        assert_eq!(source.requests_with_mode()[1].1, FetchMode::Reload);
    }

    #[test]
    fn test_memory_source_failure() {
        let source = MemorySource::new().with("a.obj", "v 0 0 0");
        source.fail("a.obj");
        let result = futures::executor::block_on(source.fetch("a.obj", FetchMode::Default));
        assert!(matches!(result, Err(FetchError::Transport { .. })));
        assert_eq!(source.request_count("a.obj"), 1);
    }
}
