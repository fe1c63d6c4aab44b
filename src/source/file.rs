//! Filesystem asset source
//!
//! Resolves URLs as paths under a root directory using Tokio's async fs.

use super::{strip_query, AssetSource, FetchError, FetchMode};
use bytes::Bytes;
use std::path::PathBuf;

/// Asset source reading from a local directory
#[derive(Clone, Debug)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    /// Create a source rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let relative = strip_query(url).trim_start_matches('/');
        self.root.join(relative)
    }
}

#[async_trait::async_trait]
impl AssetSource for FileSource {
    async fn fetch(&self, url: &str, _mode: FetchMode) -> Result<Bytes, FetchError> {
        let path = self.resolve(url);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(FetchError::NotFound(url.to_string()))
            }
            Err(err) => Err(FetchError::Io(err)),
        }
    }

    fn source_name(&self) -> &'static str {
        "File"
    }
}
