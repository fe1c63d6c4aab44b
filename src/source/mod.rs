//! Asset source abstraction
//!
//! Everything the viewer pulls over the network (model files, companion
//! materials, textures, decoder modules) goes through an [`AssetSource`],
//! so hosts can back it with HTTP, the local filesystem, or memory.

#[cfg(feature = "runtime-tokio")]
pub mod file;
#[cfg(feature = "http")]
pub mod http;
pub mod mock;

use bytes::Bytes;
use thiserror::Error;

/// Error type for fetch operations
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Transport failure for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cache behavior requested for a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Use whatever caching the transport provides
    #[default]
    Default,
    /// Bypass transport caches and refresh them with the response
    Reload,
}

/// Async byte source
///
/// Implementations do not verify content integrity; any successful response
/// is returned as-is.
#[async_trait::async_trait]
pub trait AssetSource: Send + Sync + 'static {
    /// Fetch the bytes behind `url`
    async fn fetch(&self, url: &str, mode: FetchMode) -> Result<Bytes, FetchError>;

    /// Name of this source (for debugging)
    fn source_name(&self) -> &'static str;
}

/// Directory part of `path`, including the trailing separator
pub fn resource_base(path: &str) -> &str {
    let path = strip_query(path);
    match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "",
    }
}

/// Resolve `reference` relative to the directory of `path`
///
/// Only the file name of `reference` is kept, so material and texture
/// references written with authoring-machine paths still resolve next to
/// the model.
pub fn resolve_sibling(path: &str, reference: &str) -> String {
    let reference = strip_query(reference);
    let file_name = reference
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(reference);
    format!("{}{}", resource_base(path), file_name)
}

/// Resolve a relative `uri` against the directory of `path`
pub fn resolve_relative(path: &str, uri: &str) -> String {
    if uri.contains("://") || uri.starts_with('/') {
        uri.to_string()
    } else {
        format!("{}{}", resource_base(path), uri)
    }
}

/// `path` without query string or fragment
pub fn strip_query(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}

pub use mock::MemorySource;

#[cfg(feature = "runtime-tokio")]
pub use file::FileSource;

#[cfg(feature = "http")]
pub use http::HttpSource;
