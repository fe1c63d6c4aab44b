//! Error types for exhibit_viewer

use std::sync::Arc;
use thiserror::Error;

use crate::bootstrap::Capability;

/// Main error type for viewer operations
#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("3D engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("{capability} unavailable after trying {attempted:?}: {reason}")]
    CapabilityUnavailable {
        capability: Capability,
        attempted: Vec<String>,
        reason: String,
    },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crate::source::FetchError),

    #[error("Backend error: {0}")]
    Backend(#[from] crate::backend::BackendError),

    #[error("Decoder error: {0}")]
    Decoder(#[from] crate::loader::DecoderError),

    #[error("Texture error: {0}")]
    Texture(#[from] crate::texture::TextureError),

    #[error("GLTF error: {0}")]
    Gltf(#[from] gltf::Error),

    #[error("OBJ error: {0}")]
    Obj(#[from] tobj::LoadError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure of a load this caller joined while it was in flight
    #[error("{0}")]
    Joined(Arc<ViewerError>),
}

/// Coarse classification used for state reporting and user messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    EngineUnavailable,
    CapabilityUnavailable,
    ParseFailure,
    UnsupportedFormat,
    Fetch,
    Container,
}

impl ViewerError {
    /// Shorthand for a parse failure of `path`
    pub fn parse(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EngineUnavailable(_) => ErrorKind::EngineUnavailable,
            Self::CapabilityUnavailable { .. } => ErrorKind::CapabilityUnavailable,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::ContainerNotFound(_) => ErrorKind::Container,
            Self::Fetch(_) | Self::Io(_) => ErrorKind::Fetch,
            Self::Backend(err) if err.is_engine_unavailable() => ErrorKind::EngineUnavailable,
            Self::Backend(_) => ErrorKind::Container,
            Self::Parse { .. }
            | Self::Decoder(_)
            | Self::Texture(_)
            | Self::Gltf(_)
            | Self::Obj(_)
            | Self::Json(_) => ErrorKind::ParseFailure,
            Self::Joined(inner) => inner.kind(),
        }
    }

    /// Static message painted into the container when a mount fails
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::EngineUnavailable => {
                "3D engine not loaded. Please include the 3D engine library."
            }
            ErrorKind::CapabilityUnavailable => {
                "GLTF loader unavailable. Ensure a GLTF parser or the fallback viewer is available."
            }
            ErrorKind::UnsupportedFormat => {
                "Unsupported file format. Please use .obj, .glb, or .gltf files."
            }
            ErrorKind::ParseFailure => {
                "Failed to load 3D model. Check KTX2/Draco decoders and paths."
            }
            ErrorKind::Fetch => "Error loading 3D model. Please check the file path.",
            ErrorKind::Container => "3D viewer could not be attached to its container.",
        }
    }
}

impl From<Arc<ViewerError>> for ViewerError {
    fn from(err: Arc<ViewerError>) -> Self {
        Self::Joined(err)
    }
}

/// Result type alias for viewer operations
pub type Result<T> = std::result::Result<T, ViewerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            ViewerError::UnsupportedFormat("x.png".into()).kind(),
            ErrorKind::UnsupportedFormat
        );
        assert_eq!(ViewerError::parse("a.obj", "bad").kind(), ErrorKind::ParseFailure);
    }

    #[test]
    fn test_joined_keeps_kind() {
        let inner = Arc::new(ViewerError::parse("a.glb", "truncated"));
        let joined = ViewerError::from(inner);
        assert_eq!(joined.kind(), ErrorKind::ParseFailure);
        assert!(joined.to_string().contains("truncated"));
    }
}
