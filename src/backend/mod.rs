//! Render backend abstraction
//!
//! The 3D engine and the host page are external collaborators. This module
//! describes what the viewer needs from them: container lookup, a drawing
//! surface sized to the container, static content (placeholder, error
//! message, embedded viewer) and per-frame drawing of a normalized model.

pub mod mock;

use crate::model::LoadedModel;
use crate::texture::CompressedFormat;
use crate::viewer::camera::PerspectiveCamera;
use glam::{Mat4, Vec3};
use std::fmt::Debug;
use thiserror::Error;

/// Error type for backend operations
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("3D engine not loaded: {0}")]
    EngineUnavailable(String),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Surface creation failed: {0}")]
    SurfaceCreationFailed(String),

    #[error("Draw failed: {0}")]
    DrawFailed(String),
}

impl BackendError {
    /// Whether this error means the engine itself is missing
    pub fn is_engine_unavailable(&self) -> bool {
        matches!(self, Self::EngineUnavailable(_))
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Pixel dimensions of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height; 1.0 for a collapsed container
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Handle to a drawing surface created by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Limits of the active renderer
#[derive(Debug, Clone, PartialEq)]
pub struct RendererCapabilities {
    /// Maximum anisotropic filtering level
    pub max_anisotropy: u8,
    /// Block-compressed texture formats the hardware samples directly
    pub compressed_formats: Vec<CompressedFormat>,
}

impl Default for RendererCapabilities {
    fn default() -> Self {
        Self {
            max_anisotropy: 1,
            compressed_formats: Vec::new(),
        }
    }
}

/// Request to hand a model URL to a self-contained external viewer
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedRequest {
    pub src: String,
    pub attributes: Vec<(String, String)>,
}

impl EmbedRequest {
    /// Embed with the exhibit's standard attributes
    pub fn for_model(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            attributes: vec![
                ("camera-controls".to_string(), String::new()),
                ("exposure".to_string(), "1".to_string()),
                ("interaction-prompt".to_string(), "none".to_string()),
            ],
        }
    }

    /// Value of `name`, if set
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// What a container shows; presenting replaces the previous content
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerContent {
    /// Progress indicator shown while a model loads
    Placeholder { title: String, detail: String },
    /// Static error message
    Error(String),
    /// Live drawing surface with an optional instruction line below it
    Canvas {
        surface: SurfaceId,
        hint: Option<String>,
    },
    /// External embeddable viewer
    Embed(EmbedRequest),
}

/// Kind of scene light
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Ambient,
    /// Directional light shining from `position` toward the origin
    Directional { position: Vec3 },
}

/// A light in the viewer's scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    /// Linear RGB
    pub color: [f32; 3],
    pub intensity: f32,
}

impl Light {
    pub fn ambient(hex: u32, intensity: f32) -> Self {
        Self {
            kind: LightKind::Ambient,
            color: hex_to_rgb(hex),
            intensity,
        }
    }

    pub fn directional(hex: u32, intensity: f32, position: Vec3) -> Self {
        Self {
            kind: LightKind::Directional { position },
            color: hex_to_rgb(hex),
            intensity,
        }
    }
}

/// Convert a 0xRRGGBB literal to normalized RGB
pub fn hex_to_rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

/// Everything needed to draw one frame
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub model: &'a LoadedModel,
    /// Model-to-world transform (normalization and user rotation)
    pub world: Mat4,
    pub camera: &'a PerspectiveCamera,
    pub lights: &'a [Light],
    /// Clear color (RGBA)
    pub background: [f32; 4],
}

/// Host 3D engine and page
///
/// # Example
/// ```ignore
/// let backend = MockBackend::new().with_container("viewer", 800, 600);
/// let size = backend.container_size("viewer")?;
/// let surface = backend.create_surface("viewer", size, true)?;
/// backend.present("viewer", ContainerContent::Canvas { surface, hint: None })?;
/// ```
pub trait RenderBackend: Send + Sync + Debug + 'static {
    /// Whether the engine is loaded at all
    fn is_available(&self) -> bool {
        true
    }

    /// Limits of the active renderer
    fn capabilities(&self) -> RendererCapabilities;

    /// Pixel size of the container named `container`
    fn container_size(&self, container: &str) -> BackendResult<SurfaceSize>;

    /// Create a drawing surface bound to `container`
    fn create_surface(
        &self,
        container: &str,
        size: SurfaceSize,
        antialias: bool,
    ) -> BackendResult<SurfaceId>;

    /// Replace what `container` shows
    fn present(&self, container: &str, content: ContainerContent) -> BackendResult<()>;

    /// Draw one frame into `surface`
    fn draw(&self, surface: SurfaceId, frame: &Frame<'_>) -> BackendResult<()>;

    /// Release a surface (optional cleanup)
    fn release_surface(&self, _surface: SurfaceId) {}

    /// Get the name of this backend (for debugging)
    fn backend_name(&self) -> &'static str;
}

pub use mock::MockBackend;
