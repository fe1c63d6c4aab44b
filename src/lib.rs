//! exhibit_viewer - Model loading, caching and interactive viewing for kiosk exhibits
//!
//! # Features
//! - OBJ+MTL and glTF/GLB pipelines with optional decoder attachment
//! - Capability bootstrapping with ordered source fallback
//! - Process-lifetime model cache with in-flight load joining
//! - Scoped viewer sessions with orbit controls and normalization
//! - Off-screen preloading of exhibit models
//! - Render backend, asset source and runtime abstractions
//!
//! # Quick Start
//!
//! ```ignore
//! use exhibit_viewer::{FileSource, MockBackend, TokioSpawner, ViewerContext};
//!
//! let backend = MockBackend::new().with_container("viewer", 800, 600);
//! let ctx = ViewerContext::builder(backend, FileSource::new("assets"), TokioSpawner::new()).build();
//! let handle = ctx.mount("viewer", "models/book.glb").await?;
//! ```
//!
//! # Feature Flags
//!
//! - `runtime-tokio`: Enable the Tokio spawner and `FileSource` (default)
//! - `http`: Enable `HttpSource`

// Core modules
pub mod backend;
pub mod bootstrap;
pub mod cache;
pub mod loader;
pub mod preload;
pub mod runtime;
pub mod source;
pub mod viewer;

// Support modules
pub mod config;
pub mod media;
pub mod model;
pub mod texture;

// Error types
mod error;
pub use error::{ErrorKind, Result, ViewerError};

// Re-export backend types
pub use backend::{
    BackendError, BackendResult, ContainerContent, EmbedRequest, Frame, Light, LightKind,
    MockBackend, RenderBackend, RendererCapabilities, SurfaceId, SurfaceSize,
};

// Re-export bootstrap types
pub use bootstrap::{
    AssetBootstrapper, Capability, CapabilityFactory, CapabilityHandle, CapabilityRegistry,
};

// Re-export cache types
pub use cache::{CacheMetrics, CacheMetricsHandle, LoadProvenance, ModelCache, ModelCacheEntry};

// Re-export configuration types
pub use config::{
    CameraConfig, ControlsConfig, DecoderSources, NormalizeConfig, PreloadConfig, PreloadPolicy,
    RenderConfig, ViewerConfig,
};

// Re-export loader types
pub use loader::{
    DecoderError, GeometryDecoder, GltfLoader, LoaderFactory, ModelFormat, ModelParser,
    ObjLoader, TextureTranscoder,
};

// Re-export media types
pub use media::{model_sources, MediaItem, MediaKind, Slide};

// Re-export model types
pub use model::{Aabb, AlphaMode, LoadedModel, Material, Mesh, Node, PrimitiveType, Transform, Vertex};

// Re-export preload types
pub use preload::{PreloadCoordinator, PreloadOutcome, PreloadReport};

// Re-export runtime types
pub use runtime::mock::MockSpawner;
#[cfg(feature = "runtime-tokio")]
pub use runtime::tokio_impl::TokioSpawner;
pub use runtime::{AsyncSpawner, JoinHandle};

// Re-export source types
#[cfg(feature = "runtime-tokio")]
pub use source::file::FileSource;
#[cfg(feature = "http")]
pub use source::http::HttpSource;
pub use source::{AssetSource, FetchError, FetchMode, MemorySource};

// Re-export texture types
pub use texture::{Texture, TextureError, TextureFormat, TextureLoader};

// Re-export viewer types
pub use viewer::{
    InputEvent, OrbitControls, PerspectiveCamera, ViewerContext, ViewerContextBuilder,
    ViewerHandle, ViewerState,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
