//! Mock render backend for testing
//!
//! Records everything presented to containers and a summary of every drawn
//! frame, without requiring a real engine or page.

use super::{
    BackendError, BackendResult, ContainerContent, Frame, RenderBackend, RendererCapabilities,
    SurfaceId, SurfaceSize,
};
use crate::model::Aabb;
use crate::texture::CompressedFormat;
use glam::{Mat4, Vec3};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counter for generating unique surface IDs
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> SurfaceId {
    SurfaceId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Summary of one drawn frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub surface: SurfaceId,
    pub world: Mat4,
    pub camera_position: Vec3,
    /// World-space bounds of the drawn model
    pub bounds: Option<Aabb>,
    pub light_count: usize,
    pub background: [f32; 4],
    /// Every material renders both faces
    pub all_double_sided: bool,
    /// Smallest anisotropy level across the model's textures
    pub min_texture_anisotropy: Option<u8>,
}

#[derive(Debug, Default)]
struct MockState {
    containers: HashMap<String, SurfaceSize>,
    presented: HashMap<String, Vec<ContainerContent>>,
    surfaces: HashMap<SurfaceId, String>,
    released: Vec<SurfaceId>,
    frames: Vec<FrameRecord>,
}

/// Mock backend for testing
///
/// Containers must be registered with [`MockBackend::with_container`];
/// looking up any other container fails with `ContainerNotFound`.
#[derive(Clone, Debug)]
pub struct MockBackend {
    available: bool,
    capabilities: RendererCapabilities,
    state: Arc<Mutex<MockState>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a mock backend with a loaded engine and no containers
    pub fn new() -> Self {
        Self {
            available: true,
            capabilities: RendererCapabilities {
                max_anisotropy: 16,
                compressed_formats: vec![CompressedFormat::Bc7],
            },
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Mock backend whose engine was never loaded
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Register a container of the given pixel size
    pub fn with_container(self, id: &str, width: u32, height: u32) -> Self {
        self.state
            .lock()
            .containers
            .insert(id.to_string(), SurfaceSize::new(width, height));
        self
    }

    /// Override the renderer capabilities
    pub fn with_capabilities(mut self, capabilities: RendererCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Everything presented to `container`, oldest first
    pub fn presented(&self, container: &str) -> Vec<ContainerContent> {
        self.state
            .lock()
            .presented
            .get(container)
            .cloned()
            .unwrap_or_default()
    }

    /// What `container` currently shows
    pub fn current(&self, container: &str) -> Option<ContainerContent> {
        self.state
            .lock()
            .presented
            .get(container)
            .and_then(|history| history.last().cloned())
    }

    /// Number of surfaces created so far
    pub fn surface_count(&self) -> usize {
        self.state.lock().surfaces.len()
    }

    /// Surfaces released so far
    pub fn released(&self) -> Vec<SurfaceId> {
        self.state.lock().released.clone()
    }

    /// All drawn frames, oldest first
    pub fn frames(&self) -> Vec<FrameRecord> {
        self.state.lock().frames.clone()
    }

    /// Most recent frame drawn into `surface`
    pub fn last_frame(&self, surface: SurfaceId) -> Option<FrameRecord> {
        self.state
            .lock()
            .frames
            .iter()
            .rev()
            .find(|f| f.surface == surface)
            .cloned()
    }

    fn check_engine(&self) -> BackendResult<()> {
        if self.available {
            Ok(())
        } else {
            Err(BackendError::EngineUnavailable("mock engine disabled".into()))
        }
    }
}

impl RenderBackend for MockBackend {
    fn is_available(&self) -> bool {
        self.available
    }

    fn capabilities(&self) -> RendererCapabilities {
        self.capabilities.clone()
    }

    fn container_size(&self, container: &str) -> BackendResult<SurfaceSize> {
        self.state
            .lock()
            .containers
            .get(container)
            .copied()
            .ok_or_else(|| BackendError::ContainerNotFound(container.to_string()))
    }

    fn create_surface(
        &self,
        container: &str,
        size: SurfaceSize,
        _antialias: bool,
    ) -> BackendResult<SurfaceId> {
        self.check_engine()?;
        if size.width == 0 || size.height == 0 {
            return Err(BackendError::SurfaceCreationFailed(format!(
                "Invalid surface dimensions {}x{}",
                size.width, size.height
            )));
        }

        let mut state = self.state.lock();
        if !state.containers.contains_key(container) {
            return Err(BackendError::ContainerNotFound(container.to_string()));
        }
        let id = next_id();
        state.surfaces.insert(id, container.to_string());
        Ok(id)
    }

    fn present(&self, container: &str, content: ContainerContent) -> BackendResult<()> {
        let mut state = self.state.lock();
        if !state.containers.contains_key(container) {
            return Err(BackendError::ContainerNotFound(container.to_string()));
        }
        state
            .presented
            .entry(container.to_string())
            .or_default()
            .push(content);
        Ok(())
    }

    fn draw(&self, surface: SurfaceId, frame: &Frame<'_>) -> BackendResult<()> {
        self.check_engine()?;
        let mut state = self.state.lock();
        if !state.surfaces.contains_key(&surface) || state.released.contains(&surface) {
            return Err(BackendError::DrawFailed(format!("Unknown surface {:?}", surface)));
        }

        let record = FrameRecord {
            surface,
            world: frame.world,
            camera_position: frame.camera.position,
            bounds: frame.model.transformed_bounds(frame.world),
            light_count: frame.lights.len(),
            background: frame.background,
            all_double_sided: frame.model.materials.iter().all(|m| m.double_sided),
            min_texture_anisotropy: frame.model.textures.iter().map(|t| t.anisotropy).min(),
        };
        state.frames.push(record);
        Ok(())
    }

    fn release_surface(&self, surface: SurfaceId) {
        self.state.lock().released.push(surface);
    }

    fn backend_name(&self) -> &'static str {
        "Mock"
    }
}
