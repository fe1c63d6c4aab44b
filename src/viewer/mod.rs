//! Viewer context and mounting
//!
//! A [`ViewerContext`] is built once at application start and owns every
//! piece of shared state: the model cache, the capability registry, the
//! loader factory with its shared glTF loader, the render backend, the
//! asset source and the spawner driving render loops.
//!
//! [`ViewerContext::mount`] drives one container through
//! `Empty -> Loading -> Normalizing -> Interactive`, skipping straight to
//! `Interactive` on a cache hit.

pub mod camera;
pub mod controls;
pub mod normalize;
pub mod session;

pub use camera::PerspectiveCamera;
pub use controls::{InputEvent, OrbitControls};
pub use normalize::{normalize, Normalization};
pub use session::{scene_lights, ViewerHandle, ViewerState};

use crate::backend::{ContainerContent, EmbedRequest, RenderBackend, SurfaceSize};
use crate::bootstrap::{
    AssetBootstrapper, Capability, CapabilityFactory, CapabilityHandle, CapabilityRegistry,
};
use crate::cache::{LoadProvenance, ModelCache, ModelCacheEntry};
use crate::config::ViewerConfig;
use crate::error::{Result, ViewerError};
use crate::loader::{LoaderFactory, ModelFormat, ModelParser};
use crate::model::LoadedModel;
use crate::runtime::AsyncSpawner;
use crate::source::AssetSource;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use session::ViewerSession;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const LOADING_TITLE: &str = "Loading 3D Model...";
const LOADING_DETAIL: &str = "This may take a few moments";

struct ContextInner<B, S: AssetSource, R> {
    config: ViewerConfig,
    backend: Arc<B>,
    source: Arc<S>,
    spawner: R,
    cache: ModelCache,
    loaders: LoaderFactory<S>,
    sessions: Mutex<HashMap<String, ViewerHandle>>,
}

/// Owned context shared by every mount
///
/// Cloning yields another handle to the same context.
pub struct ViewerContext<B: RenderBackend, S: AssetSource, R: AsyncSpawner> {
    inner: Arc<ContextInner<B, S, R>>,
}

impl<B: RenderBackend, S: AssetSource, R: AsyncSpawner> Clone for ViewerContext<B, S, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<B: RenderBackend, S: AssetSource, R: AsyncSpawner> std::fmt::Debug
    for ViewerContext<B, S, R>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerContext")
            .field("backend", &self.inner.backend.backend_name())
            .field("source", &self.inner.source.source_name())
            .field("runtime", &self.inner.spawner.runtime_name())
            .field("cache", &self.inner.cache)
            .finish()
    }
}

/// Builder for [`ViewerContext`]
pub struct ViewerContextBuilder<B, S, R> {
    backend: B,
    source: S,
    spawner: R,
    config: ViewerConfig,
    registry: CapabilityRegistry,
    factories: HashMap<Capability, Arc<dyn CapabilityFactory>>,
    gltf_parser: bool,
}

impl<B: RenderBackend, S: AssetSource, R: AsyncSpawner> ViewerContextBuilder<B, S, R> {
    pub fn config(mut self, config: ViewerConfig) -> Self {
        self.config = config;
        self
    }

    /// Supply a capability up front; it counts as already loaded
    pub fn supply(self, capability: Capability, handle: CapabilityHandle) -> Self {
        self.registry.supply(capability, handle);
        self
    }

    /// Turn fetched payloads for `capability` into usable handles
    pub fn factory(
        mut self,
        capability: Capability,
        factory: Arc<dyn CapabilityFactory>,
    ) -> Self {
        self.factories.insert(capability, factory);
        self
    }

    /// Whether the built-in glTF parser is available (default: yes)
    pub fn gltf_parser(mut self, enabled: bool) -> Self {
        self.gltf_parser = enabled;
        self
    }

    pub fn build(self) -> ViewerContext<B, S, R> {
        if self.gltf_parser {
            self.registry
                .supply(Capability::GltfParser, CapabilityHandle::Builtin);
        }

        let source = Arc::new(self.source);
        let bootstrapper = AssetBootstrapper::new(source.clone(), self.registry, self.factories);
        let loaders = LoaderFactory::new(bootstrapper, self.config.decoders.clone());

        info!(
            "Viewer context ready (backend: {}, source: {}, runtime: {})",
            self.backend.backend_name(),
            source.source_name(),
            self.spawner.runtime_name()
        );

        ViewerContext {
            inner: Arc::new(ContextInner {
                config: self.config,
                backend: Arc::new(self.backend),
                source,
                spawner: self.spawner,
                cache: ModelCache::new(),
                loaders,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }
}

impl<B: RenderBackend, S: AssetSource, R: AsyncSpawner> ViewerContext<B, S, R> {
    /// Start building a context around the host's engine, source and runtime
    pub fn builder(backend: B, source: S, spawner: R) -> ViewerContextBuilder<B, S, R> {
        ViewerContextBuilder {
            backend,
            source,
            spawner,
            config: ViewerConfig::default(),
            registry: CapabilityRegistry::new(),
            factories: HashMap::new(),
            gltf_parser: true,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.inner.config
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    pub fn source(&self) -> &S {
        &self.inner.source
    }

    pub fn spawner(&self) -> &R {
        &self.inner.spawner
    }

    pub fn cache(&self) -> &ModelCache {
        &self.inner.cache
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        self.inner.loaders.bootstrapper().registry()
    }

    pub fn loader_factory(&self) -> &LoaderFactory<S> {
        &self.inner.loaders
    }

    /// Live session mounted in `container`, if any
    pub fn session(&self, container: &str) -> Option<ViewerHandle> {
        self.inner
            .sessions
            .lock()
            .get(container)
            .filter(|handle| !handle.is_disposed())
            .cloned()
    }

    /// Dispose the session mounted in `container`, if any
    pub fn dispose(&self, container: &str) {
        let previous = self.inner.sessions.lock().remove(container);
        if let Some(handle) = previous {
            handle.dispose();
        }
    }

    /// Mount the model at `path` into `container`
    ///
    /// Any session previously mounted there is disposed first. On failure
    /// the container shows a static error message and the error is
    /// returned. A glTF/GLB model with no parser available is handed to
    /// the embeddable viewer instead; the returned session is then
    /// [`ViewerState::Embedded`].
    pub async fn mount(&self, container: &str, path: &str) -> Result<ViewerHandle> {
        self.dispose(container);
        let backend = &self.inner.backend;

        if !backend.is_available() {
            let err = ViewerError::EngineUnavailable(format!(
                "{} backend reports no engine",
                backend.backend_name()
            ));
            self.report_early(container, path, &err);
            return Err(err);
        }

        let format = match ModelFormat::from_path(path) {
            Ok(format) => format,
            Err(err) => {
                self.report_early(container, path, &err);
                return Err(err);
            }
        };

        let size = backend.container_size(container)?;
        let size = SurfaceSize::new(size.width.max(1), size.height.max(1));

        let config = &self.inner.config;
        let backend_handle: Arc<dyn RenderBackend> = backend.clone();
        let handle = ViewerHandle::new(ViewerSession::new(
            container,
            path,
            backend_handle,
            OrbitControls::new(&config.controls, &config.camera),
            config.render.background,
        ));
        self.inner
            .sessions
            .lock()
            .insert(container.to_string(), handle.clone());

        match self.drive(&handle, format, size).await {
            Ok(()) => Ok(handle),
            Err(err) => {
                error!("Failed to mount {path} into {container}: {err}");
                let content = ContainerContent::Error(err.user_message().to_string());
                if let Err(e) = handle.paint(content, ViewerState::Failed(err.kind())) {
                    warn!("Could not show error in {container}: {e}");
                }
                Err(err)
            }
        }
    }

    /// Decoded cache entry for `path`, loading it off-screen on a miss
    ///
    /// Fails with `CapabilityUnavailable` for glTF/GLB when no parser is
    /// available.
    pub async fn load_model(&self, path: &str) -> Result<Arc<ModelCacheEntry>> {
        if let Some(entry) = self.inner.cache.get(path) {
            return Ok(entry);
        }

        let format = ModelFormat::from_path(path)?;
        let parser = self
            .inner
            .loaders
            .acquire_loader(format, &self.inner.backend.capabilities())
            .await
            .ok_or_else(|| ViewerError::CapabilityUnavailable {
                capability: Capability::GltfParser,
                attempted: Vec::new(),
                reason: "no glTF parser supplied".to_string(),
            })?;

        let provenance = LoadProvenance {
            camera: PerspectiveCamera::from_config(&self.inner.config.camera, 1.0),
            container: None,
            surface_size: None,
            backend: self.inner.backend.backend_name(),
        };
        self.load_with(parser, path, provenance).await
    }

    async fn drive(&self, handle: &ViewerHandle, format: ModelFormat, size: SurfaceSize) -> Result<()> {
        let path = handle.path();

        if let Some(entry) = self.inner.cache.get(path) {
            info!("Mounting cached model {path} into {}", handle.container());
            return self.go_interactive(handle, entry.instantiate(), size);
        }

        info!("Model not cached, loading {path}");
        let placeholder = ContainerContent::Placeholder {
            title: LOADING_TITLE.to_string(),
            detail: LOADING_DETAIL.to_string(),
        };
        if !handle.paint(placeholder, ViewerState::Loading)? {
            return Ok(());
        }

        let capabilities = self.inner.backend.capabilities();
        let Some(parser) = self.inner.loaders.acquire_loader(format, &capabilities).await else {
            return self.embed_fallback(handle).await;
        };
        if handle.is_disposed() {
            return Ok(());
        }

        let provenance = LoadProvenance {
            camera: PerspectiveCamera::from_config(&self.inner.config.camera, size.aspect()),
            container: Some(handle.container().to_string()),
            surface_size: Some(size),
            backend: self.inner.backend.backend_name(),
        };
        let entry = self.load_with(parser, path, provenance).await?;

        if !handle.transition(ViewerState::Normalizing) {
            debug!("Session for {path} disposed while loading");
            return Ok(());
        }
        self.go_interactive(handle, entry.instantiate(), size)
    }

    async fn load_with(
        &self,
        parser: ModelParser,
        path: &str,
        provenance: LoadProvenance,
    ) -> Result<Arc<ModelCacheEntry>> {
        debug!("Loading {path} with the {} pipeline", parser.name());
        let source = self.inner.source.clone();
        let key = path.to_string();

        self.inner
            .cache
            .load_or_join(path, self.inner.config.dedupe_inflight_loads, move || async move {
                let model = parser.load(&*source, &key).await?;
                Ok((model, provenance))
            })
            .await
    }

    fn go_interactive(
        &self,
        handle: &ViewerHandle,
        mut model: LoadedModel,
        size: SurfaceSize,
    ) -> Result<()> {
        let config = &self.inner.config;
        let backend = &self.inner.backend;

        let capabilities = backend.capabilities();
        let normalization = normalize(&mut model, &config.normalize, capabilities.max_anisotropy);
        let camera = PerspectiveCamera::from_config(&config.camera, size.aspect());

        let surface = backend.create_surface(handle.container(), size, config.render.antialias)?;
        let hint = Some(config.controls.hint.clone());
        match handle.attach(model, normalization, camera, surface, hint) {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(e) => {
                backend.release_surface(surface);
                return Err(e);
            }
        }

        handle.render_frame()?;
        self.spawn_render_loop(handle);
        info!(
            "Viewer interactive: {} in {} (scale {:.3})",
            handle.path(),
            handle.container(),
            normalization.scale
        );
        Ok(())
    }

    fn spawn_render_loop(&self, handle: &ViewerHandle) {
        let handle = handle.clone();
        let spawner = self.inner.spawner.clone();
        let interval = Duration::from_millis(self.inner.config.render.frame_interval_ms);

        self.inner.spawner.spawn(async move {
            loop {
                spawner.delay(interval).await;
                match handle.render_frame() {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        warn!("Render loop for {} stopped: {e}", handle.path());
                        break;
                    }
                }
            }
            debug!("Render loop for {} finished", handle.path());
        });
    }

    async fn embed_fallback(&self, handle: &ViewerHandle) -> Result<()> {
        let decoders = &self.inner.config.decoders;
        warn!(
            "No glTF parser available, trying embedded viewer for {}",
            handle.path()
        );

        let installed = self
            .inner
            .loaders
            .bootstrapper()
            .ensure_fallback_viewer(&decoders.meshopt_sources, &decoders.fallback_viewer_sources)
            .await;

        if !installed {
            return Err(ViewerError::CapabilityUnavailable {
                capability: Capability::GltfParser,
                attempted: decoders.fallback_viewer_sources.clone(),
                reason: "no glTF parser and the fallback viewer could not be installed"
                    .to_string(),
            });
        }

        let embed = ContainerContent::Embed(EmbedRequest::for_model(handle.path()));
        if handle.paint(embed, ViewerState::Embedded)? {
            info!("Embedded viewer showing {}", handle.path());
        }
        Ok(())
    }

    /// Show a failure detected before a session exists
    fn report_early(&self, container: &str, path: &str, err: &ViewerError) {
        error!("Cannot mount {path} into {container}: {err}");
        let content = ContainerContent::Error(err.user_message().to_string());
        if let Err(e) = self.inner.backend.present(container, content) {
            warn!("Could not show error in {container}: {e}");
        }
    }
}
