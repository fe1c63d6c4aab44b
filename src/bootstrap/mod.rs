//! Optional capability bootstrapping
//!
//! Decoders and the fallback viewer are optional. A host can supply them up
//! front as handles, or the [`AssetBootstrapper`] can fetch a module from a
//! list of candidate sources and turn it into a handle with a registered
//! [`CapabilityFactory`]. Once a capability is available it stays available.

use crate::error::{Result, ViewerError};
use crate::loader::{DecoderError, GeometryDecoder, TextureTranscoder};
use crate::source::{AssetSource, FetchMode};
use bytes::Bytes;
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// An optional piece of functionality the viewer can use when present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// KTX2 / Basis Universal texture transcoder
    Ktx2Transcoder,
    /// Draco geometry decoder
    DracoDecoder,
    /// Meshopt geometry decoder
    MeshoptDecoder,
    /// Self-contained embeddable viewer
    FallbackViewer,
    /// glTF/GLB parser
    GltfParser,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ktx2Transcoder => "KTX2 transcoder",
            Self::DracoDecoder => "Draco decoder",
            Self::MeshoptDecoder => "Meshopt decoder",
            Self::FallbackViewer => "fallback viewer",
            Self::GltfParser => "glTF parser",
        };
        f.write_str(name)
    }
}

/// A usable capability
#[derive(Clone)]
pub enum CapabilityHandle {
    TextureTranscoder(Arc<dyn TextureTranscoder>),
    GeometryDecoder(Arc<dyn GeometryDecoder>),
    /// Module fetched from `source` with no factory to interpret it
    Module { source: String, payload: Bytes },
    /// Compiled into the crate
    Builtin,
}

impl fmt::Debug for CapabilityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextureTranscoder(_) => f.write_str("TextureTranscoder"),
            Self::GeometryDecoder(decoder) => {
                write!(f, "GeometryDecoder({})", decoder.extension())
            }
            Self::Module { source, payload } => f
                .debug_struct("Module")
                .field("source", source)
                .field("len", &payload.len())
                .finish(),
            Self::Builtin => f.write_str("Builtin"),
        }
    }
}

/// Turns a fetched module into a capability handle
pub trait CapabilityFactory: Send + Sync {
    fn install(
        &self,
        capability: Capability,
        source: &str,
        payload: Bytes,
    ) -> std::result::Result<CapabilityHandle, DecoderError>;
}

impl<F> CapabilityFactory for F
where
    F: Fn(Capability, &str, Bytes) -> std::result::Result<CapabilityHandle, DecoderError>
        + Send
        + Sync,
{
    fn install(
        &self,
        capability: Capability,
        source: &str,
        payload: Bytes,
    ) -> std::result::Result<CapabilityHandle, DecoderError> {
        self(capability, source, payload)
    }
}

#[derive(Default)]
struct RegistryState {
    handles: HashMap<Capability, CapabilityHandle>,
    /// Sources already fetched and installed, with what they produced
    loaded_sources: HashMap<String, CapabilityHandle>,
    /// Sources that failed to fetch or install for a capability
    failed_sources: HashSet<(Capability, String)>,
}

/// Which capabilities are available to a viewer context
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("available", &self.available())
            .finish()
    }
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `capability` available
    ///
    /// Returns false when it already was; the existing handle is kept unless
    /// it was an uninterpreted module and the new handle is usable.
    pub fn supply(&self, capability: Capability, handle: CapabilityHandle) -> bool {
        let mut state = self.state.write();
        match state.handles.get(&capability) {
            None => {
                state.handles.insert(capability, handle);
                true
            }
            Some(CapabilityHandle::Module { .. })
                if !matches!(handle, CapabilityHandle::Module { .. }) =>
            {
                state.handles.insert(capability, handle);
                false
            }
            Some(_) => false,
        }
    }

    pub fn is_available(&self, capability: Capability) -> bool {
        self.state.read().handles.contains_key(&capability)
    }

    pub fn get(&self, capability: Capability) -> Option<CapabilityHandle> {
        self.state.read().handles.get(&capability).cloned()
    }

    /// The supplied texture transcoder, if any
    pub fn texture_transcoder(&self) -> Option<Arc<dyn TextureTranscoder>> {
        match self.get(Capability::Ktx2Transcoder)? {
            CapabilityHandle::TextureTranscoder(transcoder) => Some(transcoder),
            _ => None,
        }
    }

    /// The supplied geometry decoder for `capability`, if any
    pub fn geometry_decoder(&self, capability: Capability) -> Option<Arc<dyn GeometryDecoder>> {
        match self.get(capability)? {
            CapabilityHandle::GeometryDecoder(decoder) => Some(decoder),
            _ => None,
        }
    }

    /// All available capabilities
    pub fn available(&self) -> Vec<Capability> {
        self.state.read().handles.keys().copied().collect()
    }

    fn loaded_source(&self, source: &str) -> Option<CapabilityHandle> {
        self.state.read().loaded_sources.get(source).cloned()
    }

    /// Whether `source` already failed to provide `capability`
    pub fn source_failed(&self, capability: Capability, source: &str) -> bool {
        self.state
            .read()
            .failed_sources
            .contains(&(capability, source.to_string()))
    }

    fn mark_source_failed(&self, capability: Capability, source: &str) {
        self.state
            .write()
            .failed_sources
            .insert((capability, source.to_string()));
    }

    fn mark_source_loaded(&self, source: &str, handle: CapabilityHandle) {
        self.state
            .write()
            .loaded_sources
            .insert(source.to_string(), handle);
    }
}

/// Ensures optional capabilities are present, fetching them when needed
pub struct AssetBootstrapper<S: AssetSource> {
    source: Arc<S>,
    registry: CapabilityRegistry,
    factories: Arc<HashMap<Capability, Arc<dyn CapabilityFactory>>>,
    lock: Arc<futures::lock::Mutex<()>>,
}

impl<S: AssetSource> Clone for AssetBootstrapper<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            registry: self.registry.clone(),
            factories: self.factories.clone(),
            lock: self.lock.clone(),
        }
    }
}

impl<S: AssetSource> AssetBootstrapper<S> {
    pub fn new(
        source: Arc<S>,
        registry: CapabilityRegistry,
        factories: HashMap<Capability, Arc<dyn CapabilityFactory>>,
    ) -> Self {
        Self {
            source,
            registry,
            factories: Arc::new(factories),
            lock: Arc::new(futures::lock::Mutex::new(())),
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Make `capability` available, trying `sources` strictly in order
    ///
    /// Already available capabilities and already loaded sources are
    /// satisfied without a fetch. Sources after the first success are never
    /// requested, and a source that failed once is not requested again for
    /// the same capability. Calls are serialized so two callers never fetch
    /// the same capability twice.
    pub async fn ensure_capability(
        &self,
        capability: Capability,
        sources: &[String],
    ) -> Result<CapabilityHandle> {
        if let Some(handle) = self.registry.get(capability) {
            return Ok(handle);
        }

        let _guard = self.lock.lock().await;
        if let Some(handle) = self.registry.get(capability) {
            return Ok(handle);
        }

        if let Some((url, handle)) = sources
            .iter()
            .find_map(|url| self.registry.loaded_source(url).map(|h| (url, h)))
        {
            debug!("{capability} already loaded from {url}");
            self.registry.supply(capability, handle.clone());
            return Ok(handle);
        }

        let mut attempted = Vec::new();
        let mut reason = String::from("no candidate sources");

        for url in sources {
            attempted.push(url.clone());
            if self.registry.source_failed(capability, url) {
                debug!("Skipping {url}, it already failed to provide {capability}");
                reason = format!("{url} failed earlier");
                continue;
            }
            debug!("Loading {capability} from {url}");

            let payload = match self.source.fetch(url, FetchMode::Default).await {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Failed to load {capability} from {url}: {e}");
                    self.registry.mark_source_failed(capability, url);
                    reason = e.to_string();
                    continue;
                }
            };

            match self.install(capability, url, payload) {
                Ok(handle) => {
                    self.registry.mark_source_loaded(url, handle.clone());
                    self.registry.supply(capability, handle);
                    info!("{capability} loaded from {url}");
                    return self.registry.get(capability).ok_or_else(|| {
                        ViewerError::CapabilityUnavailable {
                            capability,
                            attempted: attempted.clone(),
                            reason: "registration lost".to_string(),
                        }
                    });
                }
                Err(e) => {
                    warn!("Failed to install {capability} from {url}: {e}");
                    self.registry.mark_source_failed(capability, url);
                    reason = e.to_string();
                }
            }
        }

        Err(ViewerError::CapabilityUnavailable {
            capability,
            attempted,
            reason,
        })
    }

    /// Install the fallback viewer, sourcing a meshopt decoder first
    ///
    /// The meshopt step is best-effort. Returns whether the viewer is
    /// available afterwards.
    pub async fn ensure_fallback_viewer(
        &self,
        meshopt_sources: &[String],
        viewer_sources: &[String],
    ) -> bool {
        if let Err(e) = self
            .ensure_capability(Capability::MeshoptDecoder, meshopt_sources)
            .await
        {
            warn!("Continuing without meshopt decoder: {e}");
        }

        match self
            .ensure_capability(Capability::FallbackViewer, viewer_sources)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!("Fallback viewer unavailable: {e}");
                false
            }
        }
    }

    fn install(
        &self,
        capability: Capability,
        url: &str,
        payload: Bytes,
    ) -> std::result::Result<CapabilityHandle, DecoderError> {
        match self.factories.get(&capability) {
            Some(factory) => factory.install(capability, url, payload),
            None => Ok(CapabilityHandle::Module {
                source: url.to_string(),
                payload,
            }),
        }
    }
}
