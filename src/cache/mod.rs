//! Model cache
//!
//! Maps a model's source path (verbatim, query string included) to its
//! decoded root. Entries are created once, never mutated and never evicted.
//! Consumers get deep copies, so the cached original is never attached to a
//! scene. Concurrent misses for one path can join a single pending load.

pub mod metrics;

use crate::backend::SurfaceSize;
use crate::error::{Result, ViewerError};
use crate::model::LoadedModel;
use crate::viewer::camera::PerspectiveCamera;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

pub use metrics::{CacheMetrics, CacheMetricsHandle};

/// Scene setup in effect when a model was first decoded
///
/// Kept with the entry for inspection only; every mount builds its own.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadProvenance {
    pub camera: PerspectiveCamera,
    /// Container the load was made for; `None` for off-screen preloads
    pub container: Option<String>,
    pub surface_size: Option<SurfaceSize>,
    pub backend: &'static str,
}

/// A decoded model and the setup it was loaded under
#[derive(Debug)]
pub struct ModelCacheEntry {
    path: String,
    root: LoadedModel,
    provenance: LoadProvenance,
    loaded_at: Instant,
}

impl ModelCacheEntry {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The cached original; never hand this to a scene
    pub fn root(&self) -> &LoadedModel {
        &self.root
    }

    /// Independent deep copy of the root
    pub fn instantiate(&self) -> LoadedModel {
        self.root.clone()
    }

    pub fn provenance(&self) -> &LoadProvenance {
        &self.provenance
    }

    pub fn loaded_at(&self) -> Instant {
        self.loaded_at
    }
}

type SharedLoad = Shared<BoxFuture<'static, std::result::Result<Arc<ModelCacheEntry>, Arc<ViewerError>>>>;

/// Process-lifetime model cache
///
/// Cloning yields another handle to the same cache.
#[derive(Clone, Default)]
pub struct ModelCache {
    entries: Arc<RwLock<HashMap<String, Arc<ModelCacheEntry>>>>,
    in_flight: Arc<Mutex<HashMap<String, SharedLoad>>>,
    metrics: CacheMetricsHandle,
}

impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("entries", &self.len())
            .field("in_flight", &self.in_flight.lock().len())
            .finish()
    }
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `path`, recording a hit or miss
    pub fn get(&self, path: &str) -> Option<Arc<ModelCacheEntry>> {
        let entry = self.entries.read().get(path).cloned();
        match &entry {
            Some(_) => {
                self.metrics.record_cache_hit();
                debug!("Model cache hit: {path}");
            }
            None => self.metrics.record_cache_miss(),
        }
        entry
    }

    /// Whether `path` is cached, without touching the metrics
    pub fn contains(&self, path: &str) -> bool {
        self.entries.read().contains_key(path)
    }

    /// Store the decoded root for `path`
    ///
    /// The first entry for a path wins; later puts return it unchanged.
    pub fn put(
        &self,
        path: &str,
        root: LoadedModel,
        provenance: LoadProvenance,
    ) -> Arc<ModelCacheEntry> {
        let mut entries = self.entries.write();
        entries
            .entry(path.to_string())
            .or_insert_with(|| {
                info!("Cached model {path}");
                Arc::new(ModelCacheEntry {
                    path: path.to_string(),
                    root,
                    provenance,
                    loaded_at: Instant::now(),
                })
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Cached paths in no particular order
    pub fn paths(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Whether a load for `path` is pending
    pub fn is_loading(&self, path: &str) -> bool {
        self.in_flight.lock().contains_key(path)
    }

    pub fn metrics(&self) -> &CacheMetricsHandle {
        &self.metrics
    }

    /// Run `load` for `path` and cache its result
    ///
    /// With `join_in_flight`, a call for a path whose load is still pending
    /// awaits that load instead of starting another; otherwise every call
    /// decodes on its own and the first finished result is kept.
    pub async fn load_or_join<F, Fut>(
        &self,
        path: &str,
        join_in_flight: bool,
        load: F,
    ) -> Result<Arc<ModelCacheEntry>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(LoadedModel, LoadProvenance)>> + Send + 'static,
    {
        if let Some(entry) = self.entries.read().get(path).cloned() {
            return Ok(entry);
        }

        if !join_in_flight {
            let start = Instant::now();
            let (model, provenance) = load().await?;
            return Ok(self.finish(path, start, model, provenance));
        }

        let shared = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(path) {
                Some(pending) => {
                    debug!("Joining in-flight load of {path}");
                    self.metrics.record_joined_load();
                    pending.clone()
                }
                None => {
                    let cache = self.clone();
                    let key = path.to_string();
                    let pending = load();
                    let task = async move {
                        let start = Instant::now();
                        let result = pending.await;
                        let outcome = match result {
                            Ok((model, provenance)) => {
                                Ok(cache.finish(&key, start, model, provenance))
                            }
                            Err(e) => Err(Arc::new(e)),
                        };
                        cache.in_flight.lock().remove(&key);
                        outcome
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(path.to_string(), task.clone());
                    task
                }
            }
        };

        shared.await.map_err(ViewerError::from)
    }

    fn finish(
        &self,
        path: &str,
        start: Instant,
        model: LoadedModel,
        provenance: LoadProvenance,
    ) -> Arc<ModelCacheEntry> {
        let elapsed = start.elapsed();
        self.metrics
            .record_decode(path, elapsed, model.estimated_size());
        debug!("Decoded {path} in {elapsed:?}");
        self.put(path, model, provenance)
    }
}
