//! Off-screen preloading of exhibit models
//!
//! Warms the model cache (or just the transport) for a batch of paths ahead
//! of user navigation. Nothing is attached to a visible container and a
//! failing path never aborts the batch.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use log::{debug, error, info};
use parking_lot::Mutex;

use crate::backend::RenderBackend;
use crate::config::PreloadPolicy;
use crate::error::ErrorKind;
use crate::runtime::AsyncSpawner;
use crate::source::{AssetSource, FetchMode};
use crate::viewer::ViewerContext;

/// What happened to one preloaded path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreloadOutcome {
    /// Decoded and stored in the model cache
    Decoded,
    /// Already cached before this pass
    AlreadyCached,
    /// Bytes fetched without decoding
    Prefetched,
    Failed(String),
}

/// Per-path results of a preload pass, in queue order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreloadReport {
    pub outcomes: Vec<(String, PreloadOutcome)>,
}

impl PreloadReport {
    pub fn outcome(&self, path: &str) -> Option<&PreloadOutcome> {
        self.outcomes
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, outcome)| outcome)
    }

    /// Paths that failed
    pub fn failures(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, PreloadOutcome::Failed(_)))
            .map(|(path, _)| path.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Queues model paths and warms them in the background
pub struct PreloadCoordinator<B: RenderBackend, S: AssetSource, R: AsyncSpawner> {
    context: ViewerContext<B, S, R>,
    policy: PreloadPolicy,
    concurrency: usize,
    /// Paths waiting for the next pass
    queue: Arc<Mutex<VecDeque<String>>>,
    /// Paths currently being warmed
    loading: Arc<Mutex<HashSet<String>>>,
    enabled: AtomicBool,
}

impl<B: RenderBackend, S: AssetSource, R: AsyncSpawner> PreloadCoordinator<B, S, R> {
    /// Coordinator using the context's preload settings
    pub fn new(context: ViewerContext<B, S, R>) -> Self {
        let preload = context.config().preload.clone();
        Self {
            context,
            policy: preload.policy,
            concurrency: preload.concurrency.max(1),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            loading: Arc::new(Mutex::new(HashSet::new())),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn with_policy(mut self, policy: PreloadPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Maximum number of paths warmed at the same time (at least 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn policy(&self) -> PreloadPolicy {
        self.policy
    }

    /// Enable or disable preloading
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Check if a path is currently being warmed
    pub fn is_loading(&self, path: &str) -> bool {
        self.loading.lock().contains(path)
    }

    /// Queue paths for the next pass, skipping ones already queued or loading
    ///
    /// Returns how many were added.
    pub fn enqueue<I, P>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let mut queue = self.queue.lock();
        let mut added = 0;
        for path in paths {
            let path = path.into();
            if !self.is_loading(&path) && !queue.iter().any(|p| p == &path) {
                queue.push_back(path);
                added += 1;
            }
        }
        added
    }

    /// Number of queued paths
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Clear the preload queue
    pub fn clear_queue(&self) {
        self.queue.lock().clear();
    }

    /// Queue `paths` and warm everything queued
    ///
    /// Resolves once every path has been attempted.
    pub async fn preload_all<I, P>(&self, paths: I) -> PreloadReport
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.enqueue(paths);
        self.run().await
    }

    /// Warm everything queued
    ///
    /// A disabled coordinator leaves the queue untouched.
    pub async fn run(&self) -> PreloadReport {
        if !self.is_enabled() {
            debug!("Preloading disabled, {} paths left queued", self.pending());
            return PreloadReport::default();
        }

        let batch: Vec<String> = self.queue.lock().drain(..).collect();
        if batch.is_empty() {
            return PreloadReport::default();
        }
        info!(
            "Preloading {} models ({:?}, concurrency {})",
            batch.len(),
            self.policy,
            self.concurrency
        );

        let outcomes: Vec<(String, PreloadOutcome)> = stream::iter(batch)
            .map(|path| async move {
                let outcome = self.preload_one(&path).await;
                (path, outcome)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let report = PreloadReport { outcomes };
        info!(
            "Preload finished: {} paths, {} failed",
            report.len(),
            report.failures().len()
        );
        report
    }

    /// Warm a single path according to the policy
    pub async fn preload_one(&self, path: &str) -> PreloadOutcome {
        self.loading.lock().insert(path.to_string());
        let outcome = match self.policy {
            PreloadPolicy::Decode => self.decode(path).await,
            PreloadPolicy::FetchOnly => self.prefetch(path).await,
        };
        self.loading.lock().remove(path);
        outcome
    }

    async fn decode(&self, path: &str) -> PreloadOutcome {
        if self.context.cache().contains(path) {
            debug!("Preload skipped, already cached: {path}");
            return PreloadOutcome::AlreadyCached;
        }

        match self.context.load_model(path).await {
            Ok(_) => {
                debug!("Preloaded {path}");
                PreloadOutcome::Decoded
            }
            Err(e) if e.kind() == ErrorKind::CapabilityUnavailable => {
                debug!("No parser for {path}, warming transport only");
                self.prefetch(path).await
            }
            Err(e) => {
                error!("Failed to preload {path}: {e}");
                PreloadOutcome::Failed(e.to_string())
            }
        }
    }

    async fn prefetch(&self, path: &str) -> PreloadOutcome {
        match self.context.source().fetch(path, FetchMode::Reload).await {
            Ok(bytes) => {
                debug!("Prefetched {path} ({} bytes)", bytes.len());
                PreloadOutcome::Prefetched
            }
            Err(e) => {
                error!("Failed to prefetch {path}: {e}");
                PreloadOutcome::Failed(e.to_string())
            }
        }
    }
}
