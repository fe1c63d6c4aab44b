//! Mock async spawner for testing
//!
//! Drops spawned tasks by default so a mounted viewer's endless render loop
//! never runs; tests drive frames by hand instead.

use super::{AsyncSpawner, BoxFuture, JoinHandle};
use futures::FutureExt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Spawn behavior for MockSpawner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSpawnBehavior {
    /// Drop tasks immediately (don't execute)
    Drop,
    /// Block on tasks synchronously using a simple executor
    BlockSync,
}

/// Mock async spawner for testing
#[derive(Clone, Debug)]
pub struct MockSpawner {
    behavior: MockSpawnBehavior,
    spawned: Arc<AtomicUsize>,
}

impl Default for MockSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpawner {
    /// Create a new mock spawner that drops tasks
    pub fn new() -> Self {
        Self::with_behavior(MockSpawnBehavior::Drop)
    }

    /// Create a mock spawner with specific behavior
    pub fn with_behavior(behavior: MockSpawnBehavior) -> Self {
        Self {
            behavior,
            spawned: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a mock spawner that runs tasks synchronously
    ///
    /// Tasks that never finish (such as a render loop of a live session)
    /// block the caller forever.
    pub fn blocking() -> Self {
        Self::with_behavior(MockSpawnBehavior::BlockSync)
    }

    /// Number of tasks handed to this spawner (and its clones)
    pub fn spawned_count(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

impl AsyncSpawner for MockSpawner {
    fn spawn<F>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            MockSpawnBehavior::Drop => {
                drop(task);
                JoinHandle::new(())
            }
            MockSpawnBehavior::BlockSync => {
                futures::executor::block_on(task);
                JoinHandle::new(())
            }
        }
    }

    fn delay(&self, _duration: Duration) -> BoxFuture<'static, ()> {
        futures::future::ready(()).boxed()
    }

    fn runtime_name(&self) -> &'static str {
        "Mock"
    }

    fn block_on<F, T>(&self, future: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        match self.behavior {
            MockSpawnBehavior::Drop => None,
            MockSpawnBehavior::BlockSync => Some(futures::executor::block_on(future)),
        }
    }
}
