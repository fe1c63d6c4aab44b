//! Async runtime abstraction
//!
//! The viewer never names a runtime directly: render loops are spawned and
//! paced through an [`AsyncSpawner`], so the same code runs under Tokio, a
//! host-provided executor, or the synchronous mock used in tests.

pub mod mock;
#[cfg(feature = "runtime-tokio")]
pub mod tokio_impl;

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

pub use futures::future::BoxFuture;

/// Handle to a spawned async task
///
/// This is a type-erased handle that allows checking task completion.
#[derive(Debug)]
pub struct JoinHandle {
    inner: Box<dyn std::any::Any + Send>,
}

impl JoinHandle {
    /// Create a new join handle
    pub fn new<T: Send + 'static>(handle: T) -> Self {
        Self {
            inner: Box::new(handle),
        }
    }

    /// Try to downcast to a specific handle type
    pub fn downcast<T: 'static>(self) -> Option<T> {
        self.inner.downcast::<T>().ok().map(|b| *b)
    }
}

/// Async task spawner trait
///
/// # Example
/// ```ignore
/// let spawner = TokioSpawner::new();
/// spawner.spawn(async move {
///     while handle.render_frame().unwrap_or(false) {
///         spawner.delay(Duration::from_millis(16)).await;
///     }
/// });
/// ```
pub trait AsyncSpawner: Send + Sync + Clone + Debug + 'static {
    /// Spawn a detached background task
    fn spawn<F>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = ()> + Send + 'static;

    /// Future resolving after `duration`; paces the render loop
    fn delay(&self, duration: Duration) -> BoxFuture<'static, ()>;

    /// Get the name of this runtime (for debugging)
    fn runtime_name(&self) -> &'static str;

    /// Block on a future (if supported by the runtime)
    ///
    /// Returns None if blocking is not supported.
    fn block_on<F, T>(&self, _future: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        None
    }
}

pub use mock::MockSpawner;

#[cfg(feature = "runtime-tokio")]
pub use tokio_impl::TokioSpawner;
