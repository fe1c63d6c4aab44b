//! Tokio async runtime implementation

use super::{AsyncSpawner, BoxFuture, JoinHandle};
use futures::FutureExt;
use std::future::Future;
use std::time::Duration;

/// Tokio-based async spawner
///
/// Spawns tasks on the ambient Tokio runtime.
#[derive(Clone, Debug, Default, Copy)]
pub struct TokioSpawner;

impl TokioSpawner {
    /// Create a new Tokio spawner
    pub fn new() -> Self {
        Self
    }
}

impl AsyncSpawner for TokioSpawner {
    fn spawn<F>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        JoinHandle::new(tokio::spawn(task))
    }

    fn delay(&self, duration: Duration) -> BoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed()
    }

    fn runtime_name(&self) -> &'static str {
        "Tokio"
    }

    fn block_on<F, T>(&self, future: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            Some(tokio::task::block_in_place(|| handle.block_on(future)))
        } else {
            let rt = tokio::runtime::Runtime::new().ok()?;
            Some(rt.block_on(future))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_tokio_spawner() {
        let spawner = TokioSpawner::new();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();

        let handle = spawner.spawn(async move {
            ran_clone.store(true, Ordering::SeqCst);
        });

        let inner = handle.downcast::<tokio::task::JoinHandle<()>>();
        assert!(inner.is_some());
        if let Some(inner) = inner {
            inner.await.unwrap();
        }
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_tokio_delay() {
        let spawner = TokioSpawner::new();
        let start = std::time::Instant::now();
        spawner.delay(Duration::from_millis(5)).await;
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_tokio_runtime_name() {
        assert_eq!(TokioSpawner::new().runtime_name(), "Tokio");
    }
}
