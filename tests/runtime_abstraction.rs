//! Integration tests for async runtime abstraction

mod common;

use common::*;
use exhibit_viewer::{AsyncSpawner, MemorySource, MockSpawner, ViewerContext, ViewerState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[test]
fn test_mock_spawner_integration() {
    let spawner = MockSpawner::blocking();

    let executed = Arc::new(AtomicBool::new(false));
    let executed_clone = Arc::clone(&executed);

    spawner.spawn(async move {
        executed_clone.store(true, Ordering::SeqCst);
    });

    // In blocking mode, should execute immediately
    assert!(executed.load(Ordering::SeqCst));
}

#[test]
fn test_spawner_trait_bound() {
    fn spawn_task<S: AsyncSpawner>(spawner: &S) {
        spawner.spawn(async {});
    }

    let spawner = MockSpawner::new();
    spawn_task(&spawner);
    assert_eq!(spawner.spawned_count(), 1);
}

#[test]
fn test_mount_without_async_runtime() {
    let source = MemorySource::new().with("models/box.obj", OFFSET_BOX_OBJ);
    let ctx = ViewerContext::builder(backend(), source, MockSpawner::new()).build();

    let handle = futures::executor::block_on(ctx.mount("viewer", "models/box.obj")).unwrap();

    assert_eq!(handle.state(), ViewerState::Interactive);
    assert_eq!(handle.frames_drawn(), 1);
    // Render loop handed to the spawner, which drops it
    assert_eq!(ctx.spawner().spawned_count(), 1);
}

#[cfg(feature = "runtime-tokio")]
#[tokio::test]
async fn test_tokio_spawner_drives_render_loop() {
    use exhibit_viewer::TokioSpawner;
    use std::time::Duration;

    let source = MemorySource::new().with("models/box.obj", OFFSET_BOX_OBJ);
    let ctx = ViewerContext::builder(backend(), source, TokioSpawner::new()).build();

    let handle = ctx.mount("viewer", "models/box.obj").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(handle.frames_drawn() > 1);
    assert_eq!(ctx.spawner().runtime_name(), "Tokio");
    handle.dispose();
}
