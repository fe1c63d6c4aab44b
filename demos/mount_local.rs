//! Mount a model from a local directory and orbit it
//!
//! Usage: cargo run --example mount_local -- <asset-root> <model-path>

use exhibit_viewer::{FileSource, InputEvent, MockBackend, TokioSpawner, ViewerContext, ViewerState};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let root = args.next().unwrap_or_else(|| "assets".to_string());
    let path = args.next().unwrap_or_else(|| "models/book.glb".to_string());

    let backend = MockBackend::new().with_container("viewer", 1280, 720);
    let ctx = ViewerContext::builder(backend, FileSource::new(&root), TokioSpawner::new()).build();

    println!("exhibit_viewer v{}", exhibit_viewer::VERSION);
    let handle = ctx.mount("viewer", &path).await?;
    println!("Mounted {path} into viewer: {:?}", handle.state());

    if handle.state() == ViewerState::Interactive {
        handle.handle_input(&InputEvent::PointerDown { x: 400.0, y: 300.0 });
        handle.handle_input(&InputEvent::PointerMove { x: 460.0, y: 320.0 });
        handle.handle_input(&InputEvent::PointerUp);
        handle.handle_input(&InputEvent::Wheel { delta_y: -3.0 });

        tokio::time::sleep(Duration::from_millis(250)).await;
        println!(
            "Rotation {:?}, distance {:.2}, {} frames drawn",
            handle.rotation(),
            handle.camera_distance(),
            handle.frames_drawn()
        );
        if let Some(bounds) = handle.world_bounds() {
            println!("World bounds {:?} .. {:?}", bounds.min, bounds.max);
        }
    }

    // Remounting is a cache hit
    let again = ctx.mount("viewer", &path).await?;
    println!(
        "Remounted: {:?}, cache hits {}",
        again.state(),
        ctx.cache().metrics().cache_hits()
    );

    ctx.dispose("viewer");
    Ok(())
}
