//! Preload every 3D model referenced by a slide deck
//!
//! Usage: cargo run --example preload_slides -- <asset-root> <slides.json>

use exhibit_viewer::media::slides_from_json;
use exhibit_viewer::{
    model_sources, FileSource, MockBackend, PreloadCoordinator, PreloadOutcome, TokioSpawner,
    ViewerContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let root = args.next().unwrap_or_else(|| "assets".to_string());
    let deck = args.next().unwrap_or_else(|| "assets/slides.json".to_string());

    let slides = slides_from_json(&std::fs::read_to_string(&deck)?)?;
    let paths = model_sources(&slides);
    println!("{} slides, {} models", slides.len(), paths.len());

    let ctx = ViewerContext::builder(MockBackend::new(), FileSource::new(&root), TokioSpawner::new())
        .build();
    let preloader = PreloadCoordinator::new(ctx.clone()).with_concurrency(2);

    let report = preloader.preload_all(paths).await;
    for (path, outcome) in &report.outcomes {
        match outcome {
            PreloadOutcome::Failed(reason) => println!("  {path}: failed ({reason})"),
            other => println!("  {path}: {other:?}"),
        }
    }
    println!("{} models cached", ctx.cache().len());
    Ok(())
}
