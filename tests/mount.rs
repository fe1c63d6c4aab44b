//! Integration tests for mounting models into containers

mod common;

use common::*;
use exhibit_viewer::{
    Capability, ContainerContent, ErrorKind, InputEvent, MemorySource, MockBackend, MockSpawner,
    RendererCapabilities, ViewerConfig, ViewerContext, ViewerState,
};
use glam::{Vec2, Vec3};

const BOX: &str = "models/box.obj";

#[tokio::test]
async fn test_second_mount_is_cache_hit_without_fetch() {
    let source = MemorySource::new().with(BOX, OFFSET_BOX_OBJ);
    let ctx = context(source.clone());

    let first = ctx.mount("viewer", BOX).await.unwrap();
    assert_eq!(first.state(), ViewerState::Interactive);
    assert!(ctx.cache().contains(BOX));
    assert_eq!(ctx.cache().len(), 1);

    source.clear_requests();
    let shown_before = ctx.backend().presented("viewer").len();
    let second = ctx.mount("viewer", BOX).await.unwrap();

    assert_eq!(second.state(), ViewerState::Interactive);
    assert!(source.requests().is_empty());

    // Straight to the canvas, no placeholder
    let shown = ctx.backend().presented("viewer");
    assert_eq!(shown.len(), shown_before + 1);
    assert!(matches!(shown.last(), Some(ContainerContent::Canvas { .. })));
    assert_eq!(ctx.cache().metrics().decode_count(BOX), 1);
}

#[tokio::test]
async fn test_sessions_get_independent_copies() {
    let source = MemorySource::new().with(BOX, OFFSET_BOX_OBJ);
    let ctx = context(source);

    let left = ctx.mount("left", BOX).await.unwrap();
    let right = ctx.mount("right", BOX).await.unwrap();

    left.handle_input(&InputEvent::PointerDown { x: 0.0, y: 0.0 });
    left.handle_input(&InputEvent::PointerMove { x: 100.0, y: 0.0 });

    assert!((left.rotation().y - 1.0).abs() < 1e-6);
    assert_eq!(right.rotation(), Vec2::ZERO);
    assert_ne!(left.world_bounds(), right.world_bounds());

    // The cached original stays un-normalized
    let entry = ctx.cache().get(BOX).unwrap();
    let original = entry.root().bounds().unwrap();
    assert!((original.center() - Vec3::new(20.0, 4.0, 1.0)).length() < 1e-5);
    assert!(entry.root().materials.iter().all(|m| !m.double_sided));
    assert_eq!(entry.provenance().container.as_deref(), Some("left"));
}

#[tokio::test]
async fn test_normalized_to_target_size_at_origin() {
    let source = MemorySource::new().with(BOX, OFFSET_BOX_OBJ);
    let ctx = context(source);

    let handle = ctx.mount("viewer", BOX).await.unwrap();

    let bounds = handle.world_bounds().unwrap();
    assert!((bounds.max_dimension() - 5.0).abs() < 1e-4);
    assert!(bounds.center().length() < 1e-4);

    let frame = ctx.backend().last_frame(handle.surface().unwrap()).unwrap();
    let drawn = frame.bounds.unwrap();
    assert!((drawn.max_dimension() - 5.0).abs() < 1e-4);
    assert!(drawn.center().length() < 1e-4);
    assert!(frame.all_double_sided);
    assert_eq!(frame.camera_position, Vec3::new(0.0, 0.0, 2.0));
    assert_eq!(frame.light_count, 3);
    assert_eq!(frame.background, ctx.config().render.background);
}

#[tokio::test]
async fn test_textures_use_max_anisotropy() {
    let source = MemorySource::new()
        .with(BOX, OFFSET_BOX_OBJ)
        .with("models/box.mtl", PAINT_MTL)
        .with("models/paint.png", png());
    let backend = MockBackend::new()
        .with_capabilities(RendererCapabilities {
            max_anisotropy: 8,
            compressed_formats: Vec::new(),
        })
        .with_container("viewer", 640, 480);
    let ctx = ViewerContext::builder(backend, source, MockSpawner::new()).build();

    let handle = ctx.mount("viewer", BOX).await.unwrap();

    let frame = ctx.backend().last_frame(handle.surface().unwrap()).unwrap();
    assert_eq!(frame.min_texture_anisotropy, Some(8));
    assert_eq!(
        handle.with_model(|m| m.materials[0].base_color_texture),
        Some(Some(0))
    );
}

#[tokio::test]
async fn test_camera_distance_stays_clamped() {
    let source = MemorySource::new().with(BOX, OFFSET_BOX_OBJ);
    let ctx = context(source);
    let handle = ctx.mount("viewer", BOX).await.unwrap();
    let surface = handle.surface().unwrap();

    handle.handle_input(&InputEvent::Focus(true));
    let events = [
        InputEvent::Wheel { delta_y: 3.0 },
        InputEvent::Wheel { delta_y: -1.0 },
        InputEvent::KeyDown('x'),
        InputEvent::KeyDown('Z'),
        InputEvent::TouchStart {
            touches: vec![Vec2::new(0.0, 0.0), Vec2::new(50.0, 0.0)],
        },
        InputEvent::TouchMove {
            touches: vec![Vec2::new(0.0, 0.0), Vec2::new(5.0, 0.0)],
        },
        InputEvent::TouchMove {
            touches: vec![Vec2::new(0.0, 0.0), Vec2::new(500.0, 0.0)],
        },
        InputEvent::TouchEnd { touches: vec![] },
    ];

    for i in 0..300 {
        handle.handle_input(&events[(i * 5 + i / 7) % events.len()]);
        let distance = handle.camera_distance();
        assert!((0.5..=15.0).contains(&distance), "step {i}: {distance}");

        assert!(handle.render_frame().unwrap());
        let frame = ctx.backend().last_frame(surface).unwrap();
        assert_eq!(frame.camera_position.z, distance);
    }
}

#[tokio::test]
async fn test_format_dispatch() {
    let source = MemorySource::new()
        .with(BOX, OFFSET_BOX_OBJ)
        .with("models/tri.glb", triangle_glb());
    let ctx = context(source.clone());

    let err = ctx.mount("viewer", "images/photo.png").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    assert!(source.requests().is_empty());
    assert_eq!(
        ctx.backend().current("viewer"),
        Some(ContainerContent::Error(err.user_message().to_string()))
    );
    assert!(ctx.session("viewer").is_none());

    ctx.mount("viewer", BOX).await.unwrap();
    assert_eq!(
        source.requests(),
        vec![BOX.to_string(), "models/box.mtl".to_string()]
    );

    source.clear_requests();
    let glb = ctx.mount("viewer", "models/tri.glb").await.unwrap();
    assert_eq!(glb.state(), ViewerState::Interactive);
    let requests = source.requests();
    assert_eq!(source.request_count("models/tri.glb"), 1);
    assert!(requests.iter().all(|url| !url.ends_with(".mtl") && !url.ends_with(".obj")));
    assert!((glb.world_bounds().unwrap().max_dimension() - 5.0).abs() < 1e-4);
}

#[tokio::test]
async fn test_missing_mtl_still_interactive() {
    let source = MemorySource::new().with(BOX, OFFSET_BOX_OBJ);
    let ctx = context(source.clone());

    let handle = ctx.mount("viewer", BOX).await.unwrap();

    assert_eq!(handle.state(), ViewerState::Interactive);
    assert_eq!(source.request_count("models/box.mtl"), 1);
    let names = handle
        .with_model(|m| m.materials.iter().map(|m| m.name.clone()).collect::<Vec<_>>())
        .unwrap();
    assert_eq!(names, vec![Some("default".to_string())]);
}

#[tokio::test]
async fn test_engine_unavailable() {
    let source = MemorySource::new().with(BOX, OFFSET_BOX_OBJ);
    let backend = MockBackend::unavailable().with_container("viewer", 100, 100);
    let ctx = ViewerContext::builder(backend, source.clone(), MockSpawner::new()).build();

    let err = ctx.mount("viewer", BOX).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::EngineUnavailable);
    assert!(source.requests().is_empty());
    assert_eq!(
        ctx.backend().current("viewer"),
        Some(ContainerContent::Error(err.user_message().to_string()))
    );
}

#[tokio::test]
async fn test_missing_model_file_fails_with_message() {
    let ctx = context(MemorySource::new());

    let err = ctx.mount("viewer", "models/gone.obj").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Fetch);
    let session = ctx.session("viewer").unwrap();
    assert_eq!(session.state(), ViewerState::Failed(ErrorKind::Fetch));
    assert_eq!(
        ctx.backend().current("viewer"),
        Some(ContainerContent::Error(err.user_message().to_string()))
    );
    assert!(ctx.cache().is_empty());
}

#[tokio::test]
async fn test_empty_obj_fails_and_is_not_cached() {
    let source = MemorySource::new().with("models/empty.obj", "# nothing here\n");
    let ctx = context(source);

    let err = ctx.mount("viewer", "models/empty.obj").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ParseFailure);
    let session = ctx.session("viewer").unwrap();
    assert_eq!(session.state(), ViewerState::Failed(ErrorKind::ParseFailure));
    assert!(session.surface().is_none());
    assert!(!ctx.cache().contains("models/empty.obj"));
    assert!(matches!(
        ctx.backend().current("viewer"),
        Some(ContainerContent::Error(_))
    ));
}

#[tokio::test]
async fn test_gltf_without_parser_embeds_external_viewer() {
    let source = MemorySource::new().with("models/book.glb", triangle_glb());
    let ctx = ViewerContext::builder(backend(), source.clone(), MockSpawner::new())
        .gltf_parser(false)
        .build();
    let decoders = ctx.config().decoders.clone();
    source.insert(decoders.fallback_viewer_sources[0].clone(), "viewer module");

    let handle = ctx.mount("viewer", "models/book.glb").await.unwrap();

    assert_eq!(handle.state(), ViewerState::Embedded);
    match ctx.backend().current("viewer") {
        Some(ContainerContent::Embed(embed)) => {
            assert_eq!(embed.src, "models/book.glb");
            assert_eq!(embed.attribute("exposure"), Some("1"));
        }
        other => panic!("expected embed, got {other:?}"),
    }
    // Meshopt is tried first and its failure does not block the viewer
    assert_eq!(
        source.requests(),
        vec![
            decoders.meshopt_sources[0].clone(),
            decoders.fallback_viewer_sources[0].clone()
        ]
    );
    assert!(ctx.registry().is_available(Capability::FallbackViewer));
    assert!(!handle.handle_input(&InputEvent::Wheel { delta_y: 1.0 }));
    assert!(ctx.cache().is_empty());
}

#[tokio::test]
async fn test_gltf_without_parser_or_fallback_fails() {
    let ctx = ViewerContext::builder(backend(), MemorySource::new(), MockSpawner::new())
        .gltf_parser(false)
        .build();

    let err = ctx.mount("viewer", "models/book.glb").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CapabilityUnavailable);
    assert_eq!(
        ctx.session("viewer").unwrap().state(),
        ViewerState::Failed(ErrorKind::CapabilityUnavailable)
    );
    assert_eq!(
        ctx.backend().current("viewer"),
        Some(ContainerContent::Error(err.user_message().to_string()))
    );
}

#[tokio::test]
async fn test_disposed_session_stops_painting() {
    let source = MemorySource::new().with(BOX, OFFSET_BOX_OBJ);
    let ctx = context(source);
    let handle = ctx.mount("viewer", BOX).await.unwrap();
    let surface = handle.surface().unwrap();
    let frames = ctx.backend().frames().len();

    ctx.dispose("viewer");

    assert_eq!(handle.state(), ViewerState::Disposed);
    assert!(!handle.render_frame().unwrap());
    assert!(!handle.handle_input(&InputEvent::Wheel { delta_y: 1.0 }));
    assert_eq!(ctx.backend().frames().len(), frames);
    assert_eq!(ctx.backend().released(), vec![surface]);
    assert!(ctx.session("viewer").is_none());
}

#[tokio::test]
async fn test_dispose_while_loading_never_paints() {
    let inner = MemorySource::new().with(BOX, OFFSET_BOX_OBJ);
    let source = GatedSource::new(inner, BOX);
    let ctx = ViewerContext::builder(backend(), source.clone(), MockSpawner::new()).build();

    let mount = ctx.mount("viewer", BOX);
    let interrupt = async {
        while ctx.backend().presented("viewer").is_empty() {
            tokio::task::yield_now().await;
        }
        ctx.dispose("viewer");
        source.open();
    };
    let (result, ()) = tokio::join!(mount, interrupt);

    let handle = result.unwrap();
    assert_eq!(handle.state(), ViewerState::Disposed);
    assert!(matches!(
        ctx.backend().presented("viewer").as_slice(),
        [ContainerContent::Placeholder { .. }]
    ));
    assert_eq!(ctx.backend().surface_count(), 0);
    assert!(ctx.cache().contains(BOX));
}

#[tokio::test]
async fn test_concurrent_mounts_share_one_load() {
    let inner = MemorySource::new().with(BOX, OFFSET_BOX_OBJ);
    let source = GatedSource::new(inner.clone(), BOX);
    let ctx = ViewerContext::builder(backend(), source.clone(), MockSpawner::new()).build();

    let left = ctx.mount("left", BOX);
    let right = ctx.mount("right", BOX);
    let release = async {
        while ctx.backend().presented("left").is_empty()
            || ctx.backend().presented("right").is_empty()
        {
            tokio::task::yield_now().await;
        }
        source.open();
    };
    let (left, right, ()) = tokio::join!(left, right, release);

    assert_eq!(left.unwrap().state(), ViewerState::Interactive);
    assert_eq!(right.unwrap().state(), ViewerState::Interactive);
    assert_eq!(inner.request_count(BOX), 1);
    assert_eq!(ctx.cache().metrics().decode_count(BOX), 1);
    assert_eq!(ctx.cache().metrics().joined_loads(), 1);
}

#[tokio::test]
async fn test_concurrent_mounts_without_joining_decode_twice() {
    let inner = MemorySource::new().with(BOX, OFFSET_BOX_OBJ);
    let source = GatedSource::new(inner.clone(), BOX);
    let config = ViewerConfig {
        dedupe_inflight_loads: false,
        ..Default::default()
    };
    let ctx = ViewerContext::builder(backend(), source.clone(), MockSpawner::new())
        .config(config)
        .build();

    let left = ctx.mount("left", BOX);
    let right = ctx.mount("right", BOX);
    let release = async {
        while ctx.backend().presented("left").is_empty()
            || ctx.backend().presented("right").is_empty()
        {
            tokio::task::yield_now().await;
        }
        source.open();
    };
    let (left, right, ()) = tokio::join!(left, right, release);

    assert!(left.is_ok() && right.is_ok());
    assert_eq!(inner.request_count(BOX), 2);
    assert_eq!(ctx.cache().metrics().decode_count(BOX), 2);
    assert_eq!(ctx.cache().len(), 1);
}

#[tokio::test]
async fn test_render_loop_runs_until_disposed() {
    let source = MemorySource::new().with(BOX, OFFSET_BOX_OBJ);
    let config = ViewerConfig {
        render: exhibit_viewer::RenderConfig {
            frame_interval_ms: 1,
            ..Default::default()
        },
        ..Default::default()
    };
    let ctx = ViewerContext::builder(backend(), source, exhibit_viewer::TokioSpawner::new())
        .config(config)
        .build();

    let handle = ctx.mount("viewer", BOX).await.unwrap();
    while handle.frames_drawn() < 3 {
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    handle.dispose();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let drawn = ctx.backend().frames().len();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    assert_eq!(ctx.backend().frames().len(), drawn);
}
