//! Feature matrix tests - verify feature-gated types compile and work

use exhibit_viewer::{AssetSource, FetchMode, MemorySource, MockBackend, RenderBackend};

#[test]
fn test_default_types() {
    let backend = MockBackend::new();
    assert_eq!(backend.backend_name(), "Mock");
    assert_eq!(MemorySource::new().source_name(), "Memory");
}

#[cfg(feature = "runtime-tokio")]
#[tokio::test]
async fn test_file_source_available() {
    use exhibit_viewer::FileSource;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.obj"), b"v 0 0 0\n").unwrap();

    let source = FileSource::new(dir.path());
    assert_eq!(source.source_name(), "File");
    let data = source.fetch("a.obj", FetchMode::Default).await.unwrap();
    assert_eq!(data.len(), 8);
}

#[cfg(feature = "http")]
#[test]
fn test_http_source_available() {
    use exhibit_viewer::HttpSource;

    let source = HttpSource::new("https://exhibit.example").unwrap();
    assert_eq!(source.source_name(), "Http");
}

#[test]
fn test_config_from_partial_json() {
    use exhibit_viewer::{PreloadPolicy, ViewerConfig};

    let config = ViewerConfig::from_json(r#"{"preload": {"policy": "fetch-only"}}"#).unwrap();
    assert_eq!(config.preload.policy, PreloadPolicy::FetchOnly);
    assert!(config.dedupe_inflight_loads);
}
