//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use exhibit_viewer::{
    AssetSource, FetchError, FetchMode, MemorySource, MockBackend, MockSpawner, ViewerContext,
};
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub type MockContext = ViewerContext<MockBackend, MemorySource, MockSpawner>;

/// OBJ box spanning (10, 2, -1)..(30, 6, 3) with a companion MTL reference
pub const OFFSET_BOX_OBJ: &str = "mtllib box.mtl\n\
    v 10 2 -1\nv 30 2 -1\nv 30 6 -1\nv 10 6 -1\n\
    v 10 2 3\nv 30 2 3\nv 30 6 3\nv 10 6 3\n\
    usemtl paint\n\
    f 1 2 3 4\nf 5 6 7 8\nf 1 2 6 5\nf 2 3 7 6\nf 3 4 8 7\nf 4 1 5 8\n";

pub const PAINT_MTL: &str = "newmtl paint\nKd 0.8 0.2 0.2\nmap_Kd paint.png\n";

/// Backend with containers "viewer", "left" and "right"
pub fn backend() -> MockBackend {
    MockBackend::new()
        .with_container("viewer", 800, 600)
        .with_container("left", 400, 300)
        .with_container("right", 400, 300)
}

pub fn context(source: MemorySource) -> MockContext {
    ViewerContext::builder(backend(), source, MockSpawner::new()).build()
}

/// 1x1 PNG
pub fn png() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(1, 1, image::Rgba([200, 50, 50, 255]));
    let mut data = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
        .unwrap();
    data
}

/// Triangle (0,0,0), (2,0,0), (0,1,0): glTF document and its binary buffer
pub fn triangle_parts() -> (Value, Vec<u8>) {
    let mut bin = Vec::new();
    for v in [[0.0f32, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        for c in v {
            bin.extend_from_slice(&c.to_le_bytes());
        }
    }
    for i in [0u16, 1, 2] {
        bin.extend_from_slice(&i.to_le_bytes());
    }
    bin.extend_from_slice(&[0, 0]);

    let document = json!({
        "asset": {"version": "2.0"},
        "scene": 0,
        "scenes": [{"nodes": [0]}],
        "nodes": [{"mesh": 0}],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]}],
        "accessors": [
            {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
             "min": [0.0, 0.0, 0.0], "max": [2.0, 1.0, 0.0]},
            {"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}
        ],
        "bufferViews": [
            {"buffer": 0, "byteOffset": 0, "byteLength": 36},
            {"buffer": 0, "byteOffset": 36, "byteLength": 6}
        ],
        "buffers": [{"byteLength": bin.len()}]
    });
    (document, bin)
}

/// The triangle as a GLB with an embedded binary chunk
pub fn triangle_glb() -> Vec<u8> {
    let (document, bin) = triangle_parts();
    glb(&document, &bin)
}

/// The triangle with a KTX2 base color texture at `paint.ktx2`
pub fn basisu_triangle_glb() -> Vec<u8> {
    let (mut document, bin) = triangle_parts();
    document["extensionsUsed"] = json!(["KHR_texture_basisu"]);
    document["extensionsRequired"] = json!(["KHR_texture_basisu"]);
    document["images"] = json!([{"uri": "paint.ktx2", "mimeType": "image/ktx2"}]);
    document["textures"] = json!([{"extensions": {"KHR_texture_basisu": {"source": 0}}}]);
    document["materials"] = json!([{"pbrMetallicRoughness": {"baseColorTexture": {"index": 0}}}]);
    document["meshes"][0]["primitives"][0]["material"] = json!(0);
    glb(&document, &bin)
}

pub fn glb(document: &Value, bin: &[u8]) -> Vec<u8> {
    let mut json = serde_json::to_vec(document).unwrap();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let total = 12 + 8 + json.len() + 8 + bin.len();

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(b"JSON");
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(b"BIN\0");
    out.extend_from_slice(&bin);
    out
}

/// Source that holds fetches of one URL until the gate opens
#[derive(Clone)]
pub struct GatedSource {
    pub inner: MemorySource,
    gate: Arc<Semaphore>,
    gated: String,
}

impl GatedSource {
    pub fn new(inner: MemorySource, gated: &str) -> Self {
        Self {
            inner,
            gate: Arc::new(Semaphore::new(0)),
            gated: gated.to_string(),
        }
    }

    pub fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

#[async_trait]
impl AssetSource for GatedSource {
    async fn fetch(&self, url: &str, mode: FetchMode) -> Result<Bytes, FetchError> {
        if url == self.gated {
            let _permit = self.gate.acquire().await.map_err(|e| FetchError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        }
        self.inner.fetch(url, mode).await
    }

    fn source_name(&self) -> &'static str {
        "Gated"
    }
}
