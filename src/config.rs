//! Viewer configuration
//!
//! All values default to the literals the exhibit ships with. Hosts may
//! override any subset from JSON; missing fields keep their defaults.

use serde::{Deserialize, Serialize};

/// Top-level configuration for a [`ViewerContext`](crate::ViewerContext)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub normalize: NormalizeConfig,
    pub decoders: DecoderSources,
    pub preload: PreloadConfig,
    pub render: RenderConfig,
    /// Join concurrent cache misses for the same path onto one decode
    pub dedupe_inflight_loads: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            controls: ControlsConfig::default(),
            normalize: NormalizeConfig::default(),
            decoders: DecoderSources::default(),
            preload: PreloadConfig::default(),
            render: RenderConfig::default(),
            dedupe_inflight_loads: true,
        }
    }
}

impl ViewerConfig {
    /// Parse a configuration from JSON, filling unspecified fields with defaults
    pub fn from_json(data: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(data)?)
    }
}

/// Perspective camera parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Camera distance along +Z when a model becomes interactive
    pub initial_distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            initial_distance: 2.0,
            min_distance: 0.5,
            max_distance: 15.0,
        }
    }
}

/// Pointer, wheel, touch and keyboard tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// Radians of rotation per pixel of drag
    pub rotate_speed: f32,
    /// Fraction of the current distance moved per wheel notch
    pub wheel_zoom_speed: f32,
    /// Distance moved per zoom key press
    pub key_zoom_step: f32,
    pub zoom_in_key: char,
    pub zoom_out_key: char,
    /// Instruction text shown under the canvas
    pub hint: String,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            rotate_speed: 0.01,
            wheel_zoom_speed: 0.1,
            key_zoom_step: 0.5,
            zoom_in_key: 'z',
            zoom_out_key: 'x',
            hint: "Drag: Rotate | Pinch: Zoom | Mouse wheel: Zoom | Z/X: Zoom".to_string(),
        }
    }
}

/// Normalization applied to every displayed model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Size of the largest bounding-box dimension after scaling
    pub target_size: f32,
    pub double_sided: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            target_size: 5.0,
            double_sided: true,
        }
    }
}

/// Candidate sources and paths for optional decoders and the fallback viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderSources {
    /// Tried in order; the first usable one wins
    pub ktx2_sources: Vec<String>,
    pub ktx2_transcoder_path: String,
    pub draco_decoder_path: String,
    pub meshopt_sources: Vec<String>,
    pub fallback_viewer_sources: Vec<String>,
}

impl Default for DecoderSources {
    fn default() -> Self {
        Self {
            ktx2_sources: vec![
                "https://cdnjs.cloudflare.com/ajax/libs/three.js/r128/examples/js/loaders/KTX2Loader.js"
                    .to_string(),
                "https://cdn.jsdelivr.net/npm/three@0.128.0/examples/js/loaders/KTX2Loader.js"
                    .to_string(),
            ],
            ktx2_transcoder_path:
                "https://cdnjs.cloudflare.com/ajax/libs/three.js/r128/examples/js/libs/basis/"
                    .to_string(),
            draco_decoder_path:
                "https://cdnjs.cloudflare.com/ajax/libs/three.js/r128/examples/js/libs/draco/"
                    .to_string(),
            meshopt_sources: vec![
                "https://unpkg.com/meshoptimizer@0.18.1/meshopt_decoder.js".to_string(),
            ],
            fallback_viewer_sources: vec![
                "https://unpkg.com/@google/model-viewer@3.3.0/dist/model-viewer-umd.js"
                    .to_string(),
            ],
        }
    }
}

/// How the preload pass warms models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreloadPolicy {
    /// Fully decode and populate the model cache
    #[default]
    Decode,
    /// Only fetch the bytes to warm transport-level caching
    FetchOnly,
}

/// Preload pass settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadConfig {
    pub policy: PreloadPolicy,
    /// Maximum number of paths warmed at the same time
    pub concurrency: usize,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            policy: PreloadPolicy::Decode,
            concurrency: 1,
        }
    }
}

/// Scene and render loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Clear color (RGBA, linear 0..1)
    pub background: [f32; 4],
    /// Delay between frames of the continuous render loop
    pub frame_interval_ms: u64,
    pub antialias: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let c = 0xf0 as f32 / 255.0;
        Self {
            background: [c, c, c, 1.0],
            frame_interval_ms: 16,
            antialias: true,
        }
    }
}
