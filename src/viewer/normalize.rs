//! Fit a freshly loaded model to the viewer

use crate::config::NormalizeConfig;
use crate::model::LoadedModel;
use glam::{Mat4, Vec3};
use log::{debug, warn};

/// Centering and uniform scale applied to a displayed model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    /// Bounding-box center in model space
    pub center: Vec3,
    pub scale: f32,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            scale: 1.0,
        }
    }
}

impl Normalization {
    /// Maps the bounding-box center to the origin, then scales about it
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale(Vec3::splat(self.scale)) * Mat4::from_translation(-self.center)
    }
}

/// Prepare `model` for display and compute its normalization
///
/// Materials become double-sided (when configured) and textures use the
/// renderer's maximum anisotropy. The largest bounding-box dimension maps
/// to the target size; degenerate models keep their scale.
pub fn normalize(
    model: &mut LoadedModel,
    config: &NormalizeConfig,
    max_anisotropy: u8,
) -> Normalization {
    if config.double_sided {
        for material in &mut model.materials {
            material.double_sided = true;
        }
    }
    for texture in &mut model.textures {
        texture.anisotropy = max_anisotropy.max(1);
    }

    let Some(bounds) = model.bounds() else {
        debug!("Model has no geometry, skipping normalization");
        return Normalization::default();
    };

    let max_dimension = bounds.max_dimension();
    let scale = if max_dimension > f32::EPSILON {
        config.target_size / max_dimension
    } else {
        warn!("Degenerate model bounds, keeping original scale");
        1.0
    };

    Normalization {
        center: bounds.center(),
        scale,
    }
}
