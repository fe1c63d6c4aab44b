//! Perspective camera

use crate::config::CameraConfig;
use glam::{Mat4, Vec3};

/// Perspective camera looking down -Z from a point on the +Z axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default(), 1.0)
    }
}

impl PerspectiveCamera {
    /// Camera at the configured starting distance
    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            fov_y_degrees: config.fov_y_degrees,
            aspect,
            near: config.near,
            far: config.far,
            position: Vec3::new(0.0, 0.0, config.initial_distance),
        }
    }

    /// Distance from the origin along +Z
    pub fn distance(&self) -> f32 {
        self.position.z
    }

    pub fn set_distance(&mut self, distance: f32) {
        self.position.z = distance;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_translation(-self.position)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        )
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}
