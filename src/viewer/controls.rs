//! Orbit-style camera controls
//!
//! Pure state machine over [`InputEvent`]s: drag rotates the model, wheel,
//! pinch and the zoom keys move the camera along its axis. The camera
//! distance always stays inside the configured range.

use crate::config::{CameraConfig, ControlsConfig};
use glam::Vec2;

/// Input delivered to a mounted viewer
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown { x: f32, y: f32 },
    PointerMove { x: f32, y: f32 },
    PointerUp,
    /// Wheel scroll; positive moves away from the model
    Wheel { delta_y: f32 },
    TouchStart { touches: Vec<Vec2> },
    TouchMove { touches: Vec<Vec2> },
    /// Touches still down after the end
    TouchEnd { touches: Vec<Vec2> },
    /// The container gained or lost input focus
    Focus(bool),
    KeyDown(char),
}

/// Rotation and zoom state driven by user input
#[derive(Debug, Clone)]
pub struct OrbitControls {
    config: ControlsConfig,
    min_distance: f32,
    max_distance: f32,
    /// Rotation about X (pitch) and Y (yaw) in radians
    rotation: Vec2,
    distance: f32,
    pointer_down: bool,
    last_pointer: Vec2,
    touch_count: usize,
    pinch_start_distance: f32,
    pinch_start_camera: f32,
    focused: bool,
}

impl OrbitControls {
    pub fn new(controls: &ControlsConfig, camera: &CameraConfig) -> Self {
        let mut this = Self {
            config: controls.clone(),
            min_distance: camera.min_distance,
            max_distance: camera.max_distance,
            rotation: Vec2::ZERO,
            distance: camera.initial_distance,
            pointer_down: false,
            last_pointer: Vec2::ZERO,
            touch_count: 0,
            pinch_start_distance: 0.0,
            pinch_start_camera: camera.initial_distance,
            focused: false,
        };
        this.set_distance(camera.initial_distance);
        this
    }

    /// Rotation about X and Y in radians
    pub fn rotation(&self) -> Vec2 {
        self.rotation
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Set the camera distance, clamped to the allowed range
    pub fn set_distance(&mut self, distance: f32) {
        if distance.is_finite() {
            self.distance = distance.clamp(self.min_distance, self.max_distance);
        }
    }

    /// Apply one event; returns whether rotation or distance changed
    pub fn handle(&mut self, event: &InputEvent) -> bool {
        let before = (self.rotation, self.distance);

        match event {
            InputEvent::PointerDown { x, y } => {
                self.pointer_down = true;
                self.last_pointer = Vec2::new(*x, *y);
            }
            InputEvent::PointerMove { x, y } => {
                if self.pointer_down {
                    self.drag_to(Vec2::new(*x, *y));
                }
            }
            InputEvent::PointerUp => self.pointer_down = false,
            InputEvent::Wheel { delta_y } => {
                if *delta_y != 0.0 {
                    let step = delta_y.signum() * self.config.wheel_zoom_speed * self.distance;
                    self.set_distance(self.distance + step);
                }
            }
            InputEvent::TouchStart { touches } => self.begin_touches(touches),
            InputEvent::TouchMove { touches } => match touches.as_slice() {
                [touch] if self.touch_count == 1 => self.drag_to(*touch),
                [a, b] if self.touch_count == 2 => {
                    let current = a.distance(*b);
                    if current > 0.0 && self.pinch_start_distance > 0.0 {
                        let scaled =
                            self.pinch_start_camera * (self.pinch_start_distance / current);
                        self.set_distance(scaled);
                    }
                }
                _ => {}
            },
            InputEvent::TouchEnd { touches } => self.begin_touches(touches),
            InputEvent::Focus(focused) => self.focused = *focused,
            InputEvent::KeyDown(key) => {
                if self.focused {
                    let key = key.to_ascii_lowercase();
                    if key == self.config.zoom_in_key.to_ascii_lowercase() {
                        self.set_distance(self.distance - self.config.key_zoom_step);
                    } else if key == self.config.zoom_out_key.to_ascii_lowercase() {
                        self.set_distance(self.distance + self.config.key_zoom_step);
                    }
                }
            }
        }

        (self.rotation, self.distance) != before
    }

    fn drag_to(&mut self, position: Vec2) {
        let delta = position - self.last_pointer;
        self.rotation.y += delta.x * self.config.rotate_speed;
        self.rotation.x += delta.y * self.config.rotate_speed;
        self.last_pointer = position;
    }

    fn begin_touches(&mut self, touches: &[Vec2]) {
        self.touch_count = touches.len();
        match touches {
            [touch] => {
                self.pointer_down = true;
                self.last_pointer = *touch;
            }
            [a, b] => {
                self.pointer_down = false;
                self.pinch_start_distance = a.distance(*b);
                self.pinch_start_camera = self.distance;
            }
            _ => self.pointer_down = false,
        }
    }
}
