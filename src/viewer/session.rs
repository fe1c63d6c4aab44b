//! One mounted viewer
//!
//! A [`ViewerHandle`] is the scoped resource returned by a mount. While the
//! session is interactive it owns the displayed clone, the camera and the
//! orbit controls; disposing it ignores further input, halts the render
//! loop and releases the drawing surface.

use super::camera::PerspectiveCamera;
use super::controls::{InputEvent, OrbitControls};
use super::normalize::Normalization;
use crate::backend::{ContainerContent, Frame, Light, RenderBackend, SurfaceId};
use crate::error::{ErrorKind, Result};
use crate::model::{Aabb, LoadedModel};
use glam::{EulerRot, Mat4, Vec2, Vec3};
use log::debug;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Lifecycle of a mounted viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerState {
    Empty,
    /// Placeholder shown, model being fetched and parsed
    Loading,
    Normalizing,
    /// Canvas attached, render loop running
    Interactive,
    /// Model handed to the external embeddable viewer
    Embedded,
    Failed(ErrorKind),
    Disposed,
}

/// Scene lights every session uses
pub fn scene_lights() -> Vec<Light> {
    vec![
        Light::ambient(0x404040, 0.6),
        Light::directional(0xffffff, 0.8, Vec3::new(1.0, 1.0, 1.0)),
        Light::directional(0xffffff, 0.4, Vec3::new(-1.0, -1.0, -1.0)),
    ]
}

struct Display {
    model: LoadedModel,
    normalization: Normalization,
    camera: PerspectiveCamera,
    surface: SurfaceId,
}

struct SessionState {
    state: ViewerState,
    controls: OrbitControls,
    display: Option<Display>,
    frames: u64,
}

pub(crate) struct ViewerSession {
    id: Uuid,
    container: String,
    path: String,
    backend: Arc<dyn RenderBackend>,
    lights: Vec<Light>,
    background: [f32; 4],
    inner: Mutex<SessionState>,
}

impl ViewerSession {
    pub(crate) fn new(
        container: &str,
        path: &str,
        backend: Arc<dyn RenderBackend>,
        controls: OrbitControls,
        background: [f32; 4],
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            container: container.to_string(),
            path: path.to_string(),
            backend,
            lights: scene_lights(),
            background,
            inner: Mutex::new(SessionState {
                state: ViewerState::Empty,
                controls,
                display: None,
                frames: 0,
            }),
        }
    }
}

/// Handle to a mounted viewer
///
/// Clones refer to the same session.
#[derive(Clone)]
pub struct ViewerHandle {
    session: Arc<ViewerSession>,
}

impl std::fmt::Debug for ViewerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerHandle")
            .field("id", &self.session.id)
            .field("container", &self.session.container)
            .field("path", &self.session.path)
            .field("state", &self.state())
            .finish()
    }
}

impl ViewerHandle {
    pub(crate) fn new(session: ViewerSession) -> Self {
        Self {
            session: Arc::new(session),
        }
    }

    /// Unique identifier of this session
    pub fn id(&self) -> Uuid {
        self.session.id
    }

    pub fn container(&self) -> &str {
        &self.session.container
    }

    /// Model path this session was mounted with
    pub fn path(&self) -> &str {
        &self.session.path
    }

    pub fn state(&self) -> ViewerState {
        self.session.inner.lock().state
    }

    pub fn is_disposed(&self) -> bool {
        self.state() == ViewerState::Disposed
    }

    /// Drawing surface, once interactive
    pub fn surface(&self) -> Option<SurfaceId> {
        self.session
            .inner
            .lock()
            .display
            .as_ref()
            .map(|display| display.surface)
    }

    pub fn camera_distance(&self) -> f32 {
        self.session.inner.lock().controls.distance()
    }

    /// Model rotation about X and Y in radians
    pub fn rotation(&self) -> Vec2 {
        self.session.inner.lock().controls.rotation()
    }

    /// Frames drawn so far
    pub fn frames_drawn(&self) -> u64 {
        self.session.inner.lock().frames
    }

    /// Current model-to-world transform of the displayed model
    pub fn world_transform(&self) -> Option<Mat4> {
        let inner = self.session.inner.lock();
        inner
            .display
            .as_ref()
            .map(|display| world_matrix(&inner.controls, &display.normalization))
    }

    /// World-space bounds of the displayed model
    pub fn world_bounds(&self) -> Option<Aabb> {
        let inner = self.session.inner.lock();
        let display = inner.display.as_ref()?;
        display
            .model
            .transformed_bounds(world_matrix(&inner.controls, &display.normalization))
    }

    /// Run `f` against the displayed model
    pub fn with_model<T>(&self, f: impl FnOnce(&LoadedModel) -> T) -> Option<T> {
        self.session
            .inner
            .lock()
            .display
            .as_ref()
            .map(|display| f(&display.model))
    }

    /// Route an input event to the orbit controls
    ///
    /// Only an interactive session reacts. Returns whether the view changed.
    pub fn handle_input(&self, event: &InputEvent) -> bool {
        let mut inner = self.session.inner.lock();
        if inner.state != ViewerState::Interactive {
            return false;
        }
        inner.controls.handle(event)
    }

    /// Draw one frame
    ///
    /// Returns `Ok(false)` once the session stopped being interactive, which
    /// ends the render loop.
    pub fn render_frame(&self) -> Result<bool> {
        let mut inner = self.session.inner.lock();
        if inner.state != ViewerState::Interactive {
            return Ok(false);
        }

        let world = {
            let SessionState {
                controls, display, ..
            } = &mut *inner;
            let Some(display) = display.as_mut() else {
                return Ok(false);
            };
            display.camera.set_distance(controls.distance());
            let world = world_matrix(controls, &display.normalization);

            self.session.backend.draw(
                display.surface,
                &Frame {
                    model: &display.model,
                    world,
                    camera: &display.camera,
                    lights: &self.session.lights,
                    background: self.session.background,
                },
            )?;
            world
        };

        inner.frames += 1;
        if inner.frames == 1 {
            debug!(
                "First frame for {} in {} (world {:?})",
                self.session.path, self.session.container, world
            );
        }
        Ok(true)
    }

    /// Stop the session and release its surface
    ///
    /// Idempotent. A disposed session never paints into its container again.
    pub fn dispose(&self) {
        let surface = {
            let mut inner = self.session.inner.lock();
            if inner.state == ViewerState::Disposed {
                return;
            }
            inner.state = ViewerState::Disposed;
            inner.display.take().map(|display| display.surface)
        };

        if let Some(surface) = surface {
            self.session.backend.release_surface(surface);
        }
        debug!(
            "Disposed viewer for {} in {}",
            self.session.path, self.session.container
        );
    }

    pub(crate) fn same_session(&self, other: &ViewerHandle) -> bool {
        Arc::ptr_eq(&self.session, &other.session)
    }

    /// Move to `state` unless disposed; returns whether it applied
    pub(crate) fn transition(&self, state: ViewerState) -> bool {
        let mut inner = self.session.inner.lock();
        if inner.state == ViewerState::Disposed {
            return false;
        }
        inner.state = state;
        true
    }

    /// Present `content` and move to `state` unless disposed
    pub(crate) fn paint(&self, content: ContainerContent, state: ViewerState) -> Result<bool> {
        let mut inner = self.session.inner.lock();
        if inner.state == ViewerState::Disposed {
            return Ok(false);
        }
        self.session.backend.present(&self.session.container, content)?;
        inner.state = state;
        Ok(true)
    }

    /// Install the normalized model and go interactive
    ///
    /// Returns `Ok(false)` without touching the backend when disposed.
    pub(crate) fn attach(
        &self,
        model: LoadedModel,
        normalization: Normalization,
        camera: PerspectiveCamera,
        surface: SurfaceId,
        hint: Option<String>,
    ) -> Result<bool> {
        let mut inner = self.session.inner.lock();
        if inner.state == ViewerState::Disposed {
            drop(inner);
            self.session.backend.release_surface(surface);
            return Ok(false);
        }

        self.session.backend.present(
            &self.session.container,
            ContainerContent::Canvas { surface, hint },
        )?;
        inner.display = Some(Display {
            model,
            normalization,
            camera,
            surface,
        });
        inner.state = ViewerState::Interactive;
        Ok(true)
    }
}

fn world_matrix(controls: &OrbitControls, normalization: &Normalization) -> Mat4 {
    let rotation = controls.rotation();
    Mat4::from_euler(EulerRot::XYZ, rotation.x, rotation.y, 0.0) * normalization.matrix()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, SurfaceSize};
    use crate::config::{CameraConfig, ControlsConfig};

    fn handle(backend: &MockBackend) -> ViewerHandle {
        let controls = OrbitControls::new(&ControlsConfig::default(), &CameraConfig::default());
        ViewerHandle::new(ViewerSession::new(
            "viewer",
            "a.obj",
            Arc::new(backend.clone()),
            controls,
            [1.0; 4],
        ))
    }

    fn attach(handle: &ViewerHandle, backend: &MockBackend) -> SurfaceId {
        let surface = backend
            .create_surface("viewer", SurfaceSize::new(100, 100), true)
            .unwrap();
        handle
            .attach(
                LoadedModel::default(),
                Normalization::default(),
                PerspectiveCamera::default(),
                surface,
                None,
            )
            .unwrap();
        surface
    }

    #[test]
    fn test_scene_lights() {
        let lights = scene_lights();
        assert_eq!(lights.len(), 3);
        assert_eq!(lights[0].intensity, 0.6);
    }

    #[test]
    fn test_input_ignored_until_interactive() {
        let backend = MockBackend::new().with_container("viewer", 100, 100);
        let handle = handle(&backend);
        assert!(!handle.handle_input(&InputEvent::Wheel { delta_y: 1.0 }));
        assert_eq!(handle.render_frame().unwrap(), false);

        attach(&handle, &backend);
        assert_eq!(handle.state(), ViewerState::Interactive);
        assert!(handle.handle_input(&InputEvent::Wheel { delta_y: 1.0 }));
        assert!(handle.render_frame().unwrap());
        assert_eq!(handle.frames_drawn(), 1);
    }

    #[test]
    fn test_dispose_releases_surface_once() {
        let backend = MockBackend::new().with_container("viewer", 100, 100);
        let handle = handle(&backend);
        let surface = attach(&handle, &backend);

        handle.dispose();
        handle.dispose();

        assert_eq!(backend.released(), vec![surface]);
        assert_eq!(handle.render_frame().unwrap(), false);
        assert!(!handle.handle_input(&InputEvent::Wheel { delta_y: 1.0 }));
        assert!(!handle
            .paint(ContainerContent::Error("late".into()), ViewerState::Loading)
            .unwrap());
        assert_eq!(handle.state(), ViewerState::Disposed);
    }

    #[test]
    fn test_camera_follows_controls() {
        let backend = MockBackend::new().with_container("viewer", 100, 100);
        let handle = handle(&backend);
        let surface = attach(&handle, &backend);

        handle.handle_input(&InputEvent::Wheel { delta_y: 1.0 });
        handle.render_frame().unwrap();

        let frame = backend.last_frame(surface).unwrap();
        assert!((frame.camera_position.z - 2.2).abs() < 1e-6);
        assert_eq!(frame.light_count, 3);
    }
}
