use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::transform::{frustum_matrix, rotation_matrix_x, rotation_matrix_y, translation_matrix};

/// Camera orbiting a centre point at a given distance.
///
/// `phi` spins around the vertical axis and `psi` tilts around the
/// horizontal one, both in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitCamera {
    pub center: Vec3,
    pub distance: f32,
    pub phi: f32,
    pub psi: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            distance: 5.0,
            phi: 0.0,
            psi: 0.0,
        }
    }
}

impl OrbitCamera {
    pub const MIN_DISTANCE: f32 = 1.0;

    pub fn new(center: Vec3) -> Self {
        Self {
            center,
            ..Self::default()
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        translation_matrix(Vec3::new(0.0, 0.0, -self.distance))
            * rotation_matrix_x(self.psi)
            * rotation_matrix_y(self.phi)
            * translation_matrix(self.center)
    }

    /// View matrix without its translation, for drawing the skybox.
    pub fn rotation_matrix(&self) -> Mat4 {
        rotation_matrix_x(self.psi) * rotation_matrix_y(self.phi)
    }

    pub fn eye_position(&self) -> Vec3 {
        (self.view_matrix().inverse() * Vec4::W).truncate()
    }

    pub fn zoom_in(&mut self) {
        self.distance = (self.distance - 1.0).max(Self::MIN_DISTANCE);
    }

    pub fn zoom_out(&mut self) {
        self.distance += 1.0;
    }

    /// Moves the centre by a drag expressed as a fraction of the viewport.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.center.x -= dx;
        self.center.y -= dy;
    }

    pub fn orbit(&mut self, dx: f32, dy: f32) {
        self.phi -= dx;
        self.psi -= dy;
    }

    pub fn shift_depth(&mut self, delta: f32) {
        self.center.z += delta;
    }
}

/// Perspective projection with a unit half-height at the near plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub near: f32,
    pub far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            near: 1.0,
            far: 100.0,
        }
    }
}

impl Projection {
    pub fn matrix(&self, aspect: f32) -> Mat4 {
        let half_width = aspect.max(0.01);
        frustum_matrix(-half_width, half_width, -1.0, 1.0, self.near, self.far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_sits_in_front_of_its_centre() {
        let camera = OrbitCamera::default();
        assert!(camera.eye_position().abs_diff_eq(Vec3::new(0.0, 0.0, 5.0), 1e-5));
    }

    #[test]
    fn view_translates_by_the_centre() {
        let camera = OrbitCamera::new(Vec3::new(0.0, 3.0, 0.0));
        let eye = camera.eye_position();
        assert!(eye.abs_diff_eq(Vec3::new(0.0, -3.0, 5.0), 1e-5));
    }

    #[test]
    fn zoom_in_stops_at_minimum_distance() {
        let mut camera = OrbitCamera {
            distance: 2.0,
            ..OrbitCamera::default()
        };
        camera.zoom_in();
        camera.zoom_in();
        camera.zoom_in();
        assert_eq!(camera.distance, OrbitCamera::MIN_DISTANCE);
        camera.zoom_out();
        assert_eq!(camera.distance, 2.0);
    }

    #[test]
    fn orbit_and_pan_subtract_the_drag() {
        let mut camera = OrbitCamera::default();
        camera.orbit(0.1, 0.2);
        camera.pan(0.5, 0.25);
        assert_eq!(camera.phi, -0.1);
        assert_eq!(camera.psi, -0.2);
        assert_eq!(camera.center, Vec3::new(-0.5, -0.25, 0.0));
    }

    #[test]
    fn rotation_matrix_has_no_translation() {
        let camera = OrbitCamera {
            center: Vec3::new(4.0, 5.0, 6.0),
            phi: 0.3,
            psi: -0.2,
            ..OrbitCamera::default()
        };
        let origin = camera.rotation_matrix().transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(Vec3::ZERO, 1e-6));
    }

    #[test]
    fn projection_widens_with_aspect() {
        let projection = Projection::default();
        let square = projection.matrix(1.0);
        let wide = projection.matrix(2.0);
        assert!((square.x_axis.x - 1.0).abs() < 1e-6);
        assert!((wide.x_axis.x - 0.5).abs() < 1e-6);
        assert_eq!(square.y_axis.y, wide.y_axis.y);
    }
}
