use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Single light of the scene: a position plus ambient, diffuse and specular
/// intensities for Phong shading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightSource {
    pub position: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl Default for LightSource {
    fn default() -> Self {
        Self {
            position: Vec3::new(2.0, 2.0, 0.0),
            ambient: Vec3::splat(0.2),
            diffuse: Vec3::splat(0.9),
            specular: Vec3::ONE,
        }
    }
}

impl LightSource {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn nudge_x(&mut self, delta: f32) {
        self.position.x += delta;
    }

    pub fn scale_position(&mut self, factor: f32) {
        self.position *= factor;
    }

    /// Orthographic view-projection used to render and sample the shadow map.
    ///
    /// The light is treated as directional: only the direction from the
    /// light position towards `frustum.target` matters.
    pub fn shadow_view_projection(&self, frustum: &ShadowFrustum) -> Mat4 {
        let offset = self.position - frustum.target;
        let direction = if offset.length_squared() > f32::EPSILON {
            offset.normalize()
        } else {
            Vec3::Y
        };
        let up = if direction.dot(Vec3::Y).abs() > 0.99 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let eye = frustum.target + direction * frustum.distance;
        let view = Mat4::look_at_rh(eye, frustum.target, up);
        let extent = frustum.half_extent;
        let projection =
            Mat4::orthographic_rh(-extent, extent, -extent, extent, frustum.near, frustum.far);
        projection * view
    }
}

/// Volume covered by the shadow map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowFrustum {
    pub target: Vec3,
    /// Distance from the target at which the virtual light eye is placed.
    pub distance: f32,
    pub half_extent: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ShadowFrustum {
    fn default() -> Self {
        Self {
            target: Vec3::new(0.0, -6.0, 0.0),
            distance: 50.0,
            half_extent: 35.0,
            near: 1.0,
            far: 110.0,
        }
    }
}
