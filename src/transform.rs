use glam::{Mat3, Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// One factor of a model matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TransformStep {
    Translate(Vec3),
    Scale(Vec3),
    /// Rotation about the X axis, in radians.
    RotateX(f32),
    RotateY(f32),
    RotateZ(f32),
}

impl TransformStep {
    pub fn matrix(&self) -> Mat4 {
        match *self {
            Self::Translate(offset) => translation_matrix(offset),
            Self::Scale(factors) => scale_matrix(factors),
            Self::RotateX(angle) => rotation_matrix_x(angle),
            Self::RotateY(angle) => rotation_matrix_y(angle),
            Self::RotateZ(angle) => rotation_matrix_z(angle),
        }
    }
}

/// Multiplies the steps left to right, so the last step is applied to the
/// vertex first.
pub fn compose(steps: &[TransformStep]) -> Mat4 {
    steps
        .iter()
        .fold(Mat4::IDENTITY, |acc, step| acc * step.matrix())
}

pub fn translation_matrix(offset: Vec3) -> Mat4 {
    Mat4::from_translation(offset)
}

pub fn scale_matrix(factors: Vec3) -> Mat4 {
    Mat4::from_scale(factors)
}

pub fn rotation_matrix_x(angle: f32) -> Mat4 {
    Mat4::from_rotation_x(angle)
}

pub fn rotation_matrix_y(angle: f32) -> Mat4 {
    Mat4::from_rotation_y(angle)
}

pub fn rotation_matrix_z(angle: f32) -> Mat4 {
    Mat4::from_rotation_z(angle)
}

/// Inverse-transpose of the upper 3x3, used to carry normals into world space.
pub fn normal_matrix(model: Mat4) -> Mat3 {
    let linear = Mat3::from_mat4(model);
    if linear.determinant().abs() <= f32::EPSILON {
        return linear;
    }
    linear.inverse().transpose()
}

/// Right-handed perspective frustum with depth mapped to `[0, 1]`.
pub fn frustum_matrix(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let width = right - left;
    let height = top - bottom;
    let depth = near - far;
    Mat4::from_cols_array(&[
        2.0 * near / width,
        0.0,
        0.0,
        0.0,
        0.0,
        2.0 * near / height,
        0.0,
        0.0,
        (right + left) / width,
        (top + bottom) / height,
        far / depth,
        -1.0,
        0.0,
        0.0,
        near * far / depth,
        0.0,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn compose_applies_last_step_first() {
        let model = compose(&[
            TransformStep::Translate(Vec3::new(0.0, -7.0, 0.0)),
            TransformStep::Scale(Vec3::splat(2.0)),
        ]);
        let point = model.transform_point3(Vec3::new(1.0, 1.0, 1.0));
        assert!(point.abs_diff_eq(Vec3::new(2.0, -5.0, 2.0), 1e-5));
    }

    #[test]
    fn compose_matches_manual_product() {
        let steps = [
            TransformStep::Translate(Vec3::new(0.0, -7.0, 0.0)),
            TransformStep::Scale(Vec3::splat(0.065)),
            TransformStep::RotateZ(-FRAC_PI_2),
        ];
        let expected = translation_matrix(Vec3::new(0.0, -7.0, 0.0))
            * scale_matrix(Vec3::splat(0.065))
            * rotation_matrix_z(-FRAC_PI_2);
        assert!(compose(&steps).abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn empty_composition_is_identity() {
        assert_eq!(compose(&[]), Mat4::IDENTITY);
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let model = scale_matrix(Vec3::new(55.0, 1.0, 55.0));
        let normal = normal_matrix(model) * Vec3::Y;
        assert!(normal.normalize().abs_diff_eq(Vec3::Y, 1e-5));
        let slanted = normal_matrix(model) * Vec3::new(1.0, 1.0, 0.0);
        assert!(slanted.y > slanted.x);
    }

    #[test]
    fn symmetric_frustum_matches_perspective() {
        let frustum = frustum_matrix(-1.0, 1.0, -1.0, 1.0, 1.0, 100.0);
        let perspective = Mat4::perspective_rh(FRAC_PI_2, 1.0, 1.0, 100.0);
        assert!(frustum.abs_diff_eq(perspective, 1e-5));
    }

    #[test]
    fn frustum_maps_near_and_far_to_unit_depth() {
        let frustum = frustum_matrix(-1.0, 1.0, -1.0, 1.0, 1.0, 100.0);
        let near = frustum.project_point3(Vec3::new(0.0, 0.0, -1.0));
        let far = frustum.project_point3(Vec3::new(0.0, 0.0, -100.0));
        assert!(near.z.abs() < 1e-5);
        assert!((far.z - 1.0).abs() < 1e-5);
    }
}
