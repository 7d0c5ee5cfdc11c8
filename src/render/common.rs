use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};

use crate::camera::Projection;
use crate::light::{LightSource, ShadowFrustum};
use crate::material::Material;
use crate::transform::normal_matrix;
use crate::view::ViewState;

/// Camera parameters consumed by the renderer's uniform buffers.
#[derive(Clone, Debug)]
pub struct CameraParams {
    pub view_proj: Mat4,
    /// Projection times the rotation-only view, for the skybox.
    pub sky_view_proj: Mat4,
    pub position: Vec3,
}

impl CameraParams {
    pub fn from_view(view: &ViewState, projection: &Projection, aspect: f32) -> Self {
        let proj = projection.matrix(aspect);
        Self {
            view_proj: proj * view.camera.view_matrix(),
            sky_view_proj: proj * view.camera.rotation_matrix(),
            position: view.camera.eye_position(),
        }
    }
}

/// Lighting state consumed by the renderer's uniform buffers.
#[derive(Clone, Debug)]
pub struct LightParams {
    pub light: LightSource,
    pub view_proj: Mat4,
}

impl LightParams {
    pub fn from_view(view: &ViewState, frustum: &ShadowFrustum) -> Self {
        Self {
            light: view.light,
            view_proj: view.light.shadow_view_projection(frustum),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct GlobalUniform {
    view_proj: [[f32; 4]; 4],
    light_view_proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    light_position: [f32; 4],
    light_ambient: [f32; 4],
    light_diffuse: [f32; 4],
    light_specular: [f32; 4],
}

impl GlobalUniform {
    pub(crate) fn new(camera: &CameraParams, light: &LightParams) -> Self {
        Self {
            view_proj: camera.view_proj.to_cols_array_2d(),
            light_view_proj: light.view_proj.to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).into(),
            light_position: light.light.position.extend(1.0).into(),
            light_ambient: light.light.ambient.extend(1.0).into(),
            light_diffuse: light.light.diffuse.extend(1.0).into(),
            light_specular: light.light.specular.extend(1.0).into(),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct ObjectConstants {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 3],
    ambient: [f32; 4],
    diffuse: [f32; 4],
    specular: [f32; 4],
}

impl ObjectConstants {
    pub(crate) fn new(model: Mat4, material: &Material) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            normal: mat3_to_3x4(normal_matrix(model)),
            ambient: material.ambient.extend(1.0).into(),
            diffuse: material.diffuse.extend(material.alpha).into(),
            specular: material.specular.extend(material.shininess).into(),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct ShadowUniform {
    light_view_proj: [[f32; 4]; 4],
}

impl ShadowUniform {
    pub(crate) fn new(light: &LightParams) -> Self {
        Self {
            light_view_proj: light.view_proj.to_cols_array_2d(),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct SkyUniform {
    inv_view_proj: [[f32; 4]; 4],
}

impl SkyUniform {
    pub(crate) fn new(camera: &CameraParams) -> Self {
        Self {
            inv_view_proj: camera.sky_view_proj.inverse().to_cols_array_2d(),
        }
    }
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}
