use std::collections::HashMap;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use log::{debug, warn};
use wgpu::util::DeviceExt;

use crate::assets::LoadedGroup;
use crate::obj::{ObjMesh, VERTEX_STRIDE};
use crate::render::common::ObjectConstants;

pub(crate) const VERTEX_BYTES: u64 = (VERTEX_STRIDE * std::mem::size_of::<f32>()) as u64;

pub(crate) const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

pub(crate) fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: VERTEX_BYTES,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

/// Uniform, diffuse texture and sampler of a single mesh.
pub(crate) fn object_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("object-bind-layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(
                        std::mem::size_of::<ObjectConstants>() as u64
                    ),
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

/// Vertex and index buffers plus the per-object bind group of one mesh.
pub(crate) struct GpuMesh {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
    bind_group: wgpu::BindGroup,
}

impl GpuMesh {
    pub(crate) fn draw(&self, pass: &mut wgpu::RenderPass<'_>, group_slot: u32) {
        pass.set_vertex_buffer(0, self.vertex.slice(..));
        pass.set_index_buffer(self.index.slice(..), wgpu::IndexFormat::Uint32);
        pass.set_bind_group(group_slot, &self.bind_group, &[]);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

/// Uploads every mesh of a loaded group.
pub(crate) fn upload_group(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    textures: &mut TextureCache,
    loaded: &LoadedGroup,
) -> Vec<GpuMesh> {
    loaded
        .meshes
        .iter()
        .map(|mesh| {
            let label = format!("{}/{}", loaded.group.name, mesh.name);
            upload_mesh(device, queue, layout, textures, loaded, mesh, &label)
        })
        .collect()
}

fn upload_mesh(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    textures: &mut TextureCache,
    loaded: &LoadedGroup,
    mesh: &ObjMesh,
    label: &str,
) -> GpuMesh {
    let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{label}-vertices")),
        contents: bytemuck::cast_slice(&mesh.vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{label}-indices")),
        contents: bytemuck::cast_slice(&mesh.indices),
        usage: wgpu::BufferUsages::INDEX,
    });

    let constants = ObjectConstants::new(loaded.model, &mesh.material);
    let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{label}-object")),
        contents: bytemuck::bytes_of(&constants),
        usage: wgpu::BufferUsages::UNIFORM,
    });
    let diffuse_map = mesh.material.diffuse_map.as_deref();
    textures.ensure_loaded(device, queue, diffuse_map);
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("{label}-bind-group")),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(textures.view(diffuse_map)),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&textures.sampler),
            },
        ],
    });

    GpuMesh {
        vertex,
        index,
        index_count: mesh.indices.len() as u32,
        bind_group,
    }
}

pub(crate) struct DiffuseTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Diffuse maps shared between meshes that reference the same file.
pub(crate) struct TextureCache {
    sampler: wgpu::Sampler,
    white: DiffuseTexture,
    loaded: HashMap<PathBuf, DiffuseTexture>,
}

impl TextureCache {
    pub(crate) fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("diffuse-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let white = create_texture(device, queue, &white_pixel(), "white-texture");
        Self {
            sampler,
            white,
            loaded: HashMap::new(),
        }
    }

    fn ensure_loaded(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, path: Option<&Path>) {
        let Some(path) = path else {
            return;
        };
        if self.loaded.contains_key(path) {
            return;
        }
        let image = load_diffuse_image(Some(path));
        let texture = create_texture(device, queue, &image, &path.display().to_string());
        self.loaded.insert(path.to_path_buf(), texture);
    }

    fn view(&self, path: Option<&Path>) -> &wgpu::TextureView {
        path.and_then(|path| self.loaded.get(path))
            .map_or(&self.white.view, |texture| &texture.view)
    }
}

/// Reads a diffuse map, falling back to a single white texel when the
/// material has none or the file cannot be decoded.
pub(crate) fn load_diffuse_image(path: Option<&Path>) -> RgbaImage {
    let Some(path) = path else {
        return white_pixel();
    };
    match image::open(path) {
        Ok(image) => {
            let image = image.to_rgba8();
            debug!(
                "diffuse map {} ({}x{})",
                path.display(),
                image.width(),
                image.height()
            );
            image
        }
        Err(err) => {
            warn!("unable to load diffuse map {}: {err}", path.display());
            white_pixel()
        }
    }
}

fn white_pixel() -> RgbaImage {
    RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255]))
}

fn create_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &RgbaImage,
    label: &str,
) -> DiffuseTexture {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: image.width(),
                height: image.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        image.as_raw(),
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    DiffuseTexture {
        _texture: texture,
        view,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_obj_stride() {
        let layout = vertex_layout();
        assert_eq!(layout.array_stride, 32);
        assert_eq!(layout.attributes[1].offset, 12);
        assert_eq!(layout.attributes[2].offset, 24);
    }

    #[test]
    fn missing_diffuse_map_is_white() {
        let dir = tempfile::tempdir().unwrap();
        let image = load_diffuse_image(Some(&dir.path().join("absent.png")));
        assert_eq!(image.dimensions(), (1, 1));
        assert_eq!(image.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(load_diffuse_image(None).dimensions(), (1, 1));
    }

    #[test]
    fn reads_diffuse_map_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bark.png");
        RgbaImage::from_pixel(4, 2, Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();
        let image = load_diffuse_image(Some(&path));
        assert_eq!(image.dimensions(), (4, 2));
        assert_eq!(image.get_pixel(3, 1), &Rgba([10, 20, 30, 255]));
    }
}
