use std::num::NonZeroU64;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bytemuck::bytes_of;
use glam::Vec3;
use image::{Rgba, RgbaImage};
use log::info;
use wgpu::util::DeviceExt;

use crate::config::RenderSettings;
use crate::render::common::{CameraParams, SkyUniform};
use crate::render::shaders::SKYBOX_SHADER;

/// Face file stems in cube layer order: +X, -X, +Y, -Y, +Z, -Z.
pub const FACE_NAMES: [&str; 6] = ["right", "left", "top", "bottom", "front", "back"];

const FACE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Zenith colour of the generated sky; its horizon is the clear colour.
const SKY_ZENITH: Vec3 = Vec3::new(0.25, 0.45, 0.85);

/// Six square faces of a cube map, all the same size.
#[derive(Debug, Clone)]
pub struct SkyboxImages {
    pub size: u32,
    pub faces: Vec<RgbaImage>,
}

impl SkyboxImages {
    /// Faces from `--skybox` when given, otherwise the generated gradient.
    pub fn from_settings(settings: &RenderSettings) -> Result<Self> {
        match &settings.skybox_dir {
            Some(dir) => Self::load(dir),
            None => {
                let [r, g, b, _] = settings.clear_color;
                let horizon = Vec3::new(r as f32, g as f32, b as f32);
                Ok(Self::procedural(
                    settings.procedural_sky_size,
                    horizon,
                    SKY_ZENITH,
                ))
            }
        }
    }

    /// Loads `right`, `left`, `top`, `bottom`, `front` and `back` images
    /// from `dir`, each with any of the supported image extensions.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut faces = Vec::with_capacity(FACE_NAMES.len());
        for name in FACE_NAMES {
            let path = find_face(dir, name)
                .with_context(|| format!("missing skybox face {name} in {}", dir.display()))?;
            let face = image::open(&path)
                .with_context(|| format!("unable to decode skybox face {}", path.display()))?
                .to_rgba8();
            if face.width() != face.height() {
                bail!(
                    "skybox face {} is {}x{}, faces must be square",
                    path.display(),
                    face.width(),
                    face.height()
                );
            }
            if let Some(first) = faces.first().map(RgbaImage::width) {
                if face.width() != first {
                    bail!(
                        "skybox face {} is {} pixels wide, expected {first}",
                        path.display(),
                        face.width()
                    );
                }
            }
            faces.push(face);
        }
        let size = faces.first().map_or(0, RgbaImage::width);
        info!("loaded {size}x{size} skybox from {}", dir.display());
        Ok(Self { size, faces })
    }

    /// Vertical gradient from `horizon` to `zenith`, darker below the horizon.
    pub fn procedural(size: u32, horizon: Vec3, zenith: Vec3) -> Self {
        let size = size.max(1);
        let ground = horizon * 0.6;
        let faces = (0..FACE_NAMES.len())
            .map(|face| {
                RgbaImage::from_fn(size, size, |x, y| {
                    let u = 2.0 * (x as f32 + 0.5) / size as f32 - 1.0;
                    let v = 2.0 * (y as f32 + 0.5) / size as f32 - 1.0;
                    let dir = face_direction(face, u, v);
                    let color = if dir.y >= 0.0 {
                        horizon.lerp(zenith, dir.y.sqrt())
                    } else {
                        horizon.lerp(ground, (-dir.y).sqrt())
                    };
                    to_rgba(color)
                })
            })
            .collect();
        Self { size, faces }
    }
}

fn find_face(dir: &Path, name: &str) -> Option<PathBuf> {
    FACE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .find(|path| path.is_file())
}

/// World direction through texel `(u, v)` of a cube face, `u` and `v` in -1..1.
fn face_direction(face: usize, u: f32, v: f32) -> Vec3 {
    let dir = match face {
        0 => Vec3::new(1.0, -v, -u),
        1 => Vec3::new(-1.0, -v, u),
        2 => Vec3::new(u, 1.0, v),
        3 => Vec3::new(u, -1.0, -v),
        4 => Vec3::new(u, -v, 1.0),
        _ => Vec3::new(-u, -v, -1.0),
    };
    dir.normalize()
}

fn to_rgba(color: Vec3) -> Rgba<u8> {
    let c = color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0;
    Rgba([c.x.round() as u8, c.y.round() as u8, c.z.round() as u8, 255])
}

/// Cube map texture and the pipeline that draws it behind the scene.
pub(crate) struct Skybox {
    _texture: wgpu::Texture,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    pipeline: wgpu::RenderPipeline,
}

impl Skybox {
    pub(crate) fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
        images: &SkyboxImages,
    ) -> Self {
        let data: Vec<u8> = images
            .faces
            .iter()
            .flat_map(|face| face.as_raw().iter().copied())
            .collect();
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("skybox-texture"),
                size: wgpu::Extent3d {
                    width: images.size,
                    height: images.size,
                    depth_or_array_layers: FACE_NAMES.len() as u32,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &data,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("skybox-view"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("skybox-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("skybox-uniform"),
            size: std::mem::size_of::<SkyUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("skybox-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(
                            std::mem::size_of::<SkyUniform>() as u64
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
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
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("skybox-bind-group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("skybox-shader"),
            source: wgpu::ShaderSource::Wgsl(SKYBOX_SHADER.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("skybox-pipeline-layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        // Drawn at the far plane after the scene: only uncovered pixels pass.
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("skybox-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_sky"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_sky"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        Self {
            _texture: texture,
            uniform,
            bind_group,
            pipeline,
        }
    }

    pub(crate) fn update(&self, queue: &wgpu::Queue, camera: &CameraParams) {
        queue.write_buffer(&self.uniform, 0, bytes_of(&SkyUniform::new(camera)));
    }

    pub(crate) fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HORIZON: Vec3 = Vec3::new(0.7, 0.7, 1.0);
    const ZENITH: Vec3 = Vec3::new(0.2, 0.4, 0.8);

    #[test]
    fn procedural_sky_has_six_square_faces() {
        let sky = SkyboxImages::procedural(8, HORIZON, ZENITH);
        assert_eq!(sky.size, 8);
        assert_eq!(sky.faces.len(), 6);
        assert!(sky.faces.iter().all(|face| face.dimensions() == (8, 8)));
    }

    #[test]
    fn procedural_sky_is_zenith_overhead_and_horizon_at_the_sides() {
        let sky = SkyboxImages::procedural(9, HORIZON, ZENITH);
        let top = sky.faces[2].get_pixel(4, 4);
        assert_eq!(top, &to_rgba(ZENITH));
        let front = sky.faces[4].get_pixel(4, 4);
        assert_eq!(front, &to_rgba(HORIZON));
        let bottom = sky.faces[3].get_pixel(4, 4);
        assert_eq!(bottom, &to_rgba(HORIZON * 0.6));
    }

    #[test]
    fn settings_without_directory_generate_the_sky() {
        let settings = RenderSettings {
            procedural_sky_size: 4,
            ..RenderSettings::default()
        };
        let sky = SkyboxImages::from_settings(&settings).unwrap();
        assert_eq!(sky.size, 4);
        assert_eq!(sky.faces[4].get_pixel(2, 2)[3], 255);

        let dir = tempfile::tempdir().unwrap();
        let settings = RenderSettings {
            skybox_dir: Some(dir.path().to_path_buf()),
            ..RenderSettings::default()
        };
        assert!(SkyboxImages::from_settings(&settings).is_err());
    }

    #[test]
    fn face_directions_point_outwards() {
        let axes = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];
        for (face, axis) in axes.iter().enumerate() {
            assert!(face_direction(face, 0.0, 0.0).abs_diff_eq(*axis, 1e-6));
        }
        // Image rows grow downwards on the side faces.
        assert!(face_direction(4, 0.0, 0.9).y < 0.0);
    }

    fn write_faces(dir: &Path, size: impl Fn(&str) -> (u32, u32)) {
        for name in FACE_NAMES {
            let (w, h) = size(name);
            RgbaImage::from_pixel(w, h, Rgba([1, 2, 3, 255]))
                .save(dir.join(format!("{name}.png")))
                .unwrap();
        }
    }

    #[test]
    fn loads_faces_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_faces(dir.path(), |_| (4, 4));
        let sky = SkyboxImages::load(dir.path()).unwrap();
        assert_eq!(sky.size, 4);
        assert_eq!(sky.faces.len(), 6);
    }

    #[test]
    fn rejects_missing_or_mismatched_faces() {
        let dir = tempfile::tempdir().unwrap();
        let err = SkyboxImages::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("missing skybox face right"));

        write_faces(dir.path(), |name| if name == "back" { (8, 8) } else { (4, 4) });
        let err = SkyboxImages::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("expected 4"));

        write_faces(dir.path(), |name| if name == "top" { (4, 2) } else { (4, 4) });
        let err = SkyboxImages::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("must be square"));
    }
}
