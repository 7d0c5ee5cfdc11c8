use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::bytes_of;
use log::{debug, info, warn};
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use crate::assets::LoadedScene;
use crate::camera::Projection;
use crate::config::RenderSettings;
use crate::light::ShadowFrustum;
use crate::render::common::{CameraParams, GlobalUniform, LightParams};
use crate::render::mesh::{object_layout, upload_group, vertex_layout, GpuMesh, TextureCache};
use crate::render::shaders::SCENE_SHADER;
use crate::render::shadow::{ShadowMap, ShadowPreview};
use crate::render::skybox::{Skybox, SkyboxImages};
use crate::scene::{Blend, Cull, DrawStep, ModelGroup, Shading};
use crate::view::ViewState;

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Render state that selects a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub shading: Shading,
    pub cull: Cull,
    pub blend: Blend,
    pub wireframe: bool,
}

impl PipelineKey {
    pub(crate) fn for_group(group: &ModelGroup, wireframe: bool) -> Self {
        Self {
            shading: group.shading,
            cull: group.cull,
            blend: group.blend,
            wireframe,
        }
    }

    fn fragment_entry(self) -> &'static str {
        match self.shading {
            Shading::Phong => "fs_phong",
            Shading::ShadowMapped => "fs_shadowed",
        }
    }

    fn cull_mode(self) -> Option<wgpu::Face> {
        match self.cull {
            Cull::Back => Some(wgpu::Face::Back),
            Cull::None => None,
        }
    }

    fn blend_state(self) -> Option<wgpu::BlendState> {
        match self.blend {
            Blend::Opaque => None,
            Blend::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
        }
    }

    fn polygon_mode(self) -> wgpu::PolygonMode {
        if self.wireframe {
            wgpu::PolygonMode::Line
        } else {
            wgpu::PolygonMode::Fill
        }
    }

    fn label(self) -> String {
        format!(
            "scene-{:?}-{:?}-{:?}{}",
            self.shading,
            self.cull,
            self.blend,
            if self.wireframe { "-wireframe" } else { "" }
        )
    }
}

struct GpuGroup {
    group: ModelGroup,
    meshes: Vec<GpuMesh>,
}

/// GPU renderer backed by wgpu that draws the loaded scene.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    depth: DepthBuffer,
    clear_color: wgpu::Color,
    projection: Projection,
    shadow_frustum: ShadowFrustum,
    wireframe_supported: bool,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    groups: Vec<GpuGroup>,
    plan: Vec<DrawStep>,
    casters: Vec<usize>,
    shadow: ShadowMap,
    preview: ShadowPreview,
    skybox: Option<Skybox>,
}

impl Renderer {
    /// Initializes the GPU, uploads every mesh and builds the pipelines the
    /// scene needs. The skybox is drawn only when `sky` is given.
    pub async fn new(
        window: Arc<Window>,
        settings: &RenderSettings,
        scene: &LoadedScene,
        sky: Option<&SkyboxImages>,
    ) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let wireframe_supported = adapter
            .features()
            .contains(wgpu::Features::POLYGON_MODE_LINE);
        if !wireframe_supported {
            warn!("adapter has no line polygon mode, wireframe toggle disabled");
        }
        let required_features = if wireframe_supported {
            wgpu::Features::POLYGON_MODE_LINE
        } else {
            wgpu::Features::empty()
        };
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("renderer-device"),
                    required_features,
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .context("failed to create GPU device")?;
        info!("rendering with {:?}", adapter.get_info().backend);

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no texture formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);
        let object_layout = object_layout(&device);
        let shadow = ShadowMap::new(&device, settings.shadow_map_size, &object_layout);
        let preview = ShadowPreview::new(&device, surface_format, &shadow);

        let global_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("global-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(
                            std::mem::size_of::<GlobalUniform>() as u64
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });
        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniform"),
            size: std::mem::size_of::<GlobalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &global_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: global_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(shadow.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(shadow.sampler()),
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene-shader"),
            source: wgpu::ShaderSource::Wgsl(SCENE_SHADER.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene-pipeline-layout"),
            bind_group_layouts: &[&global_layout, &object_layout],
            push_constant_ranges: &[],
        });

        let mut pipelines = HashMap::new();
        let modes: &[bool] = if wireframe_supported {
            &[false, true]
        } else {
            &[false]
        };
        for loaded in &scene.groups {
            for &wireframe in modes {
                let key = PipelineKey::for_group(&loaded.group, wireframe);
                pipelines.entry(key).or_insert_with(|| {
                    create_scene_pipeline(&device, &pipeline_layout, &shader, surface_format, key)
                });
            }
        }
        debug!("created {} scene pipeline(s)", pipelines.len());

        let mut textures = TextureCache::new(&device, &queue);
        let groups = scene
            .groups
            .iter()
            .map(|loaded| GpuGroup {
                group: loaded.group.clone(),
                meshes: upload_group(&device, &queue, &object_layout, &mut textures, loaded),
            })
            .collect();

        let skybox = sky.map(|images| {
            Skybox::new(&device, &queue, surface_format, DEPTH_FORMAT, images)
        });
        let [r, g, b, a] = settings.clear_color;

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            depth,
            clear_color: wgpu::Color { r, g, b, a },
            projection: Projection::default(),
            shadow_frustum: settings.shadow_frustum,
            wireframe_supported,
            global_buffer,
            global_bind_group,
            pipelines,
            groups,
            plan: scene.layout.frame_plan(),
            casters: scene.layout.shadow_casters(),
            shadow,
            preview,
            skybox,
        })
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Whether the device can rasterize lines for the wireframe toggle.
    pub fn wireframe_supported(&self) -> bool {
        self.wireframe_supported
    }

    pub fn shadow_map_size(&self) -> u32 {
        self.shadow.size()
    }

    /// Resizes the swap chain to match the new dimensions.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    fn aspect(&self) -> f32 {
        self.size.width as f32 / self.size.height.max(1) as f32
    }

    /// Renders one frame: shadow map, scene in draw order, optional preview.
    pub fn render(&mut self, view: &ViewState) -> Result<(), wgpu::SurfaceError> {
        let camera = CameraParams::from_view(view, &self.projection, self.aspect());
        let light = LightParams::from_view(view, &self.shadow_frustum);
        self.queue.write_buffer(
            &self.global_buffer,
            0,
            bytes_of(&GlobalUniform::new(&camera, &light)),
        );
        self.shadow.update(&self.queue, &light);
        if let Some(skybox) = &self.skybox {
            skybox.update(&self.queue, &camera);
        }

        let output = self.surface.get_current_texture()?;
        let target = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("renderer-encoder"),
            });

        let groups = &self.groups;
        self.shadow.render(
            &mut encoder,
            self.casters
                .iter()
                .flat_map(|&index| groups[index].meshes.iter()),
        );

        let wireframe = view.wireframe && self.wireframe_supported;
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            pass.set_bind_group(0, &self.global_bind_group, &[]);

            for step in &self.plan {
                match *step {
                    DrawStep::Group(index) => {
                        let gpu = &self.groups[index];
                        let key = PipelineKey::for_group(&gpu.group, wireframe);
                        let Some(pipeline) = self.pipelines.get(&key) else {
                            continue;
                        };
                        pass.set_pipeline(pipeline);
                        for mesh in &gpu.meshes {
                            mesh.draw(&mut pass, 1);
                        }
                    }
                    DrawStep::Skybox => {
                        if let Some(skybox) = &self.skybox {
                            skybox.draw(&mut pass);
                        }
                    }
                }
            }
        }

        if view.show_shadow_map {
            self.preview
                .render(&mut encoder, &target, self.size.width, self.size.height);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

fn create_scene_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    surface_format: wgpu::TextureFormat,
    key: PipelineKey,
) -> wgpu::RenderPipeline {
    let label = key.label();
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[vertex_layout()],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: key.cull_mode(),
            polygon_mode: key.polygon_mode(),
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(key.fragment_entry()),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: key.blend_state(),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    })
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}
