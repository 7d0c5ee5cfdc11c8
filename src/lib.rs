//! Building blocks of the jungle scene renderer.
//!
//! Everything up to [`assets::LoadedScene`] is plain CPU code: OBJ and MTL
//! parsing, the scene layout, camera, light and input handling. The
//! [`render`] module uploads a loaded scene to the GPU with wgpu and draws it
//! with a directional shadow map, a skybox and a blended water plane, and
//! [`app`] drives it from a winit window.

pub mod app;
pub mod assets;
pub mod camera;
pub mod config;
pub mod error;
pub mod input;
pub mod light;
pub mod material;
pub mod obj;
pub mod render;
pub mod scene;
pub mod transform;
pub mod view;

pub use assets::{LoadedGroup, LoadedScene};
pub use camera::{OrbitCamera, Projection};
pub use config::{Cli, RenderSettings};
pub use error::WindowInitError;
pub use input::{Controller, KeyCode, MouseButton, NamedKey, Scroll};
pub use light::{LightSource, ShadowFrustum};
pub use material::{Material, MaterialLibrary};
pub use obj::{load_obj_file, load_obj_from_str, ObjMesh};
pub use render::{CameraParams, LightParams, Renderer, SkyboxImages};
pub use scene::{Blend, Cull, DrawStep, ModelGroup, SceneLayout, Shading};
pub use transform::TransformStep;
pub use view::ViewState;
