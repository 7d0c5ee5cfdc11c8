mod common;
mod mesh;
mod renderer;
mod shaders;
mod shadow;
pub mod skybox;

pub use common::{CameraParams, LightParams};
pub use renderer::Renderer;
pub use skybox::SkyboxImages;
