use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::light::ShadowFrustum;
use crate::scene::SceneLayout;

/// Command line of the `jungle-renderer` binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jungle-renderer",
    version,
    about = "Renders the jungle scene with shadows, a skybox and transparent water"
)]
pub struct Cli {
    /// Directory holding the OBJ and MTL files of the scene
    #[arg(long, default_value = "models/jungleModels")]
    pub assets: PathBuf,

    /// XML layout replacing the built-in jungle scene
    #[arg(long)]
    pub layout: Option<PathBuf>,

    /// Directory with right/left/top/bottom/front/back cube face images
    #[arg(long)]
    pub skybox: Option<PathBuf>,

    #[arg(long, default_value_t = 1400)]
    pub width: u32,

    #[arg(long, default_value_t = 1050)]
    pub height: u32,

    /// Edge length of the square shadow map texture
    #[arg(long, default_value_t = 2048)]
    pub shadow_map_size: u32,

    /// Start with the shadow map preview hidden (toggle with M)
    #[arg(long)]
    pub no_shadow_preview: bool,

    /// Load the assets, print the scene summary and exit without a window
    #[arg(long)]
    pub summary_only: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Reads the layout file when given, otherwise returns the jungle scene.
    pub fn scene_layout(&self) -> Result<SceneLayout> {
        let Some(path) = &self.layout else {
            return Ok(SceneLayout::jungle());
        };
        let xml = fs::read_to_string(path)
            .with_context(|| format!("unable to read layout {}", path.display()))?;
        SceneLayout::from_xml(&xml).with_context(|| format!("failed to parse layout {}", path.display()))
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            width: self.width.max(1),
            height: self.height.max(1),
            shadow_map_size: self.shadow_map_size.clamp(256, 8192),
            show_shadow_map: !self.no_shadow_preview,
            skybox_dir: self.skybox.clone(),
            ..RenderSettings::default()
        }
    }
}

/// Renderer configuration derived from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub clear_color: [f64; 4],
    pub shadow_map_size: u32,
    pub shadow_frustum: ShadowFrustum,
    pub show_shadow_map: bool,
    pub skybox_dir: Option<PathBuf>,
    /// Edge length of the generated cube map when no skybox images are given.
    pub procedural_sky_size: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 1400,
            height: 1050,
            clear_color: [0.7, 0.7, 1.0, 1.0],
            shadow_map_size: 2048,
            shadow_frustum: ShadowFrustum::default(),
            show_shadow_map: true,
            skybox_dir: None,
            procedural_sky_size: 128,
        }
    }
}
