use anyhow::Result;
use clap::Parser;
use log::debug;

use jungle_renderer::app::run_interactive;
use jungle_renderer::{Cli, LoadedScene, WindowInitError};

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();
    if let Err(err) = run(cli) {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let layout = cli.scene_layout()?;
    debug!("draw order: {}", layout.describe_plan());
    let scene = LoadedScene::load(layout, &cli.assets)?;
    for line in scene.summary() {
        println!("{line}");
    }

    if cli.summary_only {
        return Ok(());
    }

    match run_interactive(cli.render_settings(), scene) {
        Ok(()) => Ok(()),
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
            eprintln!(
                "{err}. Falling back to --summary-only mode (set DISPLAY or install a GPU driver to enable rendering)."
            );
            Ok(())
        }
        Err(err) => Err(err),
    }
}
