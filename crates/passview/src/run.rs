use anyhow::{bail, Context, Result};
use renderer::{DirectoryImages, Viewer, ViewerConfig};
use shaderlib::ShaderLibrary;
use tracing_subscriber::EnvFilter;

use crate::bindings::LibraryShaders;
use crate::cli::Cli;

pub fn run(cli: Cli) -> Result<()> {
    let library = load_library(&cli)?;
    let shaders = LibraryShaders::from_library(&library)?;
    let images = DirectoryImages::scan(&cli.images).with_context(|| {
        format!("failed to open image directory {}", cli.images.display())
    })?;
    if images.is_empty() {
        tracing::warn!(
            dir = %cli.images.display(),
            "no images found; the window stays empty until one is added"
        );
    }

    tracing::info!(
        shader_sets = library.len(),
        images = images.len(),
        start = library.current().map(|pack| pack.name()).unwrap_or_default(),
        "starting passview"
    );
    let config = ViewerConfig {
        initial_size: cli.size,
        max_fps: cli.fps,
        clear_color: cli.clear_color,
        ..ViewerConfig::default()
    };
    Viewer::new(config).run(shaders, images)
}

pub fn list(cli: &Cli) -> Result<()> {
    let library = ShaderLibrary::scan_or_builtin(&cli.shaders)
        .with_context(|| format!("failed to scan shader library {}", cli.shaders.display()))?;

    println!("Shader sets in {}:", cli.shaders.display());
    for pack in library.packs() {
        let location = pack
            .root()
            .map(|root| root.display().to_string())
            .unwrap_or_else(|| "(built-in)".to_string());
        println!(
            "  {:<24} passes={:<2} defaults={:<2} {}",
            pack.name(),
            pack.sources().len(),
            pack.defaults().len(),
            location
        );
        if let Some(description) = pack.description() {
            println!("      {description}");
        }
    }
    Ok(())
}

fn load_library(cli: &Cli) -> Result<ShaderLibrary> {
    let mut library = ShaderLibrary::scan_or_builtin(&cli.shaders)
        .with_context(|| format!("failed to scan shader library {}", cli.shaders.display()))?;
    if let Some(name) = cli.shader.as_deref() {
        if !library.select(name) {
            bail!(
                "shader set '{name}' not found in {}",
                cli.shaders.display()
            );
        }
    }
    Ok(library)
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
