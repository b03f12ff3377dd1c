use std::path::PathBuf;

use clap::Parser;
use renderer::{Bounds, Color};

#[derive(Parser, Debug)]
#[command(
    name = "passview",
    author,
    version,
    about = "Runs images through chains of GLSL fragment passes",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Shader library root; each sub-directory with a `shader.toml` is one shader set.
    #[arg(long, value_name = "DIR", default_value = "shaders")]
    pub shaders: PathBuf,

    /// Directory of source images (png, jpg, bmp, gif), shown in file-name order.
    #[arg(long, value_name = "DIR", default_value = "images")]
    pub images: PathBuf,

    /// Shader set to start with, by manifest name or directory name.
    #[arg(long, value_name = "NAME")]
    pub shader: Option<String>,

    /// Frame rate ceiling for the render loop.
    #[arg(long, value_name = "FPS", default_value = "70", value_parser = parse_fps)]
    pub fps: f32,

    /// Window size before the first image is loaded (e.g. `1280x720`).
    #[arg(
        long,
        value_name = "WIDTHxHEIGHT",
        default_value = "800x600",
        value_parser = parse_surface_size
    )]
    pub size: Bounds,

    /// Color every pass is cleared to before drawing, as `R,G,B,A` in 0..=1.
    #[arg(
        long,
        value_name = "R,G,B,A",
        default_value = "1,0,1,1",
        value_parser = parse_clear_color
    )]
    pub clear_color: Color,

    /// Print the discovered shader sets and exit.
    #[arg(long)]
    pub list: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_surface_size(value: &str) -> Result<Bounds, String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WxH format, e.g. 1920x1080".to_string())?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in size specification".to_string())?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in size specification".to_string())?;
    if width == 0 || height == 0 {
        return Err("surface dimensions must be greater than zero".into());
    }
    Ok(Bounds::new(width, height))
}

pub fn parse_fps(value: &str) -> Result<f32, String> {
    let fps: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid frame rate '{}'", value.trim()))?;
    if !fps.is_finite() || fps <= 0.0 {
        return Err("frame rate must be greater than zero".into());
    }
    Ok(fps)
}

pub fn parse_clear_color(value: &str) -> Result<Color, String> {
    let channels = value
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|_| format!("invalid color channel '{}'", part.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let &[r, g, b, a] = channels.as_slice() else {
        return Err(format!(
            "expected 4 comma-separated channels, got {}",
            channels.len()
        ));
    };
    if channels.iter().any(|c| !(0.0..=1.0).contains(c)) {
        return Err("color channels must be within 0..=1".into());
    }
    Ok(Color::new(r, g, b, a))
}
