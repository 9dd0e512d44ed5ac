//! CLI argument parsing for xgrab.

use clap::Parser;
use xgrab_capture::Rect;

#[derive(Parser, Clone, Debug)]
#[command(name = "xgrab")]
#[command(about = "Capture a region of an X11 display")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Display to capture from (defaults to the configured display, then $DISPLAY)
    #[arg(short, long, value_name = "DISPLAY")]
    pub display: Option<String>,

    /// Region to capture as X,Y,WIDTH,HEIGHT (defaults to the whole screen)
    #[arg(short, long, value_name = "X,Y,W,H", value_parser = parse_region)]
    pub region: Option<Rect>,

    /// Output file; relative paths go to the configured output directory
    #[arg(short, long, default_value = "xgrab.png")]
    pub output: String,

    /// Always fetch pixels over the connection instead of shared memory
    #[arg(long)]
    pub no_shm: bool,

    /// Print the screen geometry as JSON and exit
    #[arg(long, conflicts_with = "region")]
    pub info: bool,
}

/// Parse `X,Y,W,H` into a [`Rect`].
pub fn parse_region(value: &str) -> Result<Rect, String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<i32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid region '{}': {}", value, e))?;

    match parts.as_slice() {
        [x, y, width, height] => Ok(Rect::new(*x, *y, *width, *height)),
        _ => Err(format!(
            "invalid region '{}': expected X,Y,WIDTH,HEIGHT",
            value
        )),
    }
}
