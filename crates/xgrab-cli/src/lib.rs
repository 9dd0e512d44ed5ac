//! xgrab CLI - capture X11 screen regions from the command line.

mod cli_args;
mod utils;

use anyhow::{Context, Result};
use tracing::debug;

use xgrab_capture::{CaptureRequest, Rect};
use xgrab_config::Config;

pub use cli_args::{parse_region, Cli};
use clap::Parser;

use utils::{grab_options, initialize_logging};

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(cli.verbose);

    let config = Config::load_with_overrides(cli.config.as_deref(), cli.display.clone(), cli.no_shm)
        .context("Failed to load configuration")?;
    debug!("Using configuration: {:?}", config);

    let controller = xgrab_capture::create_controller(grab_options(&config), config.timeout())?;

    if cli.info {
        let info = controller.screen_info(None).await?;
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let region = match cli.region {
        Some(region) => region,
        None => {
            let info = controller.screen_info(None).await?;
            Rect::new(0, 0, info.width as i32, info.height as i32)
        }
    };

    // Without an output directory, relative paths are taken from the cwd
    let path = match config.output_directory() {
        Some(dir) => xgrab_capture::export::resolve_output_path(&cli.output, Some(&dir)),
        None => std::env::current_dir()?.join(&cli.output),
    };
    let request = CaptureRequest {
        display: None,
        region,
    };
    let written = controller
        .take_screenshot(&path.to_string_lossy(), request)
        .await?;

    println!("{}", written.display());
    Ok(())
}
