use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_PATHS: [&str; 3] = ["./xgrab.toml", "~/.config/xgrab/config.toml", "~/.xgrab.toml"];

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Display to capture from (e.g. ":0.0"). Falls back to $DISPLAY.
    pub display: Option<String>,

    /// Use the MIT-SHM extension when the server supports it
    pub use_shm: bool,

    /// Refuse captures larger than this many pixels
    pub max_pixels: Option<usize>,

    /// Give up waiting on the X server after this many milliseconds
    pub timeout_ms: Option<u64>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            display: None,
            use_shm: true,
            max_pixels: None,
            timeout_ms: Some(5000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// Directory for relative output paths (defaults to the temp dir)
    pub directory: Option<String>,
}

impl Config {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let config_path_to_load = match config_path {
            Some(path) => {
                if !Path::new(path).exists() {
                    anyhow::bail!("Config file '{}' does not exist", path);
                }
                Some(path.to_string())
            }
            None => DEFAULT_PATHS.iter().find_map(|path| {
                let expanded_path = shellexpand::tilde(path);
                if Path::new(expanded_path.as_ref()).exists() {
                    Some(expanded_path.to_string())
                } else {
                    None
                }
            }),
        };

        // If no config exists, create and save a default config
        let Some(path) = config_path_to_load else {
            let default_config = Self::default();

            let config_dir = dirs::home_dir()
                .map(|mut path| {
                    path.push(".config");
                    path.push("xgrab");
                    path
                })
                .unwrap_or_else(|| std::path::PathBuf::from("."));

            std::fs::create_dir_all(&config_dir).ok();

            let config_file = config_dir.join("config.toml");
            match default_config.save(&config_file.to_string_lossy()) {
                Ok(()) => tracing::info!(
                    "Created default configuration at: {}",
                    config_file.display()
                ),
                Err(e) => tracing::warn!("Could not save default config: {}", e),
            }

            return Ok(default_config);
        };

        tracing::debug!("Loading configuration from {}", path);
        let config_content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&config_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no capture could work with
    pub fn validate(&self) -> Result<()> {
        if let Some(display) = &self.capture.display {
            if display.trim().is_empty() {
                anyhow::bail!("capture.display must not be empty; remove it to use $DISPLAY");
            }
        }
        if self.capture.max_pixels == Some(0) {
            anyhow::bail!("capture.max_pixels must be greater than zero");
        }
        if self.capture.timeout_ms == Some(0) {
            anyhow::bail!("capture.timeout_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn load_with_overrides(
        config_path: Option<&str>,
        display_override: Option<String>,
        disable_shm: bool,
    ) -> Result<Self> {
        let mut config = Self::load(config_path)?;

        if let Some(display) = display_override {
            config.capture.display = Some(display);
        }

        if disable_shm {
            config.capture.use_shm = false;
        }

        config.validate()?;
        Ok(config)
    }

    /// Capture timeout, if one is configured
    pub fn timeout(&self) -> Option<std::time::Duration> {
        self.capture
            .timeout_ms
            .map(std::time::Duration::from_millis)
    }

    /// Output directory with `~` expanded
    pub fn output_directory(&self) -> Option<String> {
        self.output
            .directory
            .as_deref()
            .map(|dir| shellexpand::tilde(dir).into_owned())
    }
}
