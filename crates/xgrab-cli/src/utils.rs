//! Utility functions for the xgrab CLI.

use xgrab_capture::GrabOptions;
use xgrab_config::Config;

/// Translate the capture section of the config into grabber options.
pub fn grab_options(config: &Config) -> GrabOptions {
    GrabOptions {
        display: config.capture.display.clone(),
        use_shm: config.capture.use_shm,
        max_pixels: config.capture.max_pixels,
    }
}

/// Initialize logging based on CLI verbosity settings.
pub fn initialize_logging(verbose: bool) {
    use tracing_subscriber::filter::Directive;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = if verbose { "debug" } else { "info" };
    let targets = ["xgrab", "xgrab_cli", "xgrab_capture", "xgrab_config"];

    let filter = targets
        .iter()
        .filter_map(|target| format!("{}={}", target, level).parse::<Directive>().ok())
        .fold(EnvFilter::from_default_env(), |filter, directive| {
            filter.add_directive(directive)
        });

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grab_options_follow_config() {
        let mut config = Config::default();
        config.capture.display = Some(":3".to_string());
        config.capture.use_shm = false;
        config.capture.max_pixels = Some(42);

        let options = grab_options(&config);
        assert_eq!(options.display.as_deref(), Some(":3"));
        assert!(!options.use_shm);
        assert_eq!(options.max_pixels, Some(42));
    }
}
