//! xgrab-capture - grab a region of an X11 screen as packed ARGB pixels.

pub mod backend;
pub mod controller;
pub mod error;
pub mod export;
pub mod grabber;
pub mod mock;
pub mod pixels;
pub mod platform;
pub mod types;

pub use backend::{DisplayConnection, DisplayServer, PixelReader, ShmImage};
pub use controller::{BlockingCapture, ScreenCapture};
pub use error::CaptureError;
pub use grabber::{resolve_display, GrabOptions, ScreenGrabber};
pub use types::{Capture, CaptureRequest, ChannelMasks, Rect, ScreenInfo, Transport};

use anyhow::Result;
use std::time::Duration;

/// Grabber for the platform's native display server.
#[cfg(target_os = "linux")]
pub fn create_grabber(options: GrabOptions) -> ScreenGrabber<platform::x11::X11Server> {
    ScreenGrabber::new(platform::x11::X11Server, options)
}

/// Capture a region of the default display with default options.
#[cfg(target_os = "linux")]
pub fn grab_screen(x: i32, y: i32, width: i32, height: i32) -> Result<Capture, CaptureError> {
    create_grabber(GrabOptions::default()).capture(&CaptureRequest::new(x, y, width, height))
}

// Platform-specific constructor
pub fn create_controller(
    options: GrabOptions,
    timeout: Option<Duration>,
) -> Result<Box<dyn ScreenCapture>> {
    #[cfg(target_os = "linux")]
    {
        let mut controller = BlockingCapture::new(create_grabber(options));
        if let Some(timeout) = timeout {
            controller = controller.with_timeout(timeout);
        }
        Ok(Box::new(controller))
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = (options, timeout);
        anyhow::bail!("Unsupported platform: screen capture needs an X11 display")
    }
}
