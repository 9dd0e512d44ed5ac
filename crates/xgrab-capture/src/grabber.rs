//! Region capture with a shared-memory fast path and a direct fallback.

use std::time::Instant;

use tracing::{debug, info};

use crate::backend::{DisplayConnection, DisplayServer, PixelReader};
use crate::error::CaptureError;
use crate::pixels::{self, PixelFormat};
use crate::types::{Area, Capture, CaptureRequest, ScreenInfo, Transport};

/// Tunables for a [`ScreenGrabber`].
#[derive(Debug, Clone)]
pub struct GrabOptions {
    /// Display used when a request names none. `None` means `$DISPLAY`.
    pub display: Option<String>,
    /// Use MIT-SHM when the server offers it.
    pub use_shm: bool,
    /// Largest buffer, in pixels, a single capture may allocate.
    pub max_pixels: Option<usize>,
}

impl Default for GrabOptions {
    fn default() -> Self {
        Self {
            display: None,
            use_shm: true,
            max_pixels: None,
        }
    }
}

/// Pick the display to talk to: the explicit name, else `$DISPLAY`.
pub fn resolve_display(explicit: Option<&str>) -> Result<String, CaptureError> {
    resolve_display_with(explicit, |key| std::env::var(key).ok())
}

fn resolve_display_with<F>(explicit: Option<&str>, env: F) -> Result<String, CaptureError>
where
    F: FnOnce(&str) -> Option<String>,
{
    match explicit.filter(|name| !name.is_empty()) {
        Some(name) => Ok(name.to_string()),
        None => env("DISPLAY")
            .filter(|name| !name.is_empty())
            .ok_or(CaptureError::NoDisplay),
    }
}

/// Captures screen regions through a [`DisplayServer`].
///
/// Each call opens its own connection and tears everything down before it
/// returns; nothing is shared between calls.
pub struct ScreenGrabber<S> {
    server: S,
    options: GrabOptions,
}

impl<S: DisplayServer> ScreenGrabber<S> {
    pub fn new(server: S, options: GrabOptions) -> Self {
        Self { server, options }
    }

    /// Query the default screen of `display` (or the default display).
    pub fn screen_info(&self, display: Option<&str>) -> Result<ScreenInfo, CaptureError> {
        let name = self.display_name(display)?;
        let connection = self.server.connect(&name)?;
        Ok(connection.screen())
    }

    /// Capture the requested region as 0xFFRRGGBB samples.
    pub fn capture(&self, request: &CaptureRequest) -> Result<Capture, CaptureError> {
        let started = Instant::now();
        let name = self.display_name(request.display.as_deref())?;

        let connection = self.server.connect(&name)?;
        let screen = connection.screen();
        debug!(
            "Display {}: {}x{} depth {} root 0x{:x}",
            name, screen.width, screen.height, screen.depth, screen.root
        );

        let area = request.region.within(screen.width, screen.height)?;
        let format = PixelFormat::new(screen.masks);

        let (pixels, transport) = if self.options.use_shm && connection.supports_shm() {
            (self.grab_shm(connection.as_ref(), area, &format)?, Transport::SharedMemory)
        } else {
            (self.grab_direct(connection.as_ref(), area, &format)?, Transport::Direct)
        };

        info!(
            "Captured {} from {} via {} in {:?}",
            request.region,
            name,
            transport,
            started.elapsed()
        );
        Ok(Capture::new(
            u32::from(area.width),
            u32::from(area.height),
            transport,
            pixels,
        ))
    }

    fn display_name(&self, requested: Option<&str>) -> Result<String, CaptureError> {
        let requested = requested.filter(|name| !name.is_empty());
        resolve_display(requested.or(self.options.display.as_deref()))
    }

    fn grab_shm(
        &self,
        connection: &dyn DisplayConnection,
        area: Area,
        format: &PixelFormat,
    ) -> Result<Vec<u32>, CaptureError> {
        debug!("Using shared memory transfer");
        let image = connection.create_shm_image(area.width, area.height)?;
        let reader = image.grab(area.x, area.y)?;
        self.convert(reader.as_ref(), area, format)
    }

    fn grab_direct(
        &self,
        connection: &dyn DisplayConnection,
        area: Area,
        format: &PixelFormat,
    ) -> Result<Vec<u32>, CaptureError> {
        debug!("Using direct image transfer");
        let reader = connection.get_image(area)?;
        self.convert(reader.as_ref(), area, format)
    }

    fn convert(
        &self,
        reader: &dyn PixelReader,
        area: Area,
        format: &PixelFormat,
    ) -> Result<Vec<u32>, CaptureError> {
        if reader.width() != area.width || reader.height() != area.height {
            return Err(CaptureError::grab(format!(
                "server returned {}x{} instead of {}x{}",
                reader.width(),
                reader.height(),
                area.width,
                area.height
            )));
        }
        let mut buffer = pixels::allocate(area.pixel_count(), self.options.max_pixels)?;
        pixels::convert(reader, format, &mut buffer);
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_display_wins() {
        let name = resolve_display_with(Some(":1"), |_| Some(":0".to_string())).unwrap();
        assert_eq!(name, ":1");
    }

    #[test]
    fn test_environment_fallback() {
        let name = resolve_display_with(None, |key| {
            assert_eq!(key, "DISPLAY");
            Some(":0.0".to_string())
        })
        .unwrap();
        assert_eq!(name, ":0.0");
    }

    #[test]
    fn test_empty_names_are_missing() {
        assert!(matches!(
            resolve_display_with(Some(""), |_| None),
            Err(CaptureError::NoDisplay)
        ));
        assert!(matches!(
            resolve_display_with(None, |_| Some(String::new())),
            Err(CaptureError::NoDisplay)
        ));
        assert!(matches!(
            resolve_display_with(Some(""), |_| Some(":2".to_string())),
            Ok(name) if name == ":2"
        ));
    }
}
