//! The seam between the grabber and a windowing system.
//!
//! Every handle returned here owns one server or OS resource and releases it
//! when dropped. Handles borrow the handle they were created from, so an image
//! cannot outlive its segment and a segment cannot outlive its connection.

use crate::error::CaptureError;
use crate::types::{Area, ScreenInfo};

/// Opens sessions with a windowing server.
pub trait DisplayServer: Send + Sync {
    fn connect(&self, display: &str) -> Result<Box<dyn DisplayConnection + '_>, CaptureError>;
}

/// An open session. Dropping it closes the connection.
pub trait DisplayConnection {
    /// Geometry and pixel format of the default screen.
    fn screen(&self) -> ScreenInfo;

    /// Whether the server offers shared-memory image transfer.
    fn supports_shm(&self) -> bool;

    /// Allocate a `width` x `height` image at screen depth backed by a shared
    /// memory segment that both this process and the server have attached.
    fn create_shm_image(
        &self,
        width: u16,
        height: u16,
    ) -> Result<Box<dyn ShmImage + '_>, CaptureError>;

    /// Fetch `area` of the root window through the connection itself.
    fn get_image(&self, area: Area) -> Result<Box<dyn PixelReader + '_>, CaptureError>;
}

/// An image living in shared memory. Dropping it detaches the segment from
/// the server and from this process.
pub trait ShmImage {
    /// Have the server fill the image from the root window at `(x, y)`.
    fn grab(&self, x: i16, y: i16) -> Result<Box<dyn PixelReader + '_>, CaptureError>;
}

/// Per-pixel access to a fetched image. Format and depth decoding is the
/// backend's business; `pixel` returns the raw value at screen depth.
pub trait PixelReader {
    fn width(&self) -> u16;
    fn height(&self) -> u16;
    fn pixel(&self, x: u16, y: u16) -> u32;
}
