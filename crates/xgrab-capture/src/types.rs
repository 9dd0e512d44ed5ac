use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CaptureError;

/// A rectangle in display pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Validate the rectangle against a screen and narrow it to protocol sizes.
    ///
    /// The rectangle must be non-empty, start at a non-negative origin and lie
    /// entirely inside `screen_width` x `screen_height`.
    pub fn within(&self, screen_width: u32, screen_height: u32) -> Result<Area, CaptureError> {
        let out_of_bounds = || CaptureError::RegionOutOfBounds {
            region: *self,
            screen_width,
            screen_height,
        };

        if self.x < 0 || self.y < 0 || self.width <= 0 || self.height <= 0 {
            return Err(out_of_bounds());
        }

        // i64 so that x + width cannot overflow
        let right = i64::from(self.x) + i64::from(self.width);
        let bottom = i64::from(self.y) + i64::from(self.height);
        if right > i64::from(screen_width) || bottom > i64::from(screen_height) {
            return Err(out_of_bounds());
        }

        Ok(Area {
            x: i16::try_from(self.x).map_err(|_| out_of_bounds())?,
            y: i16::try_from(self.y).map_err(|_| out_of_bounds())?,
            width: u16::try_from(self.width).map_err(|_| out_of_bounds())?,
            height: u16::try_from(self.height).map_err(|_| out_of_bounds())?,
        })
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// A validated, non-empty region of the root window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

impl Area {
    pub fn pixel_count(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }
}

/// What to capture and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Display name such as `:0.0`. `None` falls back to the grabber default,
    /// then to `$DISPLAY`.
    pub display: Option<String>,
    pub region: Rect,
}

impl CaptureRequest {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            display: None,
            region: Rect::new(x, y, width, height),
        }
    }

    pub fn on_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }
}

/// Bit masks of the red, green and blue channels in a raw pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMasks {
    pub red: u32,
    pub green: u32,
    pub blue: u32,
}

impl ChannelMasks {
    /// 24-bit TrueColor, 0x00RRGGBB.
    pub const RGB888: ChannelMasks = ChannelMasks {
        red: 0x00ff_0000,
        green: 0x0000_ff00,
        blue: 0x0000_00ff,
    };

    /// 16-bit TrueColor, RRRRRGGGGGGBBBBB.
    pub const RGB565: ChannelMasks = ChannelMasks {
        red: 0xf800,
        green: 0x07e0,
        blue: 0x001f,
    };
}

impl Default for ChannelMasks {
    fn default() -> Self {
        Self::RGB888
    }
}

/// Geometry and pixel format of a display's default screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenInfo {
    pub width: u32,
    pub height: u32,
    pub depth: u8,
    pub root: u32,
    pub masks: ChannelMasks,
}

/// How the pixels travelled from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transport {
    SharedMemory,
    Direct,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::SharedMemory => f.write_str("shm"),
            Transport::Direct => f.write_str("direct"),
        }
    }
}

/// A captured region: `width * height` samples of 0xFFRRGGBB, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    width: u32,
    height: u32,
    transport: Transport,
    pixels: Vec<u32>,
}

impl Capture {
    pub(crate) fn new(width: u32, height: u32, transport: Transport, pixels: Vec<u32>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize);
        Self {
            width,
            height,
            transport,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn into_pixels(self) -> Vec<u32> {
        self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_inside_screen() {
        let area = Rect::new(0, 0, 100, 100).within(1920, 1080).unwrap();
        assert_eq!(area.pixel_count(), 10_000);
        assert_eq!((area.x, area.y, area.width, area.height), (0, 0, 100, 100));
    }

    #[test]
    fn test_region_touching_edges_is_valid() {
        assert!(Rect::new(1820, 980, 100, 100).within(1920, 1080).is_ok());
        assert!(Rect::new(0, 0, 1920, 1080).within(1920, 1080).is_ok());
    }

    #[test]
    fn test_region_past_right_edge() {
        let err = Rect::new(1900, 0, 100, 100).within(1920, 1080).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::RegionOutOfBounds {
                screen_width: 1920,
                screen_height: 1080,
                ..
            }
        ));
    }

    #[test]
    fn test_region_past_bottom_edge() {
        assert!(Rect::new(0, 1000, 10, 81).within(1920, 1080).is_err());
    }

    #[test]
    fn test_empty_and_negative_regions() {
        assert!(Rect::new(0, 0, 0, 10).within(1920, 1080).is_err());
        assert!(Rect::new(0, 0, 10, 0).within(1920, 1080).is_err());
        assert!(Rect::new(-1, 0, 10, 10).within(1920, 1080).is_err());
        assert!(Rect::new(0, -5, 10, 10).within(1920, 1080).is_err());
        assert!(Rect::new(0, 0, -10, 10).within(1920, 1080).is_err());
    }

    #[test]
    fn test_region_sum_does_not_overflow() {
        assert!(Rect::new(i32::MAX, 0, i32::MAX, 1).within(1920, 1080).is_err());
    }

    #[test]
    fn test_rect_display() {
        assert_eq!(Rect::new(10, 20, 300, 200).to_string(), "300x200+10+20");
    }
}
