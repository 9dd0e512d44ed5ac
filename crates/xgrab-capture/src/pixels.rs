//! Conversion of raw server pixels into packed 0xFFRRGGBB samples.

use crate::backend::PixelReader;
use crate::error::CaptureError;
use crate::types::ChannelMasks;

const OPAQUE: u32 = 0xff00_0000;

#[derive(Debug, Clone, Copy)]
struct Channel {
    mask: u32,
    shift: u32,
    bits: u32,
}

impl Channel {
    fn new(mask: u32) -> Self {
        Self {
            mask,
            shift: if mask == 0 { 0 } else { mask.trailing_zeros() },
            bits: mask.count_ones(),
        }
    }

    fn to_u8(self, raw: u32) -> u32 {
        if self.bits == 0 {
            return 0;
        }
        let value = (raw & self.mask) >> self.shift;
        if self.bits >= 8 {
            value >> (self.bits - 8)
        } else {
            let max = (1u32 << self.bits) - 1;
            (value * 255 + max / 2) / max
        }
    }
}

/// Maps raw pixels of a visual to ARGB.
#[derive(Debug, Clone, Copy)]
pub struct PixelFormat {
    red: Channel,
    green: Channel,
    blue: Channel,
    identity: bool,
}

impl PixelFormat {
    pub fn new(masks: ChannelMasks) -> Self {
        Self {
            red: Channel::new(masks.red),
            green: Channel::new(masks.green),
            blue: Channel::new(masks.blue),
            identity: masks == ChannelMasks::RGB888,
        }
    }

    /// Convert one raw pixel. The alpha byte is always 0xFF.
    #[inline]
    pub fn to_argb(&self, raw: u32) -> u32 {
        if self.identity {
            return raw | OPAQUE;
        }
        OPAQUE
            | (self.red.to_u8(raw) << 16)
            | (self.green.to_u8(raw) << 8)
            | self.blue.to_u8(raw)
    }
}

/// Allocate the destination buffer for `pixels` samples.
///
/// `limit` caps the buffer size; exceeding it is reported like a failed
/// allocation.
pub fn allocate(pixels: usize, limit: Option<usize>) -> Result<Vec<u32>, CaptureError> {
    if limit.is_some_and(|max| pixels > max) {
        return Err(CaptureError::OutOfMemory { pixels });
    }
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(pixels)
        .map_err(|_| CaptureError::OutOfMemory { pixels })?;
    Ok(buffer)
}

/// Walk `reader` top-to-bottom, left-to-right and append ARGB samples to
/// `buffer`.
pub fn convert(reader: &dyn PixelReader, format: &PixelFormat, buffer: &mut Vec<u32>) {
    for y in 0..reader.height() {
        for x in 0..reader.width() {
            buffer.push(format.to_argb(reader.pixel(x, y)));
        }
    }
}
