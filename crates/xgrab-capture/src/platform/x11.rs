//! X11 backend using MIT-SHM when the server offers it.

use std::borrow::Cow;
use std::ptr;

use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::errors::ParseError;
use x11rb::image::{BitsPerPixel, Image, ImageOrder, ScanlinePad};
use x11rb::protocol::shm;
use x11rb::protocol::xproto::{self, ImageFormat, Screen};
use x11rb::rust_connection::RustConnection;

use crate::backend::{DisplayConnection, DisplayServer, PixelReader, ShmImage};
use crate::error::CaptureError;
use crate::types::{Area, ChannelMasks, ScreenInfo};

/// Talks to X servers over the X11 protocol.
#[derive(Debug, Default, Clone, Copy)]
pub struct X11Server;

impl DisplayServer for X11Server {
    fn connect(&self, name: &str) -> Result<Box<dyn DisplayConnection + '_>, CaptureError> {
        let failed = |reason: String| CaptureError::ConnectionFailed {
            display: name.to_string(),
            reason,
        };

        let (conn, screen_num) =
            RustConnection::connect(Some(name)).map_err(|e| failed(e.to_string()))?;
        let setup = conn.setup();
        let screen = setup
            .roots
            .get(screen_num)
            .ok_or_else(|| failed(format!("screen {} does not exist", screen_num)))?;
        let info = ScreenInfo {
            width: u32::from(screen.width_in_pixels),
            height: u32::from(screen.height_in_pixels),
            depth: screen.root_depth,
            root: screen.root,
            masks: root_masks(screen),
        };
        let layout = setup
            .pixmap_formats
            .iter()
            .find(|format| format.depth == info.depth)
            .map(|format| {
                ImageLayout::new(
                    format.bits_per_pixel,
                    format.scanline_pad,
                    setup.image_byte_order,
                )
            })
            .transpose()
            .map_err(|e| failed(format!("unsupported image format: {}", e)))?;

        debug!("Opened X11 display {}", name);
        Ok(Box::new(X11Connection {
            conn,
            display: name.to_string(),
            screen: info,
            layout,
        }))
    }
}

fn root_masks(screen: &Screen) -> ChannelMasks {
    let masks = screen
        .allowed_depths
        .iter()
        .flat_map(|depth| depth.visuals.iter())
        .find(|visual| visual.visual_id == screen.root_visual)
        .map(|visual| ChannelMasks {
            red: visual.red_mask,
            green: visual.green_mask,
            blue: visual.blue_mask,
        });

    match masks {
        Some(masks) if masks.red | masks.green | masks.blue != 0 => masks,
        _ => {
            warn!("Root visual has no channel masks, passing raw pixels through");
            ChannelMasks::RGB888
        }
    }
}

/// How the server lays out a ZPixmap image at screen depth.
#[derive(Debug, Clone, Copy)]
struct ImageLayout {
    bits_per_pixel: BitsPerPixel,
    scanline_pad: ScanlinePad,
    byte_order: ImageOrder,
}

impl ImageLayout {
    fn new(
        bits_per_pixel: u8,
        scanline_pad: u8,
        byte_order: xproto::ImageOrder,
    ) -> Result<Self, ParseError> {
        Ok(Self {
            bits_per_pixel: BitsPerPixel::try_from(bits_per_pixel)?,
            scanline_pad: ScanlinePad::try_from(scanline_pad)?,
            byte_order: ImageOrder::try_from(byte_order)?,
        })
    }

    fn stride(&self, width: u16) -> usize {
        let bits = usize::from(width) * usize::from(self.bits_per_pixel);
        let pad = usize::from(self.scanline_pad);
        (bits + pad - 1) / pad * pad / 8
    }

    /// View `data` as a `width`x`height` ZPixmap in this layout.
    fn decode(
        self,
        width: u16,
        height: u16,
        depth: u8,
        data: &[u8],
    ) -> Result<Image<'_>, CaptureError> {
        Image::new(
            width,
            height,
            self.scanline_pad,
            depth,
            self.bits_per_pixel,
            self.byte_order,
            Cow::Borrowed(data),
        )
        .map_err(CaptureError::grab)
    }
}

struct X11Connection {
    conn: RustConnection,
    display: String,
    screen: ScreenInfo,
    layout: Option<ImageLayout>,
}

impl Drop for X11Connection {
    fn drop(&mut self) {
        debug!("Closing X11 display {}", self.display);
    }
}

impl DisplayConnection for X11Connection {
    fn screen(&self) -> ScreenInfo {
        self.screen
    }

    fn supports_shm(&self) -> bool {
        match shm::query_version(&self.conn).map(|cookie| cookie.reply()) {
            Ok(Ok(version)) => {
                debug!(
                    "MIT-SHM {}.{} available",
                    version.major_version, version.minor_version
                );
                true
            }
            _ => {
                debug!("MIT-SHM not available on {}", self.display);
                false
            }
        }
    }

    fn create_shm_image(
        &self,
        width: u16,
        height: u16,
    ) -> Result<Box<dyn ShmImage + '_>, CaptureError> {
        let layout = self.layout.ok_or_else(|| {
            CaptureError::shm(format!("no pixmap format for depth {}", self.screen.depth))
        })?;
        let len = layout.stride(width) * usize::from(height);

        let mut memory = SysvSegment::create(len)?;
        let seg = self.conn.generate_id().map_err(CaptureError::shm)?;
        let id = u32::try_from(memory.id).map_err(CaptureError::shm)?;
        shm::attach(&self.conn, seg, id, false)
            .map_err(CaptureError::shm)?
            .check()
            .map_err(CaptureError::shm)?;
        // Both sides are attached; the kernel frees the segment after the
        // last detach even if this process dies first.
        memory.mark_removed();

        debug!("Attached {} byte shared segment 0x{:x}", len, seg);
        Ok(Box::new(X11ShmImage {
            connection: self,
            seg,
            memory,
            width,
            height,
            layout,
        }))
    }

    fn get_image(&self, area: Area) -> Result<Box<dyn PixelReader + '_>, CaptureError> {
        let (image, _visual) = Image::get(
            &self.conn,
            self.screen.root,
            area.x,
            area.y,
            area.width,
            area.height,
        )
        .map_err(CaptureError::grab)?;
        Ok(Box::new(image))
    }
}

struct X11ShmImage<'c> {
    connection: &'c X11Connection,
    seg: shm::Seg,
    memory: SysvSegment,
    width: u16,
    height: u16,
    layout: ImageLayout,
}

impl Drop for X11ShmImage<'_> {
    fn drop(&mut self) {
        // Wait for the server to let go before `memory` is unmapped.
        match shm::detach(&self.connection.conn, self.seg) {
            Ok(cookie) => {
                if let Err(e) = cookie.check() {
                    warn!("Server failed to detach segment 0x{:x}: {}", self.seg, e);
                }
            }
            Err(e) => warn!("Cannot detach segment 0x{:x}: {}", self.seg, e),
        }
        debug!("Detached shared segment 0x{:x}", self.seg);
    }
}

impl ShmImage for X11ShmImage<'_> {
    fn grab(&self, x: i16, y: i16) -> Result<Box<dyn PixelReader + '_>, CaptureError> {
        let reply = shm::get_image(
            &self.connection.conn,
            self.connection.screen.root,
            x,
            y,
            self.width,
            self.height,
            !0,
            ImageFormat::Z_PIXMAP.into(),
            self.seg,
            0,
        )
        .map_err(CaptureError::grab)?
        .reply()
        .map_err(CaptureError::grab)?;

        let image = self
            .layout
            .decode(self.width, self.height, reply.depth, self.memory.as_slice())?;
        Ok(Box::new(image))
    }
}

impl PixelReader for Image<'_> {
    fn width(&self) -> u16 {
        Image::width(self)
    }

    fn height(&self) -> u16 {
        Image::height(self)
    }

    fn pixel(&self, x: u16, y: u16) -> u32 {
        self.get_pixel(x, y)
    }
}

/// A System V shared memory segment attached to this process.
struct SysvSegment {
    id: libc::c_int,
    addr: *mut libc::c_void,
    len: usize,
    removed: bool,
}

impl SysvSegment {
    fn create(len: usize) -> Result<Self, CaptureError> {
        // SAFETY: plain syscall, no pointers involved.
        let id = unsafe { libc::shmget(libc::IPC_PRIVATE, len, libc::IPC_CREAT | 0o600) };
        if id < 0 {
            return Err(CaptureError::shm(format!(
                "shmget failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        // SAFETY: `id` is a segment we just created; a null address lets the
        // kernel pick the mapping.
        let addr = unsafe { libc::shmat(id, ptr::null(), 0) };
        if addr == libc::MAP_FAILED {
            let err = std::io::Error::last_os_error();
            // SAFETY: removing our own, unattached segment.
            unsafe { libc::shmctl(id, libc::IPC_RMID, ptr::null_mut()) };
            return Err(CaptureError::shm(format!("shmat failed: {}", err)));
        }

        Ok(Self {
            id,
            addr,
            len,
            removed: false,
        })
    }

    fn mark_removed(&mut self) {
        // SAFETY: `id` is our segment; it stays mapped until `shmdt`.
        unsafe { libc::shmctl(self.id, libc::IPC_RMID, ptr::null_mut()) };
        self.removed = true;
    }

    fn as_slice(&self) -> &[u8] {
        // SAFETY: `addr` maps `len` bytes for as long as `self` lives.
        unsafe { std::slice::from_raw_parts(self.addr as *const u8, self.len) }
    }

    #[cfg(test)]
    fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` makes the borrow unique.
        unsafe { std::slice::from_raw_parts_mut(self.addr as *mut u8, self.len) }
    }
}

impl Drop for SysvSegment {
    fn drop(&mut self) {
        // SAFETY: `addr` came from a successful `shmat` and is detached once.
        unsafe {
            libc::shmdt(self.addr);
            if !self.removed {
                libc::shmctl(self.id, libc::IPC_RMID, ptr::null_mut());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixels::PixelFormat;

    fn layout(bits_per_pixel: u8, byte_order: xproto::ImageOrder) -> ImageLayout {
        ImageLayout::new(bits_per_pixel, 32, byte_order).unwrap()
    }

    #[test]
    fn test_stride_32bpp() {
        assert_eq!(layout(32, xproto::ImageOrder::LSB_FIRST).stride(100), 400);
    }

    #[test]
    fn test_stride_pads_scanlines() {
        let layout16 = layout(16, xproto::ImageOrder::LSB_FIRST);
        assert_eq!(layout16.stride(3), 8);
        assert_eq!(layout16.stride(4), 8);

        assert_eq!(layout(24, xproto::ImageOrder::MSB_FIRST).stride(5), 16);
    }

    #[test]
    fn test_layout_rejects_unknown_formats() {
        assert!(ImageLayout::new(12, 32, xproto::ImageOrder::LSB_FIRST).is_err());
        assert!(ImageLayout::new(32, 24, xproto::ImageOrder::LSB_FIRST).is_err());
        assert!(ImageLayout::new(32, 32, xproto::ImageOrder::from(7u8)).is_err());
    }

    #[test]
    fn test_segment_lifecycle() {
        let mut segment = SysvSegment::create(4096).unwrap();
        assert_eq!(segment.as_slice().len(), 4096);
        assert!(segment.as_slice().iter().all(|&b| b == 0));
        segment.mark_removed();
    }

    #[test]
    fn test_image_reader_decodes_lsb_first() {
        let data = vec![0x11, 0x22, 0x33, 0x00, 0x44, 0x55, 0x66, 0x00];
        let image = Image::new(
            2,
            1,
            ScanlinePad::Pad32,
            24,
            BitsPerPixel::B32,
            ImageOrder::LsbFirst,
            Cow::Owned(data),
        )
        .unwrap();
        let reader: &dyn PixelReader = &image;
        assert_eq!((reader.width(), reader.height()), (2, 1));
        assert_eq!(reader.pixel(0, 0), 0x0033_2211);
        assert_eq!(reader.pixel(1, 0), 0x0066_5544);
    }

    #[test]
    fn test_decode_segment_32bpp() {
        let layout = layout(32, xproto::ImageOrder::LSB_FIRST);
        let (width, height) = (3u16, 2u16);
        let mut segment = SysvSegment::create(layout.stride(width) * usize::from(height)).unwrap();
        for (i, chunk) in segment.as_mut_slice().chunks_exact_mut(4).enumerate() {
            let value = 0x5a00_0000 | (i as u32 * 0x0001_0203);
            chunk.copy_from_slice(&value.to_le_bytes());
        }

        let shared = layout.decode(width, height, 24, segment.as_slice()).unwrap();
        let copied = Image::new(
            width,
            height,
            ScanlinePad::Pad32,
            24,
            BitsPerPixel::B32,
            ImageOrder::LsbFirst,
            Cow::Owned(segment.as_slice().to_vec()),
        )
        .unwrap();

        assert_eq!(shared.pixel(0, 0), 0x5a00_0000);
        assert_eq!(shared.pixel(1, 1), 0x5a00_0000 | (4 * 0x0001_0203));
        for y in 0..height {
            for x in 0..width {
                assert_eq!(shared.pixel(x, y), copied.pixel(x, y));
            }
        }
        segment.mark_removed();
    }

    #[test]
    fn test_decode_segment_rgb565_skips_padding() {
        let layout = layout(16, xproto::ImageOrder::LSB_FIRST);
        let (width, height) = (3u16, 2u16);
        let stride = layout.stride(width);
        let mut segment = SysvSegment::create(stride * usize::from(height)).unwrap();
        {
            let data = segment.as_mut_slice();
            data[0..2].copy_from_slice(&0xf800u16.to_le_bytes());
            data[2..4].copy_from_slice(&0x07e0u16.to_le_bytes());
            data[4..6].copy_from_slice(&0x001fu16.to_le_bytes());
            // scanline padding
            data[6..8].copy_from_slice(&[0xff, 0xff]);
            data[stride..stride + 2].copy_from_slice(&0xffffu16.to_le_bytes());
        }

        let image = layout.decode(width, height, 16, segment.as_slice()).unwrap();
        let format = PixelFormat::new(ChannelMasks::RGB565);
        let argb = |x, y| format.to_argb(image.pixel(x, y));
        assert_eq!(argb(0, 0), 0xffff_0000);
        assert_eq!(argb(1, 0), 0xff00_ff00);
        assert_eq!(argb(2, 0), 0xff00_00ff);
        assert_eq!(argb(0, 1), 0xffff_ffff);
        assert_eq!(argb(1, 1), 0xff00_0000);
        segment.mark_removed();
    }

    #[test]
    fn test_decode_msb_first() {
        let layout = layout(16, xproto::ImageOrder::MSB_FIRST);
        let data = [0xf8, 0x00, 0x00, 0x1f];
        let image = layout.decode(2, 1, 16, &data).unwrap();
        assert_eq!(image.pixel(0, 0), 0xf800);
        assert_eq!(image.pixel(1, 0), 0x001f);
    }

    #[test]
    fn test_decode_short_buffer_is_grab_failure() {
        let layout = layout(32, xproto::ImageOrder::LSB_FIRST);
        let result = layout.decode(4, 4, 24, &[0u8; 16]);
        assert!(matches!(result, Err(CaptureError::GrabFailed(_))));
    }
}
