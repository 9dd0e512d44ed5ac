#![allow(dead_code)]
//! Mock Display Server for Testing
//!
//! An in-memory stand-in for an X server. It renders pixels from a content
//! function, can be told to fail at any acquisition step, and records every
//! resource it hands out in a [`ResourceLedger`] so tests can check that a
//! capture released everything, and in the right order.
//!
//! # Example
//!
//! ```rust,ignore
//! use xgrab_capture::mock::{FailurePoint, MockDisplayServer};
//!
//! let server = MockDisplayServer::new(1920, 1080).failing_at(FailurePoint::ShmGrab);
//! let ledger = server.ledger();
//! let grabber = ScreenGrabber::new(server, GrabOptions::default());
//! assert!(grabber.capture(&CaptureRequest::new(0, 0, 10, 10).on_display(":0")).is_err());
//! assert_eq!(ledger.outstanding(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::backend::{DisplayConnection, DisplayServer, PixelReader, ShmImage};
use crate::error::CaptureError;
use crate::types::{Area, ChannelMasks, ScreenInfo};

/// A step at which the mock can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    Connect,
    ShmSetup,
    ShmGrab,
    DirectGrab,
}

/// The kind of resource an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Connection,
    Segment,
    Image,
}

/// One acquisition or release, in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Acquired(Resource),
    Released(Resource),
}

/// Shared record of every resource handed out by a [`MockDisplayServer`].
#[derive(Debug, Clone, Default)]
pub struct ResourceLedger {
    events: Arc<Mutex<Vec<Event>>>,
    live: Arc<AtomicUsize>,
    connects: Arc<AtomicUsize>,
}

impl ResourceLedger {
    fn acquire(&self, resource: Resource) {
        self.live.fetch_add(1, Ordering::SeqCst);
        self.push(Event::Acquired(resource));
    }

    fn release(&self, resource: Resource) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.push(Event::Released(resource));
    }

    fn push(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// Resources acquired but not yet released.
    pub fn outstanding(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Number of connections ever opened.
    pub fn connections_opened(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Whether `resource` was ever acquired.
    pub fn acquired(&self, resource: Resource) -> bool {
        self.events().contains(&Event::Acquired(resource))
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
        self.live.store(0, Ordering::SeqCst);
        self.connects.store(0, Ordering::SeqCst);
    }
}

type Content = Arc<dyn Fn(u32, u32) -> u32 + Send + Sync>;

/// A configurable fake windowing server.
pub struct MockDisplayServer {
    screen: ScreenInfo,
    shm: bool,
    failure: Option<FailurePoint>,
    content: Content,
    latency: Option<Duration>,
    ledger: ResourceLedger,
}

impl MockDisplayServer {
    /// A 24-bit TrueColor screen of the given size with SHM support. The
    /// default content leaves garbage in the top byte so alpha forcing is
    /// observable.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            screen: ScreenInfo {
                width,
                height,
                depth: 24,
                root: 0x1a5,
                masks: ChannelMasks::RGB888,
            },
            shm: true,
            failure: None,
            content: Arc::new(|x, y| {
                0x5a00_0000 | ((x & 0xff) << 16) | ((y & 0xff) << 8) | ((x ^ y) & 0xff)
            }),
            latency: None,
            ledger: ResourceLedger::default(),
        }
    }

    pub fn without_shm(mut self) -> Self {
        self.shm = false;
        self
    }

    pub fn failing_at(mut self, point: FailurePoint) -> Self {
        self.failure = Some(point);
        self
    }

    pub fn with_depth(mut self, depth: u8, masks: ChannelMasks) -> Self {
        self.screen.depth = depth;
        self.screen.masks = masks;
        self
    }

    pub fn with_content<F>(mut self, content: F) -> Self
    where
        F: Fn(u32, u32) -> u32 + Send + Sync + 'static,
    {
        self.content = Arc::new(content);
        self
    }

    /// Block every connect for `latency`, simulating a slow server.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn ledger(&self) -> ResourceLedger {
        self.ledger.clone()
    }

    fn fails_at(&self, point: FailurePoint) -> bool {
        self.failure == Some(point)
    }
}

impl DisplayServer for MockDisplayServer {
    fn connect(&self, display: &str) -> Result<Box<dyn DisplayConnection + '_>, CaptureError> {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        if self.fails_at(FailurePoint::Connect) {
            return Err(CaptureError::ConnectionFailed {
                display: display.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        self.ledger.connects.fetch_add(1, Ordering::SeqCst);
        self.ledger.acquire(Resource::Connection);
        Ok(Box::new(MockConnection { server: self }))
    }
}

struct MockConnection<'s> {
    server: &'s MockDisplayServer,
}

impl Drop for MockConnection<'_> {
    fn drop(&mut self) {
        self.server.ledger.release(Resource::Connection);
    }
}

impl DisplayConnection for MockConnection<'_> {
    fn screen(&self) -> ScreenInfo {
        self.server.screen
    }

    fn supports_shm(&self) -> bool {
        self.server.shm
    }

    fn create_shm_image(
        &self,
        width: u16,
        height: u16,
    ) -> Result<Box<dyn ShmImage + '_>, CaptureError> {
        if self.server.fails_at(FailurePoint::ShmSetup) {
            return Err(CaptureError::shm("shmget: no space left on device"));
        }
        self.server.ledger.acquire(Resource::Segment);
        Ok(Box::new(MockSegment {
            server: self.server,
            width,
            height,
        }))
    }

    fn get_image(&self, area: Area) -> Result<Box<dyn PixelReader + '_>, CaptureError> {
        if self.server.fails_at(FailurePoint::DirectGrab) {
            return Err(CaptureError::grab("BadMatch"));
        }
        Ok(MockImage::acquire(self.server, area))
    }
}

struct MockSegment<'s> {
    server: &'s MockDisplayServer,
    width: u16,
    height: u16,
}

impl Drop for MockSegment<'_> {
    fn drop(&mut self) {
        self.server.ledger.release(Resource::Segment);
    }
}

impl ShmImage for MockSegment<'_> {
    fn grab(&self, x: i16, y: i16) -> Result<Box<dyn PixelReader + '_>, CaptureError> {
        if self.server.fails_at(FailurePoint::ShmGrab) {
            return Err(CaptureError::grab("BadAccess"));
        }
        let area = Area {
            x,
            y,
            width: self.width,
            height: self.height,
        };
        Ok(MockImage::acquire(self.server, area))
    }
}

struct MockImage<'s> {
    server: &'s MockDisplayServer,
    area: Area,
}

impl<'s> MockImage<'s> {
    fn acquire(server: &'s MockDisplayServer, area: Area) -> Box<dyn PixelReader + 's> {
        server.ledger.acquire(Resource::Image);
        Box::new(MockImage { server, area })
    }
}

impl Drop for MockImage<'_> {
    fn drop(&mut self) {
        self.server.ledger.release(Resource::Image);
    }
}

impl PixelReader for MockImage<'_> {
    fn width(&self) -> u16 {
        self.area.width
    }

    fn height(&self) -> u16 {
        self.area.height
    }

    fn pixel(&self, x: u16, y: u16) -> u32 {
        let sx = self.area.x as u32 + u32::from(x);
        let sy = self.area.y as u32 + u32::from(y);
        (self.server.content)(sx, sy)
    }
}
