//! Async front for the blocking grabber.
//!
//! The grabber never times out on its own: a hung server blocks the calling
//! thread. [`BlockingCapture`] runs each grab on tokio's blocking pool and,
//! when a timeout is set, stops waiting for it. The abandoned worker keeps
//! running until the server answers, and whatever it holds is released then.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::backend::DisplayServer;
use crate::error::CaptureError;
use crate::export;
use crate::grabber::ScreenGrabber;
use crate::types::{Capture, CaptureRequest, ScreenInfo};

#[async_trait]
pub trait ScreenCapture: Send + Sync {
    /// Capture a region as 0xFFRRGGBB samples
    async fn capture(&self, request: CaptureRequest) -> Result<Capture, CaptureError>;

    /// Geometry and pixel format of a display's default screen
    async fn screen_info(&self, display: Option<String>) -> Result<ScreenInfo, CaptureError>;

    /// Capture a region and write it to `path`, returning the file written
    async fn take_screenshot(&self, path: &str, request: CaptureRequest) -> anyhow::Result<PathBuf>;
}

pub struct BlockingCapture<S> {
    grabber: Arc<ScreenGrabber<S>>,
    timeout: Option<Duration>,
    output_dir: Option<String>,
}

impl<S: DisplayServer + 'static> BlockingCapture<S> {
    pub fn new(grabber: ScreenGrabber<S>) -> Self {
        Self {
            grabber: Arc::new(grabber),
            timeout: None,
            output_dir: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Directory that relative screenshot paths are resolved against
    pub fn with_output_dir(mut self, dir: impl Into<String>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    async fn run<T, F>(&self, job: F) -> Result<T, CaptureError>
    where
        F: FnOnce(&ScreenGrabber<S>) -> Result<T, CaptureError> + Send + 'static,
        T: Send + 'static,
    {
        let grabber = Arc::clone(&self.grabber);
        let task = tokio::task::spawn_blocking(move || job(&grabber));

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("Capture exceeded {:?}, abandoning worker", limit);
                    return Err(CaptureError::TimedOut(limit));
                }
            },
            None => task.await,
        };
        joined.map_err(|e| CaptureError::WorkerFailed(e.to_string()))?
    }
}

#[async_trait]
impl<S: DisplayServer + 'static> ScreenCapture for BlockingCapture<S> {
    async fn capture(&self, request: CaptureRequest) -> Result<Capture, CaptureError> {
        self.run(move |grabber| grabber.capture(&request)).await
    }

    async fn screen_info(&self, display: Option<String>) -> Result<ScreenInfo, CaptureError> {
        self.run(move |grabber| grabber.screen_info(display.as_deref()))
            .await
    }

    async fn take_screenshot(&self, path: &str, request: CaptureRequest) -> anyhow::Result<PathBuf> {
        let path = export::resolve_output_path(path, self.output_dir.as_deref());
        let capture = self.capture(request).await?;
        let written = tokio::task::spawn_blocking(move || export::save(&capture, &path)).await??;
        Ok(written)
    }
}
