use std::time::Duration;

use thiserror::Error;

use crate::types::Rect;

/// Why a capture produced no pixels.
///
/// Every variant is terminal for the call. By the time one is returned, all
/// resources acquired by that call have been released.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no display given and DISPLAY is not set")]
    NoDisplay,

    #[error("cannot connect to display '{display}': {reason}")]
    ConnectionFailed { display: String, reason: String },

    #[error("region {region} does not fit the {screen_width}x{screen_height} screen")]
    RegionOutOfBounds {
        region: Rect,
        screen_width: u32,
        screen_height: u32,
    },

    #[error("shared memory setup failed: {0}")]
    ShmSetupFailed(String),

    #[error("image transfer failed: {0}")]
    GrabFailed(String),

    #[error("cannot allocate a buffer of {pixels} pixels")]
    OutOfMemory { pixels: usize },

    #[error("capture did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("capture worker failed: {0}")]
    WorkerFailed(String),
}

impl CaptureError {
    pub(crate) fn shm(reason: impl std::fmt::Display) -> Self {
        CaptureError::ShmSetupFailed(reason.to_string())
    }

    pub(crate) fn grab(reason: impl std::fmt::Display) -> Self {
        CaptureError::GrabFailed(reason.to_string())
    }
}
