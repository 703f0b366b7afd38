//! Common capture source types and traits.

use crate::frame::RawFrame;
use crate::stream::{RigPosition, StreamKind};
use thiserror::Error;

/// Errors that can occur during capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Failed to capture frame: {0}")]
    CaptureFailed(String),

    #[error("Stream ended")]
    StreamEnded,
}

/// Raw frame data from a capture source.
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Undecoded payload.
    pub raw: RawFrame,
    /// Frame timestamp in seconds (relative to stream start).
    pub timestamp: f64,
    /// Frame number.
    pub frame_number: u64,
}

impl FrameData {
    pub fn new(raw: RawFrame, timestamp: f64, frame_number: u64) -> Self {
        Self {
            raw,
            timestamp,
            frame_number,
        }
    }

    /// Get image dimensions (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        (self.raw.width, self.raw.height)
    }
}

/// Trait for sources that deliver frames for one (rig position, stream) pair.
///
/// `next_frame` may block until the next frame is due.
pub trait CaptureSource: Send {
    /// The rig position and stream this source feeds.
    fn stream(&self) -> (&RigPosition, StreamKind);

    /// Get the next frame from the source. `Ok(None)` once stopped.
    fn next_frame(&mut self) -> Result<Option<FrameData>, CaptureError>;

    /// Get the frame rate, if known.
    fn frame_rate(&self) -> Option<f32>;

    /// Get the resolution (width, height).
    fn resolution(&self) -> (u32, u32);

    /// Check if the source is still active.
    fn is_active(&self) -> bool;

    /// Stop capturing.
    fn stop(&mut self);
}
