//! Synthetic rig source that produces paced gradient frames.
//!
//! Stands in for camera drivers so the saver can be exercised end to end
//! without hardware.

use crate::calibration::CalibrationMessage;
use crate::frame::RawFrame;
use crate::source::{CaptureError, CaptureSource, FrameData};
use crate::stream::{PixelFormat, RigPosition, StreamKind};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Paced generator for one (rig position, stream) pair.
pub struct SyntheticSource {
    position: RigPosition,
    kind: StreamKind,
    width: u32,
    height: u32,
    fps: f32,
    start_time: Instant,
    frame_count: u64,
    frame_limit: Option<u64>,
    active: bool,
}

impl SyntheticSource {
    pub fn new(position: RigPosition, kind: StreamKind, width: u32, height: u32, fps: f32) -> Self {
        info!("Synthetic source {}/{} at {}x{} @ {} fps", position, kind, width, height, fps);
        Self {
            position,
            kind,
            width,
            height,
            fps,
            start_time: Instant::now(),
            frame_count: 0,
            frame_limit: None,
            active: true,
        }
    }

    /// End the stream after `limit` frames.
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    /// Build the payload for frame `n` without pacing.
    pub fn render(&self, n: u64) -> RawFrame {
        let format = self.kind.expected_format();
        let (w, h) = (self.width as usize, self.height as usize);
        let mut data = Vec::with_capacity(w * h * format.bytes_per_pixel());
        let shift = n as usize;

        for y in 0..h {
            for x in 0..w {
                let column = (x + shift) % w;
                match format {
                    PixelFormat::Bgr8 => {
                        let b = (column * 255 / w) as u8;
                        let g = (y * 255 / h) as u8;
                        data.extend_from_slice(&[b, g, 128]);
                    }
                    PixelFormat::Mono8 => {
                        data.push(((x + y + shift) % 256) as u8);
                    }
                    PixelFormat::Mono16 => {
                        // A tilted plane between 0.5 m and ~2.5 m.
                        let depth = 500 + (column * 2000 / w) as u16;
                        data.extend_from_slice(&depth.to_le_bytes());
                    }
                }
            }
        }

        RawFrame::packed(self.width, self.height, format, data)
    }
}

impl CaptureSource for SyntheticSource {
    fn stream(&self) -> (&RigPosition, StreamKind) {
        (&self.position, self.kind)
    }

    fn next_frame(&mut self) -> Result<Option<FrameData>, CaptureError> {
        if !self.active {
            return Ok(None);
        }
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::CaptureFailed(format!(
                "zero-sized {}/{} frame",
                self.position, self.kind
            )));
        }
        if self.frame_limit.is_some_and(|limit| self.frame_count >= limit) {
            return Err(CaptureError::StreamEnded);
        }

        if self.fps > 0.0 {
            let due = self.start_time + Duration::from_secs_f32(self.frame_count as f32 / self.fps);
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }

        let timestamp = self.start_time.elapsed().as_secs_f64();
        let raw = self.render(self.frame_count);
        self.frame_count += 1;

        debug!(
            "Synthesized {}/{} frame {} at {:.3}s",
            self.position, self.kind, self.frame_count, timestamp
        );

        Ok(Some(FrameData::new(raw, timestamp, self.frame_count)))
    }

    fn frame_rate(&self) -> Option<f32> {
        Some(self.fps)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn stop(&mut self) {
        self.active = false;
        info!(
            "Synthetic source {}/{} stopped after {} frames",
            self.position, self.kind, self.frame_count
        );
    }
}

/// Calibration messages a camera publishes for one stream.
///
/// Every stream gets intrinsics; color and both infra-red streams also get
/// the depth-to-stream extrinsics.
pub fn synthetic_calibration(kind: StreamKind, width: u32, height: u32) -> Vec<CalibrationMessage> {
    let (fx, fy) = (width as f64 * 0.9, width as f64 * 0.9);
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);

    let mut messages = vec![
        CalibrationMessage::new("intrinsic")
            .with_field("D", vec![0.0; 5])
            .with_field("K", vec![fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0])
            .with_field("R", vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
            .with_field("P", vec![fx, 0.0, cx, 0.0, 0.0, fy, cy, 0.0, 0.0, 0.0, 1.0, 0.0]),
    ];

    let baseline = match kind {
        StreamKind::Color => Some(0.015),
        StreamKind::Infra1 => Some(0.0),
        StreamKind::Infra2 => Some(-0.05),
        StreamKind::Depth | StreamKind::DepthAligned => None,
    };
    if let Some(tx) = baseline {
        messages.push(
            CalibrationMessage::new("extrinsic")
                .with_field("rotation", vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
                .with_field("translation", vec![tx, 0.0, 0.0]),
        );
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationPayload;
    use crate::frame::{FrameImage, decode};

    #[test]
    fn test_rendered_frames_decode_for_every_stream() {
        for kind in StreamKind::ALL {
            let source = SyntheticSource::new(RigPosition::new("top"), kind, 8, 4, 0.0);
            let image = decode(kind, &source.render(3)).unwrap();
            assert_eq!(image.dimensions(), (8, 4));
            if kind == StreamKind::Depth {
                assert!(matches!(image, FrameImage::Mono16(_)));
            }
        }
    }

    #[test]
    fn test_next_frame_counts_and_stops() {
        let mut source = SyntheticSource::new(RigPosition::new("mid"), StreamKind::Infra1, 4, 4, 0.0);
        let first = source.next_frame().unwrap().unwrap();
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(first.frame_number, 1);
        assert_eq!(second.frame_number, 2);
        assert!(second.timestamp >= first.timestamp);

        source.stop();
        assert!(!source.is_active());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_frame_limit_ends_stream() {
        let mut source =
            SyntheticSource::new(RigPosition::new("bot"), StreamKind::Color, 2, 2, 0.0).with_frame_limit(1);
        assert!(source.next_frame().unwrap().is_some());
        assert!(matches!(source.next_frame(), Err(CaptureError::StreamEnded)));
    }

    #[test]
    fn test_zero_size_fails() {
        let mut source = SyntheticSource::new(RigPosition::new("bot"), StreamKind::Depth, 0, 2, 0.0);
        assert!(matches!(source.next_frame(), Err(CaptureError::CaptureFailed(_))));
    }

    #[test]
    fn test_synthetic_calibration_validates() {
        let color = synthetic_calibration(StreamKind::Color, 640, 480);
        assert_eq!(color.len(), 2);
        for msg in &color {
            assert!(CalibrationPayload::try_from(msg).is_ok());
        }
        assert_eq!(synthetic_calibration(StreamKind::Depth, 640, 480).len(), 1);
    }
}
