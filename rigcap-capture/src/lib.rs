//! Rigcap Capture - frame and calibration inputs for the rig saver
//!
//! This crate describes what arrives from the cameras before the saver sees it:
//!
//! - Rig positions, stream kinds and pixel encodings
//! - Raw frame payloads and decoding into typed pixel buffers
//! - Calibration messages (intrinsics and extrinsics)
//! - The `CaptureSource` trait and a synthetic source for running without hardware
//!
//! ## Example
//!
//! ```ignore
//! use rigcap_capture::{CaptureSource, RigPosition, StreamKind, SyntheticSource, decode};
//!
//! let mut source = SyntheticSource::new(RigPosition::new("top"), StreamKind::Depth, 640, 480, 6.0);
//! while let Some(frame) = source.next_frame()? {
//!     let image = decode(StreamKind::Depth, &frame.raw)?;
//!     // Process image...
//! }
//! ```

mod calibration;
mod frame;
mod source;
mod stream;
mod synthetic;

pub use calibration::{CalibrationError, CalibrationMessage, CalibrationPayload, Extrinsics, Intrinsics};
pub use frame::{DecodeError, DepthImage, FrameImage, RawFrame, decode};
pub use source::{CaptureError, CaptureSource, FrameData};
pub use stream::{PixelFormat, RigPosition, StreamKind};
pub use synthetic::{SyntheticSource, synthetic_calibration};
