//! Error types for saver operations.

use rigcap_capture::{CalibrationError, DecodeError, RigPosition, StreamKind};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while ingesting or dumping frames.
///
/// Per-position gate failures are not errors at this level; they are
/// reported as [`crate::GateError`] inside a dump report.
#[derive(Debug, Error)]
pub enum SaverError {
    #[error("failed to decode {position}/{kind} frame: {source}")]
    Decode {
        position: RigPosition,
        kind: StreamKind,
        #[source]
        source: DecodeError,
    },

    #[error("arrival time {arrived} of {position}/{kind} frame is not finite")]
    InvalidArrival {
        position: RigPosition,
        kind: StreamKind,
        arrived: f64,
    },

    #[error("unknown rig position '{0}'")]
    UnknownPosition(RigPosition),

    #[error("unsupported calibration for {position}/{kind}: {source}")]
    UnsupportedPayload {
        position: RigPosition,
        kind: StreamKind,
        #[source]
        source: CalibrationError,
    },

    #[error("malformed calibration for {position}/{kind}: {source}")]
    MalformedCalibration {
        position: RigPosition,
        kind: StreamKind,
        #[source]
        source: CalibrationError,
    },

    #[error("could not create a save folder in {path:?}: {reason}")]
    Directory { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SaverError {
    pub(crate) fn calibration(position: &RigPosition, kind: StreamKind, source: CalibrationError) -> Self {
        let position = position.clone();
        match source {
            CalibrationError::Unsupported(_) => SaverError::UnsupportedPayload {
                position,
                kind,
                source,
            },
            _ => SaverError::MalformedCalibration {
                position,
                kind,
                source,
            },
        }
    }
}
