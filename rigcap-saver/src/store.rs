//! Per-position frame store.
//!
//! Each rig position owns one [`PositionState`]: a fixed slot per stream kind
//! holding the latest frame and its freshness flag, plus the latest calibration.
//! Frames are immutable once stored, so a snapshot shares them through `Arc`
//! instead of copying pixel data.

use rigcap_capture::{CalibrationPayload, Extrinsics, FrameImage, Intrinsics, RigPosition, StreamKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A decoded frame with its provenance and arrival time.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub position: RigPosition,
    pub kind: StreamKind,
    pub image: FrameImage,
    /// Arrival time, seconds since the UNIX epoch.
    pub arrived: f64,
}

/// The latest sample for one stream kind.
#[derive(Debug, Clone, Default)]
pub enum FrameSlot {
    #[default]
    Empty,
    Filled {
        frame: Arc<Frame>,
        /// A new frame arrived since the last accepted dump.
        fresh: bool,
    },
}

impl FrameSlot {
    pub fn frame(&self) -> Option<&Arc<Frame>> {
        match self {
            FrameSlot::Empty => None,
            FrameSlot::Filled { frame, .. } => Some(frame),
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, FrameSlot::Filled { fresh: true, .. })
    }
}

/// Latest calibration for one stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamCalibration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extrinsic: Option<Extrinsics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intrinsic: Option<Intrinsics>,
}

/// Calibration per stream kind for one rig position.
pub type CalibrationInfo = BTreeMap<StreamKind, StreamCalibration>;

/// Mutable state for one rig position.
#[derive(Debug, Clone, Default)]
pub struct PositionState {
    slots: [FrameSlot; StreamKind::COUNT],
    calibration: CalibrationInfo,
}

impl PositionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot for the frame's kind and mark it fresh.
    pub fn store(&mut self, frame: Frame) {
        let index = frame.kind.index();
        self.slots[index] = FrameSlot::Filled {
            frame: Arc::new(frame),
            fresh: true,
        };
    }

    pub fn update_calibration(&mut self, kind: StreamKind, payload: CalibrationPayload) {
        let entry = self.calibration.entry(kind).or_default();
        match payload {
            CalibrationPayload::Intrinsic(intrinsics) => entry.intrinsic = Some(intrinsics),
            CalibrationPayload::Extrinsic(extrinsics) => entry.extrinsic = Some(extrinsics),
        }
    }

    pub fn slot(&self, kind: StreamKind) -> &FrameSlot {
        &self.slots[kind.index()]
    }

    pub fn freshness(&self) -> [bool; StreamKind::COUNT] {
        std::array::from_fn(|i| self.slots[i].is_fresh())
    }

    /// Clear every freshness flag so the next dump needs new frames.
    pub fn mark_consumed(&mut self) {
        for slot in &mut self.slots {
            if let FrameSlot::Filled { fresh, .. } = slot {
                *fresh = false;
            }
        }
    }

    pub fn snapshot(&self, position: &RigPosition) -> PositionSnapshot {
        PositionSnapshot {
            position: position.clone(),
            frames: std::array::from_fn(|i| self.slots[i].frame().cloned()),
            fresh: self.freshness(),
            calibration: self.calibration.clone(),
        }
    }
}

/// Immutable copy of a position's state taken at dump time.
#[derive(Debug, Clone)]
pub struct PositionSnapshot {
    pub position: RigPosition,
    pub frames: [Option<Arc<Frame>>; StreamKind::COUNT],
    pub fresh: [bool; StreamKind::COUNT],
    pub calibration: CalibrationInfo,
}

impl PositionSnapshot {
    pub fn frame(&self, kind: StreamKind) -> Option<&Arc<Frame>> {
        self.frames[kind.index()].as_ref()
    }

    pub fn is_fresh(&self, kind: StreamKind) -> bool {
        self.fresh[kind.index()]
    }

    /// Frames present in the snapshot, in stream order.
    pub fn present(&self) -> impl Iterator<Item = &Arc<Frame>> {
        self.frames.iter().flatten()
    }
}
