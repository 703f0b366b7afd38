//! Completeness, freshness and sync checks for a position snapshot.

use crate::config::SyncWindow;
use crate::store::PositionSnapshot;
use rigcap_capture::{RigPosition, StreamKind};
use thiserror::Error;

/// Why a position's frame set was not saved.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GateError {
    #[error("not all '{position}' camera frames have arrived (missing {})", kind_list(.missing))]
    Incomplete {
        position: RigPosition,
        missing: Vec<StreamKind>,
    },

    #[error("'{position}' frame set has not changed since last save (stale {})", kind_list(.stale))]
    Stale {
        position: RigPosition,
        stale: Vec<StreamKind>,
    },

    #[error("'{position}' frame sync disparity too large at {frames:.1} frames ({spread:.3}s)")]
    Skew {
        position: RigPosition,
        /// Seconds between the oldest and newest frame.
        spread: f64,
        /// The same spread in sensor frames.
        frames: f64,
    },
}

fn kind_list(kinds: &[StreamKind]) -> String {
    kinds.iter().map(|k| k.name()).collect::<Vec<_>>().join(", ")
}

/// Decide whether a snapshot may be dumped.
///
/// Every stream kind must be present and fresh, and all arrival times must
/// fall within `window.max_time_difference` of each other.
pub fn check(snapshot: &PositionSnapshot, window: &SyncWindow) -> Result<(), GateError> {
    let missing: Vec<StreamKind> = StreamKind::ALL
        .into_iter()
        .filter(|&kind| snapshot.frame(kind).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(GateError::Incomplete {
            position: snapshot.position.clone(),
            missing,
        });
    }

    let stale: Vec<StreamKind> = StreamKind::ALL
        .into_iter()
        .filter(|&kind| !snapshot.is_fresh(kind))
        .collect();
    if !stale.is_empty() {
        return Err(GateError::Stale {
            position: snapshot.position.clone(),
            stale,
        });
    }

    let (oldest, newest) = snapshot
        .present()
        .map(|frame| frame.arrived)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| (lo.min(t), hi.max(t)));
    // f64::min/max skip NaN, so a non-finite arrival has to be caught here.
    let spread = if snapshot.present().all(|frame| frame.arrived.is_finite()) {
        newest - oldest
    } else {
        f64::NAN
    };
    if spread.is_nan() || spread > window.max_time_difference {
        return Err(GateError::Skew {
            position: snapshot.position.clone(),
            spread,
            frames: spread * window.sensor_fps,
        });
    }

    Ok(())
}
