//! Rigcap Saver - synchronized frame dumps for a multi-camera rig
//!
//! Buffers the latest color, depth, aligned depth and both infra-red frames for
//! every rig position, and on request writes each complete, fresh and
//! time-coherent set to disk together with its calibration.
//!
//! ## Example
//!
//! ```ignore
//! use rigcap_saver::{DumpTrigger, FrameSaver, SaverConfig};
//!
//! let saver = FrameSaver::new(SaverConfig::default())?;
//! saver.ingest(&position, kind, &raw)?;
//! if let Some(report) = saver.dump_on(&DumpTrigger::Location(location))? {
//!     println!("saved {} positions", report.saved_count());
//! }
//! ```

mod clock;
mod config;
mod error;
mod gate;
mod layout;
mod preview;
mod saver;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DEFAULT_LOCATION_SENTINEL, SaverConfig, SyncWindow, parse_prefixes};
pub use error::SaverError;
pub use gate::{GateError, check};
pub use layout::SaveLayout;
pub use preview::{PREVIEW_SLOTS, PreviewError, PreviewRing, PreviewSink, colorize_depth, jet, render_mosaic};
pub use saver::{DumpReport, DumpTrigger, FrameSaver, PositionOutcome, camera_info_json};
pub use store::{CalibrationInfo, Frame, FrameSlot, PositionSnapshot, PositionState, StreamCalibration};
