//! Saver configuration.

use crate::error::SaverError;
use rigcap_capture::RigPosition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Location value that means "the robot has arrived at its destination node".
pub const DEFAULT_LOCATION_SENTINEL: &str = "none";

/// Configuration for [`crate::FrameSaver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaverConfig {
    /// Rig positions to buffer frames for.
    pub topic_prefixes: Vec<RigPosition>,
    /// Nominal camera frame rate in Hz.
    pub sensor_fps: f64,
    /// Allowed arrival spread within one frame set, in frames.
    pub max_frames_difference: f64,
    /// Location trigger value that starts a dump.
    pub location_sentinel: String,
    /// Root under which dated run directories are created.
    pub output_root: PathBuf,
}

impl Default for SaverConfig {
    fn default() -> Self {
        Self {
            topic_prefixes: ["top", "mid", "bot"].into_iter().map(RigPosition::from).collect(),
            sensor_fps: 6.0,
            max_frames_difference: 3.0,
            location_sentinel: DEFAULT_LOCATION_SENTINEL.to_string(),
            output_root: PathBuf::from("saved_data"),
        }
    }
}

impl SaverConfig {
    /// Load a configuration from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, SaverError> {
        let json = std::fs::read_to_string(path)?;
        let config: SaverConfig = serde_json::from_str(&json)?;
        Ok(config)
    }

    /// Maximum allowed spread between arrival times, in seconds.
    pub fn max_time_difference(&self) -> f64 {
        self.max_frames_difference / self.sensor_fps
    }

    pub fn sync_window(&self) -> SyncWindow {
        SyncWindow {
            sensor_fps: self.sensor_fps,
            max_time_difference: self.max_time_difference(),
        }
    }

    pub fn validate(&self) -> Result<(), SaverError> {
        if self.topic_prefixes.is_empty() {
            return Err(SaverError::Config("no topic prefixes configured".to_string()));
        }
        let mut seen = BTreeSet::new();
        for prefix in &self.topic_prefixes {
            if prefix.as_str().is_empty() {
                return Err(SaverError::Config("empty topic prefix".to_string()));
            }
            if !seen.insert(prefix) {
                return Err(SaverError::Config(format!("duplicate topic prefix '{}'", prefix)));
            }
        }
        if !(self.sensor_fps.is_finite() && self.sensor_fps > 0.0) {
            return Err(SaverError::Config(format!(
                "sensor_fps must be positive, got {}",
                self.sensor_fps
            )));
        }
        if !(self.max_frames_difference.is_finite() && self.max_frames_difference >= 0.0) {
            return Err(SaverError::Config(format!(
                "max_frames_difference must be non-negative, got {}",
                self.max_frames_difference
            )));
        }
        Ok(())
    }
}

/// Time budget a frame set must fit in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncWindow {
    pub sensor_fps: f64,
    pub max_time_difference: f64,
}

/// Parse a comma separated list of rig positions, e.g. `top,mid,bot`.
pub fn parse_prefixes(list: &str) -> Result<Vec<RigPosition>, SaverError> {
    let prefixes: Vec<RigPosition> = list
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(RigPosition::from)
        .collect();
    if prefixes.is_empty() {
        return Err(SaverError::Config(format!(
            "no topic prefixes in '{}'",
            list
        )));
    }
    Ok(prefixes)
}
