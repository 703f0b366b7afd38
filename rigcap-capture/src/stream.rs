//! Identifiers for rig positions, stream kinds and pixel encodings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A physical camera mounting location on the rig (e.g. "top", "mid", "bot").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RigPosition(String);

impl RigPosition {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RigPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RigPosition {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Category of sensor output produced by every camera on the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Color,
    Depth,
    DepthAligned,
    Infra1,
    Infra2,
}

impl StreamKind {
    /// Number of stream kinds.
    pub const COUNT: usize = 5;

    /// Every stream kind, in slot order. A complete frame set holds one of each.
    pub const ALL: [StreamKind; Self::COUNT] = [
        StreamKind::Color,
        StreamKind::Depth,
        StreamKind::DepthAligned,
        StreamKind::Infra1,
        StreamKind::Infra2,
    ];

    /// Slot index into fixed per-kind arrays.
    pub fn index(self) -> usize {
        match self {
            StreamKind::Color => 0,
            StreamKind::Depth => 1,
            StreamKind::DepthAligned => 2,
            StreamKind::Infra1 => 3,
            StreamKind::Infra2 => 4,
        }
    }

    /// Name used in file names and calibration JSON keys.
    pub fn name(self) -> &'static str {
        match self {
            StreamKind::Color => "color",
            StreamKind::Depth => "depth",
            StreamKind::DepthAligned => "depth_aligned",
            StreamKind::Infra1 => "infra1",
            StreamKind::Infra2 => "infra2",
        }
    }

    /// The pixel encoding a payload for this stream must declare.
    pub fn expected_format(self) -> PixelFormat {
        match self {
            StreamKind::Color => PixelFormat::Bgr8,
            StreamKind::Depth | StreamKind::DepthAligned => PixelFormat::Mono16,
            StreamKind::Infra1 | StreamKind::Infra2 => PixelFormat::Mono8,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StreamKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StreamKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown stream kind '{}'", s))
    }
}

/// Declared pixel encoding of a raw frame payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Bgr8,
    Mono8,
    Mono16,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgr8 => 3,
            PixelFormat::Mono8 => 1,
            PixelFormat::Mono16 => 2,
        }
    }

    pub fn encoding(self) -> &'static str {
        match self {
            PixelFormat::Bgr8 => "bgr8",
            PixelFormat::Mono8 => "mono8",
            PixelFormat::Mono16 => "mono16",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encoding())
    }
}

impl FromStr for PixelFormat {
    type Err = crate::frame::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bgr8" | "8UC3" => Ok(PixelFormat::Bgr8),
            "mono8" | "8UC1" => Ok(PixelFormat::Mono8),
            "mono16" | "16UC1" => Ok(PixelFormat::Mono16),
            other => Err(crate::frame::DecodeError::UnknownEncoding(other.to_string())),
        }
    }
}
