//! Camera calibration messages.
//!
//! Transports deliver calibration as a loosely typed [`CalibrationMessage`]
//! (a kind tag plus named parameter arrays). [`CalibrationPayload`] is the
//! validated form stored by the saver.

use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while validating a calibration message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("unsupported calibration payload '{0}'")]
    Unsupported(String),

    #[error("calibration field '{0}' is missing")]
    MissingField(&'static str),

    #[error("calibration field '{field}' has {actual} values, expected {expected}")]
    FieldLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// A calibration message as delivered by a transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationMessage {
    /// "intrinsic" or "extrinsic".
    pub kind: String,
    pub fields: BTreeMap<String, Vec<f64>>,
}

impl CalibrationMessage {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.fields.insert(name.into(), values);
        self
    }

    fn vec(&self, field: &'static str) -> Result<Vec<f64>, CalibrationError> {
        self.fields
            .get(field)
            .cloned()
            .ok_or(CalibrationError::MissingField(field))
    }

    fn array<const N: usize>(&self, field: &'static str) -> Result<[f64; N], CalibrationError> {
        let values = self.vec(field)?;
        let actual = values.len();
        values.try_into().map_err(|_| CalibrationError::FieldLength {
            field,
            expected: N,
            actual,
        })
    }
}

/// Pinhole intrinsics with distortion, in the camera-info layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    /// Distortion coefficients (model dependent length).
    #[serde(rename = "D")]
    pub d: Vec<f64>,
    /// 3x3 camera matrix, row-major.
    #[serde(rename = "K")]
    pub k: [f64; 9],
    /// 3x3 rectification matrix, row-major.
    #[serde(rename = "R")]
    pub r: [f64; 9],
    /// 3x4 projection matrix, row-major.
    #[serde(rename = "P")]
    pub p: [f64; 12],
}

/// Rigid transform from the depth imager to another imager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extrinsics {
    /// 3x3 rotation, column-major.
    pub rotation: [f64; 9],
    /// Translation in metres.
    pub translation: [f64; 3],
}

impl Extrinsics {
    pub fn identity() -> Self {
        Self {
            rotation: DMat3::IDENTITY.to_cols_array(),
            translation: [0.0; 3],
        }
    }

    pub fn rotation_matrix(&self) -> DMat3 {
        DMat3::from_cols_array(&self.rotation)
    }

    /// Map a point from the source imager frame into the target imager frame.
    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.rotation_matrix() * point + DVec3::from_array(self.translation)
    }
}

/// Validated calibration update.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationPayload {
    Intrinsic(Intrinsics),
    Extrinsic(Extrinsics),
}

impl TryFrom<&CalibrationMessage> for CalibrationPayload {
    type Error = CalibrationError;

    fn try_from(msg: &CalibrationMessage) -> Result<Self, Self::Error> {
        match msg.kind.as_str() {
            "intrinsic" => Ok(CalibrationPayload::Intrinsic(Intrinsics {
                d: msg.vec("D")?,
                k: msg.array("K")?,
                r: msg.array("R")?,
                p: msg.array("P")?,
            })),
            "extrinsic" => Ok(CalibrationPayload::Extrinsic(Extrinsics {
                rotation: msg.array("rotation")?,
                translation: msg.array("translation")?,
            })),
            other => Err(CalibrationError::Unsupported(other.to_string())),
        }
    }
}
