//! Raw frame payloads and decoding into typed pixel buffers.

use crate::stream::{PixelFormat, StreamKind};
use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use thiserror::Error;

/// 16-bit single channel image (depth in millimetres).
pub type DepthImage = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Errors raised when a payload does not match its declared layout.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("stream {kind} expects {expected} but payload declares {declared}")]
    FormatMismatch {
        kind: StreamKind,
        expected: PixelFormat,
        declared: PixelFormat,
    },

    #[error("unknown pixel encoding '{0}'")]
    UnknownEncoding(String),

    #[error("frame has zero size ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    #[error("row step {step} is smaller than {min} bytes")]
    BadStep { step: usize, min: usize },

    #[error("payload holds {actual} bytes, expected at least {expected}")]
    ShortBuffer { expected: usize, actual: usize },
}

/// A frame payload as delivered by a transport, before decoding.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Row length in bytes, including any padding.
    pub step: usize,
    pub format: PixelFormat,
    /// Byte order of 16-bit samples.
    pub big_endian: bool,
    pub data: Vec<u8>,
}

impl RawFrame {
    /// Create a tightly packed little-endian payload.
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            step: width as usize * format.bytes_per_pixel(),
            format,
            big_endian: false,
            data,
        }
    }

    fn rows(&self) -> Result<impl Iterator<Item = &[u8]>, DecodeError> {
        if self.width == 0 || self.height == 0 {
            return Err(DecodeError::EmptyFrame {
                width: self.width,
                height: self.height,
            });
        }
        let overflow = || DecodeError::ShortBuffer {
            expected: usize::MAX,
            actual: self.data.len(),
        };
        let row_len = (self.width as usize)
            .checked_mul(self.format.bytes_per_pixel())
            .ok_or_else(overflow)?;
        if self.step < row_len {
            return Err(DecodeError::BadStep {
                step: self.step,
                min: row_len,
            });
        }
        // The last row does not need its padding.
        let expected = self
            .step
            .checked_mul(self.height as usize - 1)
            .and_then(|n| n.checked_add(row_len))
            .ok_or_else(overflow)?;
        if self.data.len() < expected {
            return Err(DecodeError::ShortBuffer {
                expected,
                actual: self.data.len(),
            });
        }
        Ok((0..self.height as usize).map(move |y| &self.data[y * self.step..y * self.step + row_len]))
    }
}

/// A decoded pixel buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameImage {
    /// 8-bit color, stored as RGB.
    Color(RgbImage),
    /// 8-bit single channel (infra-red).
    Mono8(GrayImage),
    /// 16-bit single channel (depth).
    Mono16(DepthImage),
}

impl FrameImage {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            FrameImage::Color(img) => img.dimensions(),
            FrameImage::Mono8(img) => img.dimensions(),
            FrameImage::Mono16(img) => img.dimensions(),
        }
    }

    /// Save losslessly; the format is picked from the path extension.
    pub fn save(&self, path: &std::path::Path) -> Result<(), image::ImageError> {
        match self {
            FrameImage::Color(img) => img.save(path),
            FrameImage::Mono8(img) => img.save(path),
            FrameImage::Mono16(img) => img.save(path),
        }
    }
}

/// Decode a raw payload for the given stream.
///
/// The declared format must equal [`StreamKind::expected_format`]. `bgr8`
/// payloads are swizzled to RGB so that saved images carry true colors.
pub fn decode(kind: StreamKind, raw: &RawFrame) -> Result<FrameImage, DecodeError> {
    let expected = kind.expected_format();
    if raw.format != expected {
        return Err(DecodeError::FormatMismatch {
            kind,
            expected,
            declared: raw.format,
        });
    }

    // Validate the layout against the payload before sizing any buffer; past
    // this point width * height * bpp is bounded by the payload length.
    let rows = raw.rows()?;
    let (width, height) = (raw.width, raw.height);
    let pixels = width as usize * height as usize;

    let image = match raw.format {
        PixelFormat::Bgr8 => {
            let mut buf = Vec::with_capacity(pixels * 3);
            for row in rows {
                for px in row.chunks_exact(3) {
                    buf.extend_from_slice(&[px[2], px[1], px[0]]);
                }
            }
            FrameImage::Color(RgbImage::from_raw(width, height, buf).ok_or_else(|| short(pixels * 3))?)
        }
        PixelFormat::Mono8 => {
            let mut buf = Vec::with_capacity(pixels);
            for row in rows {
                buf.extend_from_slice(row);
            }
            FrameImage::Mono8(GrayImage::from_raw(width, height, buf).ok_or_else(|| short(pixels))?)
        }
        PixelFormat::Mono16 => {
            let mut buf = Vec::with_capacity(pixels);
            for row in rows {
                buf.extend(row.chunks_exact(2).map(|b| {
                    if raw.big_endian {
                        u16::from_be_bytes([b[0], b[1]])
                    } else {
                        u16::from_le_bytes([b[0], b[1]])
                    }
                }));
            }
            FrameImage::Mono16(DepthImage::from_raw(width, height, buf).ok_or_else(|| short(pixels * 2))?)
        }
    };

    Ok(image)
}

fn short(expected: usize) -> DecodeError {
    DecodeError::ShortBuffer {
        expected,
        actual: 0,
    }
}
