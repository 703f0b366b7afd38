//! Live preview mosaic of recently saved color and depth frames.

use crate::store::Frame;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use rigcap_capture::{DepthImage, FrameImage};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

/// Number of historical samples kept per modality.
pub const PREVIEW_SLOTS: usize = 4;

/// Tile origins (row, column) in the 2x4 grid, per history slot.
const COLOR_TILES: [(u32, u32); PREVIEW_SLOTS] = [(0, 0), (0, 2), (1, 0), (1, 2)];
const DEPTH_TILES: [(u32, u32); PREVIEW_SLOTS] = [(0, 1), (0, 3), (1, 1), (1, 3)];

/// Fixed-size history, newest last. Pushing evicts the oldest slot.
#[derive(Debug, Clone)]
pub struct PreviewRing<T> {
    slots: VecDeque<Option<T>>,
}

impl<T> PreviewRing<T> {
    pub fn new() -> Self {
        Self {
            slots: (0..PREVIEW_SLOTS).map(|_| None).collect(),
        }
    }

    /// Append a sample and return whatever fell out of the oldest slot.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = self.slots.pop_front().flatten();
        self.slots.push_back(Some(value));
        evicted
    }

    pub fn slots(&self) -> impl Iterator<Item = Option<&T>> {
        self.slots.iter().map(Option::as_ref)
    }

    pub fn newest(&self) -> Option<&T> {
        self.slots.iter().rev().flatten().next()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

impl<T> Default for PreviewRing<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors raised while publishing a preview.
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("preview receiver is busy")]
    Full,

    #[error("preview receiver disconnected")]
    Disconnected,
}

/// Destination for rendered mosaics.
pub trait PreviewSink: Send + Sync {
    fn publish(&self, mosaic: RgbImage) -> Result<(), PreviewError>;
}

impl PreviewSink for crossbeam_channel::Sender<RgbImage> {
    fn publish(&self, mosaic: RgbImage) -> Result<(), PreviewError> {
        self.try_send(mosaic).map_err(|e| match e {
            crossbeam_channel::TrySendError::Full(_) => PreviewError::Full,
            crossbeam_channel::TrySendError::Disconnected(_) => PreviewError::Disconnected,
        })
    }
}

/// Render the 2x4 mosaic of color and depth history.
///
/// Tiles are half the size of the newest color frame. Returns `None` while
/// either history is empty.
pub fn render_mosaic(
    color: &PreviewRing<Arc<Frame>>,
    depth: &PreviewRing<Arc<Frame>>,
) -> Option<RgbImage> {
    if color.is_empty() || depth.is_empty() {
        return None;
    }

    let (width, height) = color.newest()?.image.dimensions();
    let (tile_w, tile_h) = ((width / 2).max(1), (height / 2).max(1));
    let mut canvas = RgbImage::new(tile_w * 4, tile_h * 2);

    for (frame, &(row, col)) in color.slots().zip(COLOR_TILES.iter()) {
        if let Some(FrameImage::Color(img)) = frame.map(|f| &f.image) {
            let tile = imageops::resize(img, tile_w, tile_h, FilterType::Triangle);
            imageops::replace(&mut canvas, &tile, (col * tile_w) as i64, (row * tile_h) as i64);
        }
    }

    for (frame, &(row, col)) in depth.slots().zip(DEPTH_TILES.iter()) {
        if let Some(FrameImage::Mono16(img)) = frame.map(|f| &f.image) {
            let colored = colorize_depth(img);
            let tile = imageops::resize(&colored, tile_w, tile_h, FilterType::Nearest);
            imageops::replace(&mut canvas, &tile, (col * tile_w) as i64, (row * tile_h) as i64);
        }
    }

    Some(canvas)
}

/// Stretch depth to its own min..max range and apply the JET colormap.
pub fn colorize_depth(depth: &DepthImage) -> RgbImage {
    let (lo, hi) = depth
        .pixels()
        .fold((u16::MAX, u16::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    let range = hi.saturating_sub(lo) as f32;

    RgbImage::from_fn(depth.width(), depth.height(), |x, y| {
        let v = depth.get_pixel(x, y).0[0];
        let t = if range > 0.0 {
            (v - lo) as f32 / range
        } else {
            0.0
        };
        jet(t)
    })
}

/// JET colormap: dark blue at 0, through cyan, yellow, to dark red at 1.
pub fn jet(t: f32) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    let channel = |center: f32| ((1.5 - (4.0 * t - center).abs()).clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}
