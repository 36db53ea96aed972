// THEORY:
// A `Frame` is one decoded image from the recorded clip together with its
// position in the clip. Time is never stored; it is derived from the index and
// the source's frame rate, so two frames can never disagree about when they
// happened.
//
// The `Roi` restricts detection to part of a frame, typically the air table
// itself, so that a yellow sleeve or a sticker on the launcher outside the
// table cannot be mistaken for a marker. Cropping yields a borrowed view: the
// pixels are never copied.

use crate::error::{Result, VisionError};
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// An immutable decoded frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Zero-based position of the frame in the source.
    pub index: usize,
    /// Pixels in RGB order.
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: usize, image: RgbImage) -> Self {
        Self { index, image }
    }

    /// Seconds since the first frame of the source.
    pub fn timestamp(&self, frame_rate: f64) -> f64 {
        self.index as f64 / frame_rate
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// The region detection runs on: the ROI if one is set, else the whole frame.
    ///
    /// The ROI must have been validated against this frame's size.
    pub fn crop(&self, roi: Option<&Roi>) -> FrameView<'_> {
        match roi {
            Some(roi) => FrameView {
                image: &self.image,
                origin: roi.origin(),
                width: roi.width(),
                height: roi.height(),
            },
            None => FrameView::whole(&self.image),
        }
    }
}

/// A borrowed rectangular window into an image. Coordinates passed to
/// `get_pixel` are relative to the window's origin.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    image: &'a RgbImage,
    origin: (u32, u32),
    width: u32,
    height: u32,
}

impl<'a> FrameView<'a> {
    pub fn whole(image: &'a RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            image,
            origin: (0, 0),
            width,
            height,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Position of the window's top-left corner in the underlying image.
    pub fn origin(&self) -> (u32, u32) {
        self.origin
    }

    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Rgb<u8> {
        *self.image.get_pixel(self.origin.0 + x, self.origin.1 + y)
    }
}

/// Axis-aligned region of interest, half-open: `x_min..x_max`, `y_min..y_max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl Roi {
    pub const fn new(x_min: u32, y_min: u32, x_max: u32, y_max: u32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    pub fn width(&self) -> u32 {
        self.x_max.saturating_sub(self.x_min)
    }

    pub fn height(&self) -> u32 {
        self.y_max.saturating_sub(self.y_min)
    }

    /// Offset of the crop's origin inside the full frame.
    pub fn origin(&self) -> (u32, u32) {
        (self.x_min, self.y_min)
    }

    /// Checks `x_min < x_max <= width` and `y_min < y_max <= height`.
    pub fn validate(&self, width: u32, height: u32) -> Result<()> {
        if self.x_min >= self.x_max || self.y_min >= self.y_max {
            return Err(VisionError::InvalidParameters(format!(
                "ROI must have positive extent, got x {}..{} y {}..{}",
                self.x_min, self.x_max, self.y_min, self.y_max
            )));
        }
        if self.x_max > width || self.y_max > height {
            return Err(VisionError::InvalidParameters(format!(
                "ROI x {}..{} y {}..{} exceeds the {width}x{height} frame",
                self.x_min, self.x_max, self.y_min, self.y_max
            )));
        }
        Ok(())
    }
}
