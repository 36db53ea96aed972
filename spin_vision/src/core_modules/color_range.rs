// THEORY:
// A `ColorRange` is the closed HSV box that defines "this pixel belongs to a
// marker". It is the one parameter the user tunes most: either by typing bounds
// directly or by clicking on a marker during calibration.
//
// The range is deliberately permissive about its own shape. A lower bound above
// an upper bound is legal and simply matches nothing, so every frame reports
// the marker as not found. That is a valid (if useless) configuration, not an
// error; the pipeline only warns about it.

use crate::core_modules::hsv::{Hsv, HsvImage, MAX_HUE};
use crate::error::{Result, VisionError};
use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

/// Mask value for pixels inside the range.
pub const MASK_ON: u8 = 255;

/// Inclusive HSV bounds, each triple ordered `[hue, saturation, value]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

/// Half-widths used when a range is grown around a single picked colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvTolerance {
    pub hue: u8,
    pub saturation: u8,
    pub value: u8,
}

impl Default for HsvTolerance {
    fn default() -> Self {
        Self {
            hue: 10,
            saturation: 50,
            value: 50,
        }
    }
}

impl Default for ColorRange {
    /// The yellow marker band the lab sheet ships with.
    fn default() -> Self {
        Self::new([25, 100, 100], [35, 255, 255])
    }
}

impl ColorRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    /// Builds a range centred on `hsv`, clamped to the representable bounds.
    pub fn around(hsv: Hsv, tolerance: HsvTolerance) -> Self {
        let widen = |centre: u8, half_width: u8, max: u8| {
            (
                centre.saturating_sub(half_width),
                centre.saturating_add(half_width).min(max),
            )
        };
        let (h_lo, h_hi) = widen(hsv.hue, tolerance.hue, MAX_HUE);
        let (s_lo, s_hi) = widen(hsv.saturation, tolerance.saturation, u8::MAX);
        let (v_lo, v_hi) = widen(hsv.value, tolerance.value, u8::MAX);
        Self::new([h_lo, s_lo, v_lo], [h_hi, s_hi, v_hi])
    }

    #[inline]
    pub fn contains(&self, hsv: Hsv) -> bool {
        let pixel = hsv.as_array();
        (0..3).all(|c| self.lower[c] <= pixel[c] && pixel[c] <= self.upper[c])
    }

    /// True when some channel has `lower > upper`, so nothing can match.
    pub fn is_empty(&self) -> bool {
        (0..3).any(|c| self.lower[c] > self.upper[c])
    }

    /// Rejects hue bounds above 179. Saturation and value use the full byte.
    pub fn validate(&self) -> Result<()> {
        if self.lower[0] > MAX_HUE || self.upper[0] > MAX_HUE {
            return Err(VisionError::InvalidParameters(format!(
                "hue bounds must lie in [0, {MAX_HUE}], got {}..={}",
                self.lower[0], self.upper[0]
            )));
        }
        Ok(())
    }

    /// Binary in-range mask: `MASK_ON` inside the range, 0 elsewhere.
    pub fn mask(&self, hsv: &HsvImage) -> GrayImage {
        GrayImage::from_fn(hsv.width, hsv.height, |x, y| {
            if self.contains(hsv.get(x, y)) {
                Luma([MASK_ON])
            } else {
                Luma([0])
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::frame::FrameView;
    use crate::core_modules::hsv::convert_rgb_to_hsv;
    use image::{Rgb, RgbImage};

    #[test]
    fn bounds_are_inclusive() {
        let range = ColorRange::new([25, 100, 100], [35, 255, 255]);
        assert!(range.contains(Hsv::new(25, 100, 100)));
        assert!(range.contains(Hsv::new(35, 255, 255)));
        assert!(!range.contains(Hsv::new(24, 200, 200)));
        assert!(!range.contains(Hsv::new(30, 99, 200)));
    }

    #[test]
    fn inverted_range_is_empty_and_matches_nothing() {
        let range = ColorRange::new([40, 0, 0], [30, 255, 255]);
        assert!(range.is_empty());
        assert!(!range.contains(Hsv::new(35, 128, 128)));
        assert!(range.validate().is_ok());
    }

    #[test]
    fn hue_above_179_is_rejected() {
        let range = ColorRange::new([170, 0, 0], [180, 255, 255]);
        assert!(matches!(
            range.validate(),
            Err(VisionError::InvalidParameters(_))
        ));
    }

    #[test]
    fn around_clamps_at_the_edges() {
        let range = ColorRange::around(Hsv::new(175, 20, 240), HsvTolerance::default());
        assert_eq!(range.lower, [165, 0, 190]);
        assert_eq!(range.upper, [179, 70, 255]);
    }

    #[test]
    fn mask_selects_matching_pixels_only() {
        let mut image = RgbImage::from_pixel(3, 1, Rgb([0, 0, 0]));
        image.put_pixel(1, 0, Rgb([255, 255, 0]));
        let mask = ColorRange::default().mask(&convert_rgb_to_hsv(&FrameView::whole(&image)));
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
        assert_eq!(mask.get_pixel(1, 0).0[0], MASK_ON);
        assert_eq!(mask.get_pixel(2, 0).0[0], 0);
    }
}
