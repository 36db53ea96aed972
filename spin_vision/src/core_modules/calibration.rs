// THEORY:
// Colour ranges are easiest to get right by pointing at the marker in a real
// frame. A `CalibrationSession` holds that interaction:
//
// 1.  `reference_frame` pulls one frame (normally the first frame of the
//     analysis window) from the source.
// 2.  `pick` samples the HSV value under a pixel and widens it by the session's
//     tolerance into a `ColorRange` for the chosen role.
// 3.  Once the roles needed for a marker mode are picked, `marker_mode` hands
//     the configuration to the sampler.
//
// The session never talks to a window system. Whoever shows the frame and
// collects clicks (the tester binary takes coordinates on the command line)
// calls `pick` with the pixel position.

use crate::core_modules::angle_sampler::MarkerMode;
use crate::core_modules::color_range::{ColorRange, HsvTolerance};
use crate::core_modules::frame::Frame;
use crate::core_modules::hsv::Hsv;
use crate::error::{Result, VisionError};
use crate::frame_source::FrameSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Which marker a picked colour belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerRole {
    /// Sticker on the spin axis.
    Center,
    /// Sticker near the rim.
    Marker,
}

impl fmt::Display for MarkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerRole::Center => write!(f, "center"),
            MarkerRole::Marker => write!(f, "marker"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CalibrationSession {
    tolerance: HsvTolerance,
    center: Option<ColorRange>,
    marker: Option<ColorRange>,
}

impl CalibrationSession {
    pub fn new(tolerance: HsvTolerance) -> Self {
        Self {
            tolerance,
            center: None,
            marker: None,
        }
    }

    /// Reads frame `index` from `source`.
    pub fn reference_frame<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
        index: usize,
    ) -> Result<Frame> {
        let unavailable = VisionError::FrameUnavailable {
            index,
            total: source.total_frames(),
        };
        source.seek(index)?;
        match source.read_next()? {
            Some(frame) if frame.index == index => Ok(frame),
            _ => Err(unavailable),
        }
    }

    /// Builds a range around the colour at `(x, y)` and stores it for `role`.
    pub fn pick(&mut self, role: MarkerRole, frame: &Frame, x: u32, y: u32) -> Result<ColorRange> {
        let (width, height) = frame.dimensions();
        if x >= width || y >= height {
            return Err(VisionError::InvalidParameters(format!(
                "pixel ({x}, {y}) is outside the {width}x{height} frame"
            )));
        }

        let hsv = Hsv::from(*frame.image.get_pixel(x, y));
        let range = ColorRange::around(hsv, self.tolerance);
        info!(
            %role,
            x,
            y,
            hsv = ?hsv.as_array(),
            lower = ?range.lower,
            upper = ?range.upper,
            "colour picked"
        );

        match role {
            MarkerRole::Center => self.center = Some(range),
            MarkerRole::Marker => self.marker = Some(range),
        }
        Ok(range)
    }

    pub fn range(&self, role: MarkerRole) -> Option<ColorRange> {
        match role {
            MarkerRole::Center => self.center,
            MarkerRole::Marker => self.marker,
        }
    }

    /// Dual mode once both colours are picked, single mode with only the
    /// marker, nothing otherwise.
    pub fn marker_mode(&self) -> Option<MarkerMode> {
        match (self.center, self.marker) {
            (Some(center), Some(marker)) => Some(MarkerMode::Dual { center, marker }),
            (None, Some(marker)) => Some(MarkerMode::Single { marker }),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.center = None;
        self.marker = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_source::MemoryFrameSource;
    use image::{Rgb, RgbImage};

    fn frame() -> Frame {
        let mut image = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
        image.put_pixel(2, 3, Rgb([255, 0, 0]));
        image.put_pixel(5, 5, Rgb([255, 255, 0]));
        Frame::new(0, image)
    }

    #[test]
    fn picking_pure_red_clamps_to_channel_bounds() {
        let mut session = CalibrationSession::default();
        let range = session.pick(MarkerRole::Center, &frame(), 2, 3).unwrap();
        assert_eq!(range.lower, [0, 205, 205]);
        assert_eq!(range.upper, [10, 255, 255]);
        assert_eq!(session.range(MarkerRole::Center), Some(range));
    }

    #[test]
    fn marker_mode_follows_the_picked_roles() {
        let mut session = CalibrationSession::default();
        assert_eq!(session.marker_mode(), None);

        session.pick(MarkerRole::Center, &frame(), 2, 3).unwrap();
        assert_eq!(session.marker_mode(), None);

        let marker = session.pick(MarkerRole::Marker, &frame(), 5, 5).unwrap();
        assert!(matches!(session.marker_mode(), Some(MarkerMode::Dual { .. })));

        session.clear();
        session.pick(MarkerRole::Marker, &frame(), 5, 5).unwrap();
        assert_eq!(session.marker_mode(), Some(MarkerMode::Single { marker }));
    }

    #[test]
    fn picking_outside_the_frame_is_rejected() {
        let mut session = CalibrationSession::default();
        let err = session.pick(MarkerRole::Marker, &frame(), 8, 0).unwrap_err();
        assert!(matches!(err, VisionError::InvalidParameters(_)));
        assert_eq!(session.range(MarkerRole::Marker), None);
    }

    #[test]
    fn reference_frame_past_the_end_is_unavailable() {
        let mut source = MemoryFrameSource::new(vec![frame().image, frame().image], 30.0).unwrap();
        let session = CalibrationSession::default();
        assert_eq!(session.reference_frame(&mut source, 1).unwrap().index, 1);
        let err = session.reference_frame(&mut source, 5).unwrap_err();
        assert!(matches!(err, VisionError::FrameUnavailable { index: 5, total: 2 }));
    }
}
