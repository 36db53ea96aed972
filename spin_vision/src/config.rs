// THEORY:
// `AnalysisConfig` is everything a run needs besides the video itself. It is a
// plain struct with public fields so callers can build it in code, and it also
// round-trips through TOML so a calibrated setup can be saved next to the
// clip and reused:
//
// ```toml
// start_frame = 20
// end_frame = 80
// reduction = "endpoint"
// max_separation_px = 60.0
// omega_step = "raw"
//
// [disk]
// mass_kg = 0.2
// radius_m = 0.05
//
// [markers.center]
// lower = [0, 150, 150]
// upper = [10, 255, 255]
//
// [markers.marker]
// lower = [25, 100, 100]
// upper = [35, 255, 255]
// ```
//
// Every field is optional in the file; missing ones take the lab defaults.
// `omega_step = "wrapped"` takes each velocity step the short way round the
// ±π seam instead of leaving the seam spikes in the table.
// Validation needs the video's length and frame size, so it is a separate
// step run once the source is open.

use crate::core_modules::angle_sampler::{MarkerMode, SamplerConfig};
use crate::core_modules::angle_series::OmegaStep;
use crate::core_modules::color_range::ColorRange;
use crate::core_modules::frame::Roi;
use crate::core_modules::kinematics::{DiskParameters, ReductionStrategy};
use crate::error::{Result, VisionError};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_START_FRAME: usize = 20;
pub const DEFAULT_END_FRAME: usize = 80;
pub const DEFAULT_OVERLAY_FRAMES: usize = 10;

/// Colour ranges of the tracked stickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Sticker on the spin axis. Without it the run uses single-marker mode.
    pub center: Option<ColorRange>,
    pub marker: ColorRange,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            center: None,
            marker: ColorRange::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub enabled: bool,
    pub max_frames: usize,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_frames: DEFAULT_OVERLAY_FRAMES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub start_frame: usize,
    /// Inclusive. Clamped to the last frame of the video.
    pub end_frame: usize,
    pub max_separation_px: Option<f64>,
    pub reduction: ReductionStrategy,
    pub omega_step: OmegaStep,
    pub disk: DiskParameters,
    pub markers: MarkerConfig,
    pub roi: Option<Roi>,
    pub overlay: OverlayConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            start_frame: DEFAULT_START_FRAME,
            end_frame: DEFAULT_END_FRAME,
            max_separation_px: None,
            reduction: ReductionStrategy::default(),
            omega_step: OmegaStep::default(),
            disk: DiskParameters::default(),
            markers: MarkerConfig::default(),
            roi: None,
            overlay: OverlayConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn marker_mode(&self) -> MarkerMode {
        match self.markers.center {
            Some(center) => MarkerMode::Dual {
                center,
                marker: self.markers.marker,
            },
            None => MarkerMode::Single {
                marker: self.markers.marker,
            },
        }
    }

    /// The inclusive frame window for a video of `total_frames` frames.
    pub fn frame_window(&self, total_frames: usize) -> (usize, usize) {
        let last = total_frames.saturating_sub(1);
        (self.start_frame.min(last), self.end_frame.min(last))
    }

    /// Checks the configuration against the opened video.
    pub fn validate(&self, total_frames: usize, width: u32, height: u32) -> Result<()> {
        if total_frames == 0 {
            return Err(VisionError::InvalidParameters(
                "video reports no frames".to_string(),
            ));
        }
        if self.start_frame > self.end_frame {
            return Err(VisionError::InvalidParameters(format!(
                "start frame {} is after end frame {}",
                self.start_frame, self.end_frame
            )));
        }
        if self.start_frame >= total_frames {
            return Err(VisionError::InvalidParameters(format!(
                "start frame {} is beyond the last frame {}",
                self.start_frame,
                total_frames - 1
            )));
        }

        self.disk.validate()?;
        if let Some(center) = &self.markers.center {
            center.validate()?;
        }
        self.markers.marker.validate()?;
        if let Some(roi) = &self.roi {
            roi.validate(width, height)?;
        }
        if let Some(max_separation) = self.max_separation_px {
            if !(max_separation > 0.0 && max_separation.is_finite()) {
                return Err(VisionError::InvalidParameters(format!(
                    "maximum marker separation must be positive, got {max_separation} px"
                )));
            }
        }
        Ok(())
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            mode: self.marker_mode(),
            roi: self.roi,
            max_separation_px: self.max_separation_px,
            overlay_limit: if self.overlay.enabled {
                self.overlay.max_frames
            } else {
                0
            },
            omega_step: self.omega_step,
        }
    }
}
