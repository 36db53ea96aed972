// THEORY:
// The `angle_sampler` walks the analysis window of a clip and turns every
// frame it can read into (at most) one angle sample. It is the only component
// that sees both frames and time.
//
// Per frame, in index order:
// 1.  **Crop** to the region of interest (whole frame when unset).
// 2.  **Locate** the configured markers:
//     - single-marker mode: one colour; the angle is measured from the crop's
//       origin, `atan2(y, x)`. Kept for quick checks on clips without a
//       centre sticker; it only tracks rotation if the origin sits on the axis.
//     - dual-marker mode: a "center" colour on the spin axis and a "marker"
//       colour near the rim; the angle is `atan2(m.y - c.y, m.x - c.x)`.
// 3.  **Filter**: in dual mode, a pair of centroids further apart than the
//     configured pixel threshold is treated as a mis-detection (two unrelated
//     patches of the same colour) and the frame is dropped.
// 4.  **Record** `(index / fps, angle)` in the series.
//
// A frame that fails any step is skipped and counted, never fatal. Whether the
// surviving samples are enough is for the caller to decide.

use crate::core_modules::angle_series::{AngleSeries, OmegaStep, PushOutcome};
use crate::core_modules::color_range::ColorRange;
use crate::core_modules::frame::{Frame, Roi};
use crate::core_modules::hsv::convert_rgb_to_hsv;
use crate::core_modules::marker_locator::{locate_in_hsv, Centroid};
use crate::core_modules::overlay::{OverlayCollector, OverlayFrame};
use crate::error::{InsufficientData, Result};
use crate::frame_source::FrameSource;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Which markers are tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerMode {
    Single { marker: ColorRange },
    Dual { center: ColorRange, marker: ColorRange },
}

impl MarkerMode {
    pub fn ranges(&self) -> Vec<ColorRange> {
        match self {
            MarkerMode::Single { marker } => vec![*marker],
            MarkerMode::Dual { center, marker } => vec![*center, *marker],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    pub mode: MarkerMode,
    pub roi: Option<Roi>,
    /// Largest accepted centre-to-marker distance, in pixels.
    pub max_separation_px: Option<f64>,
    /// How many accepted frames to keep for display; 0 keeps none.
    pub overlay_limit: usize,
    pub omega_step: OmegaStep,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    CenterNotFound,
    MarkerNotFound,
    SeparationExceeded { distance: f64 },
}

/// How many frames were dropped, and why.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub center_not_found: usize,
    pub marker_not_found: usize,
    pub separation_exceeded: usize,
}

impl SkipCounts {
    pub fn record(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::CenterNotFound => self.center_not_found += 1,
            SkipReason::MarkerNotFound => self.marker_not_found += 1,
            SkipReason::SeparationExceeded { .. } => self.separation_exceeded += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.center_not_found + self.marker_not_found + self.separation_exceeded
    }
}

/// Both centroids of an accepted frame, in crop coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub angle: f64,
    pub center: Option<Centroid>,
    pub marker: Centroid,
    /// Crop origin inside the full frame.
    pub origin: (u32, u32),
}

impl Observation {
    fn to_frame(&self, centroid: &Centroid) -> (u32, u32) {
        let (x, y) = centroid.pixel();
        (x + self.origin.0, y + self.origin.1)
    }

    pub fn marker_in_frame(&self) -> (u32, u32) {
        self.to_frame(&self.marker)
    }

    pub fn center_in_frame(&self) -> Option<(u32, u32)> {
        self.center.as_ref().map(|c| self.to_frame(c))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Accepted(Observation),
    Skipped(SkipReason),
}

/// Everything one pass over the analysis window produced.
#[derive(Debug)]
pub struct SamplingOutput {
    pub series: AngleSeries,
    pub skipped: SkipCounts,
    pub frames_visited: usize,
    pub overlays: Vec<OverlayFrame>,
}

impl SamplingOutput {
    /// Fails when fewer than two samples survived.
    pub fn check_usable(&self) -> std::result::Result<(), InsufficientData> {
        if self.series.len() < 2 {
            return Err(InsufficientData {
                usable: self.series.len(),
            });
        }
        Ok(())
    }
}

pub struct AngleSampler {
    config: SamplerConfig,
}

impl AngleSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Runs crop, locate and filter on one frame.
    pub fn observe(&self, frame: &Frame) -> FrameOutcome {
        let view = frame.crop(self.config.roi.as_ref());
        let origin = view.origin();
        let hsv = convert_rgb_to_hsv(&view);

        match &self.config.mode {
            MarkerMode::Single { marker } => {
                let Some(marker) = locate_in_hsv(&hsv, marker) else {
                    return FrameOutcome::Skipped(SkipReason::MarkerNotFound);
                };
                let (x, y) = marker.pixel();
                FrameOutcome::Accepted(Observation {
                    angle: (y as f64).atan2(x as f64),
                    center: None,
                    marker,
                    origin,
                })
            }
            MarkerMode::Dual { center, marker } => {
                let Some(center) = locate_in_hsv(&hsv, center) else {
                    return FrameOutcome::Skipped(SkipReason::CenterNotFound);
                };
                let Some(marker) = locate_in_hsv(&hsv, marker) else {
                    return FrameOutcome::Skipped(SkipReason::MarkerNotFound);
                };

                if let Some(max_separation) = self.config.max_separation_px {
                    let distance = center.pixel_distance(&marker);
                    if distance > max_separation {
                        return FrameOutcome::Skipped(SkipReason::SeparationExceeded { distance });
                    }
                }

                let (cx, cy) = center.pixel();
                let (mx, my) = marker.pixel();
                let dy = my as f64 - cy as f64;
                let dx = mx as f64 - cx as f64;
                FrameOutcome::Accepted(Observation {
                    angle: dy.atan2(dx),
                    center: Some(center),
                    marker,
                    origin,
                })
            }
        }
    }

    /// Samples every readable frame with index in `[start, end]`.
    pub fn sample<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
        start: usize,
        end: usize,
    ) -> Result<SamplingOutput> {
        let frame_rate = source.frame_rate();
        let mut series = AngleSeries::with_step(self.config.omega_step);
        let mut skipped = SkipCounts::default();
        let mut frames_visited = 0usize;
        let mut overlays = OverlayCollector::new(self.config.overlay_limit);

        source.seek(start)?;
        while let Some(frame) = source.read_next()? {
            if frame.index < start {
                continue;
            }
            if frame.index > end {
                break;
            }
            frames_visited += 1;

            match self.observe(&frame) {
                FrameOutcome::Skipped(reason) => {
                    debug!(frame = frame.index, ?reason, "frame skipped");
                    skipped.record(reason);
                }
                FrameOutcome::Accepted(observation) => {
                    let time = frame.timestamp(frame_rate);
                    if series.push(frame.index, time, observation.angle) == PushOutcome::Appended {
                        overlays.offer(|| OverlayFrame {
                            center: observation.center_in_frame(),
                            marker: observation.marker_in_frame(),
                            angle: observation.angle,
                            frame,
                        });
                    }
                }
            }
        }

        info!(
            start,
            end,
            frames_visited,
            samples = series.len(),
            skipped = skipped.total(),
            center_not_found = skipped.center_not_found,
            marker_not_found = skipped.marker_not_found,
            separation_exceeded = skipped.separation_exceeded,
            "sampling finished"
        );

        Ok(SamplingOutput {
            series,
            skipped,
            frames_visited,
            overlays: overlays.finish(),
        })
    }
}
