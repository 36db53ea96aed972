// THEORY:
// This file is the main entry point for the `spin_vision` library crate. It
// measures how fast a disk spins after a collision, from a recording of the
// disk with one or two coloured stickers on it, and turns that into rotational
// kinetic energy.
//
// The public surface is the `AnalysisPipeline` with its `AnalysisConfig` and
// `Report`, plus the pieces a front end needs around a run: frame sources,
// the calibration session for picking marker colours, and the editable sample
// table. The stages themselves (`core_modules`) stay public for callers that
// want to drive them one by one.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod frame_source;
pub mod pipeline;

pub use config::{AnalysisConfig, MarkerConfig, OverlayConfig};
pub use core_modules::angle_sampler::{MarkerMode, SkipCounts};
pub use core_modules::angle_series::OmegaStep;
pub use core_modules::calibration::{CalibrationSession, MarkerRole};
pub use core_modules::color_range::{ColorRange, HsvTolerance};
pub use core_modules::frame::{Frame, Roi};
pub use core_modules::kinematics::{DiskParameters, ReductionStrategy};
pub use core_modules::sample_table::{SampleTable, TableRow};
pub use error::{InsufficientData, Result, VisionError};
pub use frame_source::{FrameSource, ImageSequenceSource, MemoryFrameSource};
pub use pipeline::{AnalysisData, AnalysisPipeline, KinematicResult, Report, RunState};
