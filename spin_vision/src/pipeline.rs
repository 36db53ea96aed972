// THEORY:
// The `pipeline` module is the top-level API of the library. It strings the
// components together for one recording:
//
//   Idle ──run──▶ Sampling ──▶ Reducing ──▶ Done
//                     │
//                     └──(fewer than 2 samples)──▶ InsufficientData
//
// `run` validates the configuration against the opened source, samples the
// configured frame window, and reduces the series with the configured strategy.
// Its answer is a `Report`: either the kinematics with everything that led to
// them (series, editable table, overlays, skip counts), or a note that the run
// did not produce enough samples. The latter is a normal outcome of a
// too-strict colour range or crop and is not an error.
//
// After a run the caller may edit the exported table and hand it back through
// `reduce_edited`; the pipeline keeps no state of its own between the two.

use crate::config::AnalysisConfig;
use crate::core_modules::angle_sampler::{AngleSampler, SkipCounts};
use crate::core_modules::kinematics::{reduce_endpoint, reduce_integral, ReductionStrategy};
use crate::core_modules::sample_table::SampleTable;
use crate::error::{InsufficientData, Result};
use crate::frame_source::FrameSource;
use tracing::{info, warn};

// Re-export key data structures for the public API.
pub use crate::core_modules::angle_series::{AngleSeries, Sample};
pub use crate::core_modules::kinematics::KinematicResult;
pub use crate::core_modules::overlay::OverlayFrame;

/// Where a run currently is. `Done` and `InsufficientData` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Sampling,
    Reducing,
    InsufficientData,
    Done,
}

/// The detailed data package of a successful run.
#[derive(Debug)]
pub struct AnalysisData {
    pub result: KinematicResult,
    pub series: AngleSeries,
    /// Instantaneous velocities, ready for export and editing.
    pub table: SampleTable,
    pub overlays: Vec<OverlayFrame>,
    pub skipped: SkipCounts,
    pub frames_visited: usize,
}

/// The primary output of the pipeline for one recording.
#[derive(Debug)]
pub enum Report {
    InsufficientData {
        usable: usize,
        skipped: SkipCounts,
        frames_visited: usize,
    },
    Kinematics(AnalysisData),
}

impl Report {
    pub fn result(&self) -> Option<&KinematicResult> {
        match self {
            Report::Kinematics(data) => Some(&data.result),
            Report::InsufficientData { .. } => None,
        }
    }
}

pub struct AnalysisPipeline {
    config: AnalysisConfig,
    state: RunState,
}

impl AnalysisPipeline {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            state: RunState::Idle,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Samples and reduces one recording.
    pub fn run<S: FrameSource + ?Sized>(&mut self, source: &mut S) -> Result<Report> {
        self.state = RunState::Idle;
        let (width, height) = source.frame_size();
        self.config.validate(source.total_frames(), width, height)?;
        for range in self.config.marker_mode().ranges() {
            if range.is_empty() {
                warn!(lower = ?range.lower, upper = ?range.upper, "colour range can never match");
            }
        }
        if self.config.markers.center.is_none() && self.config.max_separation_px.is_some() {
            warn!("maximum marker separation needs a centre marker; ignored");
        }

        // Stage 1: Sampling
        self.state = RunState::Sampling;
        let (start, end) = self.config.frame_window(source.total_frames());
        let sampler = AngleSampler::new(self.config.sampler_config());
        let output = sampler.sample(source, start, end)?;

        if let Err(InsufficientData { usable }) = output.check_usable() {
            return Ok(self.insufficient(usable, output.skipped, output.frames_visited));
        }

        // Stage 2: Reduction
        self.state = RunState::Reducing;
        let table = SampleTable::from_series(&output.series);
        let reduced = match self.config.reduction {
            ReductionStrategy::Endpoint => reduce_endpoint(&output.series, &self.config.disk),
            ReductionStrategy::Integral => reduce_integral(&table, &self.config.disk),
        };
        let result = match reduced {
            Ok(result) => result,
            Err(InsufficientData { usable }) => {
                return Ok(self.insufficient(usable, output.skipped, output.frames_visited));
            }
        };

        info!(
            strategy = ?result.strategy,
            omega = result.omega,
            energy = result.energy,
            delta_theta = result.delta_theta,
            delta_t = result.delta_t,
            "reduction finished"
        );
        self.state = RunState::Done;

        Ok(Report::Kinematics(AnalysisData {
            result,
            series: output.series,
            table,
            overlays: output.overlays,
            skipped: output.skipped,
            frames_visited: output.frames_visited,
        }))
    }

    /// Integral reduction of a table the user has edited.
    pub fn reduce_edited(
        &self,
        table: &SampleTable,
    ) -> std::result::Result<KinematicResult, InsufficientData> {
        let reduced = reduce_integral(table, &self.config.disk);
        if let Err(err) = &reduced {
            warn!(rows = table.len(), "{err}");
        }
        reduced
    }

    fn insufficient(&mut self, usable: usize, skipped: SkipCounts, frames_visited: usize) -> Report {
        self.state = RunState::InsufficientData;
        warn!(
            usable,
            frames_visited,
            skipped = skipped.total(),
            "not enough samples to reduce; check the colour ranges, crop and frame window"
        );
        Report::InsufficientData {
            usable,
            skipped,
            frames_visited,
        }
    }
}
