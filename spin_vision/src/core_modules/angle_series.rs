// THEORY:
// An `AngleSeries` is the time-ordered record of marker angles produced by one
// sampling pass. It is the hand-off between the vision half of the system and
// the physics half: everything upstream deals in pixels, everything downstream
// deals in radians and seconds.
//
// The series enforces its own ordering. Samples must arrive with strictly
// increasing time. A sample at the exact time of the previous one is merged
// into it (the first observation is kept) instead of creating a zero-width step
// that would later divide by zero. Out-of-order samples are rejected.
//
// Each sample after the first also carries the instantaneous angular velocity
// of the step that led to it: (angle[n] - angle[n-1]) / (time[n] - time[n-1]).
// The angles are raw `atan2` values, so a marker crossing the ±π seam shows up
// as a spike of about ±2π/Δt. Those rows are what the table-editing step is
// for. `OmegaStep::Wrapped` takes the short way round instead, for callers who
// want a clean velocity trace without editing.

use crate::core_modules::kinematics::wrap_angle;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How the angle step of an instantaneous velocity is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OmegaStep {
    /// Plain difference of the recorded angles.
    #[default]
    Raw,
    /// Difference wrapped into [-π, π].
    Wrapped,
}

/// One accepted frame's observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub frame_index: usize,
    /// Seconds since the first frame of the source.
    pub time: f64,
    /// Radians in (-π, π].
    pub angle: f64,
    /// Angular velocity over the step from the previous sample, rad/s.
    /// `None` for the first sample; NaN if the step had zero duration.
    pub omega: Option<f64>,
}

/// Outcome of appending to a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Appended,
    /// Same time as the previous sample; the earlier observation is kept.
    Merged,
    /// Earlier than the previous sample.
    OutOfOrder,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AngleSeries {
    samples: Vec<Sample>,
    #[serde(skip)]
    step: OmegaStep,
}

/// Angular velocity of one step, or NaN if the step has no duration.
pub fn instantaneous_omega(previous: &Sample, time: f64, angle: f64, step: OmegaStep) -> f64 {
    let dt = time - previous.time;
    if dt == 0.0 {
        return f64::NAN;
    }
    let delta = angle - previous.angle;
    match step {
        OmegaStep::Raw => delta / dt,
        OmegaStep::Wrapped => wrap_angle(delta) / dt,
    }
}

impl AngleSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(step: OmegaStep) -> Self {
        Self {
            samples: Vec::new(),
            step,
        }
    }

    pub fn step(&self) -> OmegaStep {
        self.step
    }

    /// Builds a series from `(time, angle)` pairs, numbering frames by position.
    pub fn from_time_angle(points: &[(f64, f64)]) -> Self {
        let mut series = Self::new();
        for (frame_index, &(time, angle)) in points.iter().enumerate() {
            series.push(frame_index, time, angle);
        }
        series
    }

    pub fn push(&mut self, frame_index: usize, time: f64, angle: f64) -> PushOutcome {
        let omega = match self.samples.last() {
            None => None,
            Some(last) if time == last.time => {
                debug!(frame_index, time, "merging sample with duplicate timestamp");
                return PushOutcome::Merged;
            }
            Some(last) if time < last.time => {
                debug!(frame_index, time, last_time = last.time, "rejecting out-of-order sample");
                return PushOutcome::OutOfOrder;
            }
            Some(last) => Some(instantaneous_omega(last, time, angle, self.step)),
        };

        self.samples.push(Sample {
            frame_index,
            time,
            angle,
            omega,
        });
        PushOutcome::Appended
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.time).collect()
    }

    pub fn angles(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.angle).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn first_sample_has_no_velocity() {
        let series = AngleSeries::from_time_angle(&[(0.0, 0.1)]);
        assert_eq!(series.samples()[0].omega, None);
    }

    #[test]
    fn velocity_is_angle_step_over_time_step() {
        let series = AngleSeries::from_time_angle(&[(0.0, 0.0), (0.1, 0.31), (0.2, 0.63)]);
        assert_relative_eq!(series.samples()[1].omega.unwrap(), 3.1, epsilon = 1e-9);
        assert_relative_eq!(series.samples()[2].omega.unwrap(), 3.2, epsilon = 1e-9);
    }

    #[test]
    fn velocity_across_the_seam_is_a_raw_spike() {
        let series = AngleSeries::from_time_angle(&[(0.0, 3.0), (0.1, -3.0)]);
        assert_relative_eq!(series.samples()[1].omega.unwrap(), -60.0, epsilon = 1e-9);
    }

    #[test]
    fn wrapped_step_takes_the_short_way_round() {
        let mut series = AngleSeries::with_step(OmegaStep::Wrapped);
        series.push(0, 0.0, PI - 0.1);
        series.push(1, 0.1, -PI + 0.1);
        assert_relative_eq!(series.samples()[1].omega.unwrap(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn duplicate_timestamp_is_merged() {
        let mut series = AngleSeries::new();
        assert_eq!(series.push(0, 0.0, 0.0), PushOutcome::Appended);
        assert_eq!(series.push(1, 0.1, 0.3), PushOutcome::Appended);
        assert_eq!(series.push(2, 0.1, 0.9), PushOutcome::Merged);
        assert_eq!(series.len(), 2);
        assert_eq!(series.last().unwrap().angle, 0.3);
    }

    #[test]
    fn out_of_order_sample_is_rejected() {
        let mut series = AngleSeries::from_time_angle(&[(0.0, 0.0), (0.2, 0.1)]);
        assert_eq!(series.push(9, 0.1, 0.05), PushOutcome::OutOfOrder);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn zero_duration_step_is_nan_not_a_panic() {
        let previous = Sample {
            frame_index: 0,
            time: 1.0,
            angle: 0.0,
            omega: None,
        };
        assert!(instantaneous_omega(&previous, 1.0, 0.5, OmegaStep::Raw).is_nan());
        assert!(instantaneous_omega(&previous, 1.0, 0.5, OmegaStep::Wrapped).is_nan());
    }
}
