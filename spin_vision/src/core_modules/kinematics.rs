// THEORY:
// The `kinematics` module turns a marker track into physics. It is the only
// part of the system that knows about mass, radius and energy.
//
// Two reductions produce the average angular velocity ω:
// 1.  **Endpoint**: the raw angles are only known modulo 2π, so the trace is
//     first unwrapped (every adjacent step larger than π in magnitude is moved
//     by whole turns until it is not). ω is then total rotation over total
//     time, first sample to last. Intermediate samples only matter through the
//     unwrapping.
// 2.  **Integral**: a table of instantaneous velocities (possibly hand-edited
//     to drop outliers) is integrated over time with the trapezoidal rule.
//     Missing values are filled with the mean of the valid ones first.
//
// Both then apply the solid-disk model: I = ½·m·R², E = ½·I·ω². A negative ω
// is a clockwise spin and is reported as such; E does not care.

use crate::core_modules::angle_series::AngleSeries;
use crate::core_modules::sample_table::SampleTable;
use crate::error::{InsufficientData, Result, VisionError};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};
use std::fmt;

/// Physical properties of the spinning puck.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiskParameters {
    pub mass_kg: f64,
    pub radius_m: f64,
}

impl Default for DiskParameters {
    fn default() -> Self {
        Self {
            mass_kg: 0.20,
            radius_m: 0.05,
        }
    }
}

impl DiskParameters {
    /// Moment of inertia of a uniform solid disk about its axis, kg·m².
    pub fn moment_of_inertia(&self) -> f64 {
        0.5 * self.mass_kg * self.radius_m * self.radius_m
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.mass_kg > 0.0 && self.mass_kg.is_finite()) {
            return Err(VisionError::InvalidParameters(format!(
                "mass must be positive, got {} kg",
                self.mass_kg
            )));
        }
        if !(self.radius_m > 0.0 && self.radius_m.is_finite()) {
            return Err(VisionError::InvalidParameters(format!(
                "radius must be positive, got {} m",
                self.radius_m
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionStrategy {
    #[default]
    Endpoint,
    Integral,
}

/// Derived scalars of one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KinematicResult {
    pub strategy: ReductionStrategy,
    /// Total rotation, rad.
    pub delta_theta: f64,
    /// Elapsed time, s.
    pub delta_t: f64,
    /// Average angular velocity, rad/s.
    pub omega: f64,
    /// Moment of inertia, kg·m².
    pub inertia: f64,
    /// Rotational kinetic energy, J.
    pub energy: f64,
}

impl KinematicResult {
    fn from_rotation(
        strategy: ReductionStrategy,
        delta_theta: f64,
        delta_t: f64,
        disk: &DiskParameters,
    ) -> Self {
        let omega = delta_theta / delta_t;
        let inertia = disk.moment_of_inertia();
        Self {
            strategy,
            delta_theta,
            delta_t,
            omega,
            inertia,
            energy: rotational_energy(inertia, omega),
        }
    }
}

impl fmt::Display for KinematicResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "average angular velocity ω ≈ {:.3} rad/s", self.omega)?;
        writeln!(f, "rotational kinetic energy ≈ {:.4} J", self.energy)?;
        writeln!(f, "Δθ = {:.4} rad", self.delta_theta)?;
        writeln!(f, "Δt = {:.4} s", self.delta_t)?;
        write!(f, "I = {:.6} kg·m²", self.inertia)
    }
}

pub fn rotational_energy(inertia: f64, omega: f64) -> f64 {
    0.5 * inertia * omega * omega
}

/// Wraps an angle difference into [-π, π]. Differences already inside the
/// interval (including exactly ±π) are returned unchanged.
pub fn wrap_angle(delta: f64) -> f64 {
    if !delta.is_finite() || delta.abs() <= PI {
        return delta;
    }
    let wrapped = (delta + PI).rem_euclid(TAU) - PI;
    // Positive odd multiples of π land on -π; keep their sign.
    if wrapped == -PI && delta > 0.0 {
        PI
    } else {
        wrapped
    }
}

/// Standard phase unwrapping: a continuous trace whose adjacent steps never
/// exceed π in magnitude.
pub fn unwrap_angles(angles: &[f64]) -> Vec<f64> {
    let mut unwrapped = Vec::with_capacity(angles.len());
    let Some(&first) = angles.first() else {
        return unwrapped;
    };
    unwrapped.push(first);

    // Whole turns added so far; stays exactly 0.0 until the first seam crossing.
    let mut correction = 0.0;
    for pair in angles.windows(2) {
        let step = pair[1] - pair[0];
        let wrapped = wrap_angle(step);
        if step.is_finite() && wrapped != step {
            correction += wrapped - step;
        }
        unwrapped.push(pair[1] + correction);
    }
    unwrapped
}

/// Trapezoidal ∫ values d(times). Zero-width intervals contribute nothing.
pub fn trapezoid(times: &[f64], values: &[f64]) -> f64 {
    times
        .windows(2)
        .zip(values.windows(2))
        .map(|(t, v)| 0.5 * (v[0] + v[1]) * (t[1] - t[0]))
        .sum()
}

/// ω from the first and last samples of the unwrapped trace.
pub fn reduce_endpoint(
    series: &AngleSeries,
    disk: &DiskParameters,
) -> std::result::Result<KinematicResult, InsufficientData> {
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        return Err(InsufficientData { usable: 0 });
    };
    let delta_t = last.time - first.time;
    if series.len() < 2 || !(delta_t > 0.0) {
        return Err(InsufficientData {
            usable: series.len().min(1),
        });
    }

    let unwrapped = unwrap_angles(&series.angles());
    let delta_theta = unwrapped[unwrapped.len() - 1] - unwrapped[0];
    Ok(KinematicResult::from_rotation(
        ReductionStrategy::Endpoint,
        delta_theta,
        delta_t,
        disk,
    ))
}

/// ω from the trapezoidal integral of an (edited) instantaneous-velocity table.
pub fn reduce_integral(
    table: &SampleTable,
    disk: &DiskParameters,
) -> std::result::Result<KinematicResult, InsufficientData> {
    let rows = table.filled().ok_or(InsufficientData { usable: 0 })?;
    if rows.len() < 2 {
        return Err(InsufficientData { usable: rows.len() });
    }

    let times: Vec<f64> = rows.iter().map(|&(time, _)| time).collect();
    let omegas: Vec<f64> = rows.iter().map(|&(_, omega)| omega).collect();
    let delta_t = times[times.len() - 1] - times[0];
    if !(delta_t > 0.0) {
        return Err(InsufficientData { usable: 1 });
    }

    let delta_theta = trapezoid(&times, &omegas);
    Ok(KinematicResult::from_rotation(
        ReductionStrategy::Integral,
        delta_theta,
        delta_t,
        disk,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::sample_table::TableRow;
    use approx::assert_relative_eq;

    fn lab_disk() -> DiskParameters {
        DiskParameters {
            mass_kg: 0.20,
            radius_m: 0.05,
        }
    }

    #[test]
    fn endpoint_reduction_of_the_reference_run() {
        let series = AngleSeries::from_time_angle(&[(0.00, 0.00), (0.10, 0.31), (0.20, 0.63), (0.30, 0.94)]);
        let result = reduce_endpoint(&series, &lab_disk()).unwrap();
        assert_relative_eq!(result.delta_theta, 0.94, max_relative = 1e-9);
        assert_relative_eq!(result.delta_t, 0.30, max_relative = 1e-9);
        assert_relative_eq!(result.omega, 3.1333, max_relative = 1e-3);
        assert_relative_eq!(result.inertia, 0.00025, max_relative = 1e-9);
        assert_relative_eq!(result.energy, 0.00123, max_relative = 1e-2);
        assert_relative_eq!(result.energy, 0.5 * 0.00025 * result.omega * result.omega, max_relative = 1e-12);
    }

    #[test]
    fn endpoint_reduction_needs_two_samples() {
        let empty = AngleSeries::new();
        assert_eq!(reduce_endpoint(&empty, &lab_disk()), Err(InsufficientData { usable: 0 }));
        let single = AngleSeries::from_time_angle(&[(0.5, 1.0)]);
        assert_eq!(reduce_endpoint(&single, &lab_disk()), Err(InsufficientData { usable: 1 }));
    }

    #[test]
    fn endpoint_reduction_follows_the_spin_through_full_turns() {
        // 1.5 turns counter-clockwise sampled every 0.9 rad.
        let points: Vec<(f64, f64)> = (0..=10)
            .map(|i| {
                let theta = 0.9 * i as f64;
                (0.1 * i as f64, (theta + PI).rem_euclid(TAU) - PI)
            })
            .collect();
        let result = reduce_endpoint(&AngleSeries::from_time_angle(&points), &lab_disk()).unwrap();
        assert_relative_eq!(result.delta_theta, 9.0, epsilon = 1e-9);
        assert_relative_eq!(result.omega, 9.0, epsilon = 1e-9);
    }

    #[test]
    fn endpoint_reduction_ignores_a_duplicate_timestamp() {
        let points = [(0.0, 0.0), (0.1, 0.31), (0.2, 0.63), (0.3, 0.94)];
        let baseline = reduce_endpoint(&AngleSeries::from_time_angle(&points), &lab_disk()).unwrap();

        let mut series = AngleSeries::new();
        series.push(0, 0.0, 0.0);
        series.push(1, 0.1, 0.31);
        series.push(2, 0.1, 0.31);
        series.push(3, 0.2, 0.63);
        series.push(4, 0.3, 0.94);
        let with_duplicate = reduce_endpoint(&series, &lab_disk()).unwrap();
        assert_eq!(with_duplicate.omega, baseline.omega);
    }

    #[test]
    fn clockwise_spin_has_negative_omega_and_positive_energy() {
        let series = AngleSeries::from_time_angle(&[(0.0, 0.5), (0.5, -0.5)]);
        let result = reduce_endpoint(&series, &lab_disk()).unwrap();
        assert!(result.omega < 0.0);
        assert!(result.energy > 0.0);
    }

    #[test]
    fn unwrap_matches_the_phase_unwrapping_rule() {
        let raw = [3.0, -3.0, -2.9, 3.1];
        let unwrapped = unwrap_angles(&raw);
        assert_relative_eq!(unwrapped[1], -3.0 + TAU, epsilon = 1e-12);
        assert_relative_eq!(unwrapped[2], -2.9 + TAU, epsilon = 1e-12);
        assert_relative_eq!(unwrapped[3], 3.1, epsilon = 1e-12);
    }

    #[test]
    fn unwrap_is_idempotent() {
        let raw = [0.0, 2.5, -1.2, 1.9, -2.8, 2.9, 0.4, -3.1];
        let once = unwrap_angles(&raw);
        let twice = unwrap_angles(&once);
        for (a, b) in once.iter().zip(&twice) {
            assert_eq!(a, b);
        }
        for pair in once.windows(2) {
            assert!((pair[1] - pair[0]).abs() <= PI);
        }
    }

    #[test]
    fn wrap_angle_keeps_exact_half_turns() {
        assert_eq!(wrap_angle(PI), PI);
        assert_eq!(wrap_angle(-PI), -PI);
        assert_relative_eq!(wrap_angle(3.0 * PI), PI, epsilon = 1e-12);
        assert!(wrap_angle(f64::NAN).is_nan());
    }

    #[test]
    fn trapezoid_of_a_ramp() {
        let times = [0.0, 1.0, 2.0];
        let values = [0.0, 1.0, 2.0];
        assert_relative_eq!(trapezoid(&times, &values), 2.0);
    }

    #[test]
    fn integral_reduction_recovers_a_constant_velocity() {
        let rows = (1..=20)
            .map(|i| TableRow {
                index: i,
                time: i as f64 / 30.0,
                omega: Some(4.2),
            })
            .collect();
        let table = SampleTable::from_rows(rows);
        let result = reduce_integral(&table, &lab_disk()).unwrap();
        assert_relative_eq!(result.omega, 4.2, max_relative = 1e-12);
        assert_eq!(result.strategy, ReductionStrategy::Integral);
    }

    #[test]
    fn integral_reduction_fills_missing_values_with_the_mean() {
        let table = SampleTable::from_rows(vec![
            TableRow { index: 1, time: 0.1, omega: Some(2.0) },
            TableRow { index: 2, time: 0.2, omega: None },
            TableRow { index: 3, time: 0.3, omega: Some(4.0) },
        ]);
        let result = reduce_integral(&table, &lab_disk()).unwrap();
        assert_relative_eq!(result.delta_theta, 0.6, epsilon = 1e-12);
        assert_relative_eq!(result.omega, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn integral_reduction_needs_two_rows() {
        let table = SampleTable::from_rows(vec![TableRow { index: 1, time: 0.1, omega: Some(2.0) }]);
        assert_eq!(reduce_integral(&table, &lab_disk()), Err(InsufficientData { usable: 1 }));

        let no_valid = SampleTable::from_rows(vec![
            TableRow { index: 1, time: 0.1, omega: None },
            TableRow { index: 2, time: 0.2, omega: None },
        ]);
        assert_eq!(reduce_integral(&no_valid, &lab_disk()), Err(InsufficientData { usable: 0 }));
    }

    #[test]
    fn energy_is_never_negative() {
        let disk = lab_disk();
        for omega in [-50.0, -1.0, 0.0, 0.3, 12.0] {
            assert!(rotational_energy(disk.moment_of_inertia(), omega) >= 0.0);
        }
    }

    #[test]
    fn disk_validation_rejects_non_positive_values() {
        assert!(DiskParameters { mass_kg: 0.0, radius_m: 0.05 }.validate().is_err());
        assert!(DiskParameters { mass_kg: 0.2, radius_m: -1.0 }.validate().is_err());
        assert!(lab_disk().validate().is_ok());
    }

    #[test]
    fn report_lines_use_fixed_precision() {
        let series = AngleSeries::from_time_angle(&[(0.00, 0.00), (0.30, 0.94)]);
        let text = reduce_endpoint(&series, &lab_disk()).unwrap().to_string();
        assert!(text.contains("ω ≈ 3.133 rad/s"));
        assert!(text.contains("Δθ = 0.9400 rad"));
        assert!(text.contains("I = 0.000250 kg·m²"));
    }
}
