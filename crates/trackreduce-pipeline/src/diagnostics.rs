//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter tuning. [`reduce_with_diagnostics`] collects them
//! alongside the staged pipeline results.
//!
//! Timestamps come from an injected [`Clock`], so this crate never
//! touches a platform timer itself. Durations are serialized as
//! fractional seconds (`f64`) for JSON compatibility, since
//! `std::time::Duration` does not implement serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{
    AreaSimplified, DeviationSimplified, Filtered, Pipeline, Projected, Resampled, Smoothed,
    Unprojected, reduction_ratio,
};
use crate::projection::geodesic_length;
use crate::types::{Polyline, ReduceConfig, ReduceError, StagedResult};

/// Source of monotonic timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// The current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single reduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReductionDiagnostics {
    /// Stage 1: projection to the plane.
    pub project: StageDiagnostics,
    /// Stage 2: uniform resampling.
    pub resample: StageDiagnostics,
    /// Stage 3: moving-average smoothing.
    pub smooth: StageDiagnostics,
    /// Stage 4: velocity Kalman filter.
    pub filter: StageDiagnostics,
    /// Stage 5: Visvalingam-Whyatt simplification.
    pub visvalingam: StageDiagnostics,
    /// Stage 6: Douglas-Peucker simplification.
    pub douglas_peucker: StageDiagnostics,
    /// Stage 7: projection back to geographic coordinates.
    pub unproject: StageDiagnostics,
    /// Total wall-clock duration of the entire reduction (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary across all stages.
    pub summary: ReductionSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Projection metrics.
    Project {
        /// Number of projected points.
        point_count: usize,
        /// Scale factor at the center latitude.
        scale_factor: f64,
    },
    /// Resampling metrics.
    Resample {
        /// Planar length of the projected trace, in meters.
        planar_length: f64,
        /// Number of equal-length segments.
        segment_count: usize,
        /// Points before resampling.
        points_before: usize,
        /// Points after resampling.
        points_after: usize,
    },
    /// Moving-average metrics.
    Smooth {
        /// Half-window in points.
        half_window: u32,
        /// Number of points (unchanged by smoothing).
        point_count: usize,
        /// Mean distance each point moved, in planar meters.
        mean_displacement: f64,
    },
    /// Velocity filter metrics.
    Filter {
        /// Process-noise magnitude.
        noise: f64,
        /// Number of points (unchanged by filtering).
        point_count: usize,
        /// Mean distance each point moved, in planar meters.
        mean_displacement: f64,
    },
    /// Visvalingam-Whyatt metrics.
    Visvalingam {
        /// Minimum triangle area kept, in square planar meters.
        area_threshold: f64,
        /// Points before simplification.
        points_before: usize,
        /// Points after simplification.
        points_after: usize,
        /// Reduction ratio: `1.0 - (after / before)`.
        reduction_ratio: f64,
    },
    /// Douglas-Peucker metrics.
    DouglasPeucker {
        /// Perpendicular tolerance in planar meters.
        tolerance: f64,
        /// Points before simplification.
        points_before: usize,
        /// Points after simplification.
        points_after: usize,
        /// Reduction ratio: `1.0 - (after / before)`.
        reduction_ratio: f64,
    },
    /// Inverse projection metrics.
    Unproject {
        /// Points in the reduced trace.
        point_count: usize,
    },
}

/// High-level summary of a reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionSummary {
    /// Fixes in the input trace.
    pub input_point_count: usize,
    /// Points after resampling.
    pub resampled_point_count: usize,
    /// Fixes in the reduced trace.
    pub output_point_count: usize,
    /// Length of the projected trace, in planar meters.
    pub planar_length: f64,
    /// Great-circle length of the input trace, in meters.
    pub geodesic_length: f64,
    /// Projection scale factor at the center latitude.
    pub scale_factor: f64,
    /// Fraction of input fixes removed: `1.0 - (output / input)`.
    pub reduction_ratio: f64,
}

impl ReductionSummary {
    /// Summarize a finished reduction.
    #[must_use]
    pub fn from_result(result: &StagedResult) -> Self {
        Self {
            input_point_count: result.source.len(),
            resampled_point_count: result.resampled.len(),
            output_point_count: result.reduced.len(),
            planar_length: result.projected.length(),
            geodesic_length: geodesic_length(&result.source),
            scale_factor: result.scale_factor,
            reduction_ratio: reduction_ratio(result.source.len(), result.reduced.len()),
        }
    }
}

impl ReductionDiagnostics {
    /// Stages in pipeline order, paired with their display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 7] {
        [
            ("Project", &self.project),
            ("Resample", &self.resample),
            ("Smooth", &self.smooth),
            ("Filter", &self.filter),
            ("Visvalingam", &self.visvalingam),
            ("Douglas-Peucker", &self.douglas_peucker),
            ("Unproject", &self.unproject),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Reduction Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Trace: {} fixes, {:.1} m geodesic, {:.1} m planar (scale {:.4})",
            self.summary.input_point_count,
            self.summary.geodesic_length,
            self.summary.planar_length,
            self.summary.scale_factor,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Fixes: {} -> {} ({:.1}% reduction)",
            self.summary.input_point_count,
            self.summary.output_point_count,
            self.summary.reduction_ratio * 100.0,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Project {
            point_count,
            scale_factor,
        } => format!("{point_count} pts, scale={scale_factor:.4}"),
        StageMetrics::Resample {
            planar_length,
            segment_count,
            points_before,
            points_after,
        } => format!(
            "{planar_length:.1}m in {segment_count} segments, {points_before}->{points_after} pts",
        ),
        StageMetrics::Smooth {
            half_window,
            point_count,
            mean_displacement,
        } => format!("h={half_window} {point_count} pts, mean shift={mean_displacement:.3}m"),
        StageMetrics::Filter {
            noise,
            point_count,
            mean_displacement,
        } => format!("noise={noise} {point_count} pts, mean shift={mean_displacement:.3}m"),
        StageMetrics::Visvalingam {
            area_threshold,
            points_before,
            points_after,
            reduction_ratio,
        } => format!(
            "area={area_threshold:.2} {points_before}->{points_after} pts ({:.1}% reduction)",
            reduction_ratio * 100.0,
        ),
        StageMetrics::DouglasPeucker {
            tolerance,
            points_before,
            points_after,
            reduction_ratio,
        } => format!(
            "tol={tolerance:.2} {points_before}->{points_after} pts ({:.1}% reduction)",
            reduction_ratio * 100.0,
        ),
        StageMetrics::Unproject { point_count } => format!("{point_count} pts"),
    }
}

/// Mean distance between corresponding points of two equal-length
/// polylines; 0 when either is empty.
pub(crate) fn mean_displacement(before: &Polyline, after: &Polyline) -> f64 {
    let n = before.len().min(after.len());
    if n == 0 {
        return 0.0;
    }
    let total: f64 = before
        .points()
        .iter()
        .zip(after.points())
        .map(|(a, b)| a.distance(*b))
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = total / n as f64;
    mean
}

/// Time one stage transition, then collect its metrics outside the
/// timed region.
fn timed<C: Clock, S>(
    clock: &C,
    advance: impl FnOnce() -> S,
    metrics: impl FnOnce(&S) -> StageMetrics,
) -> (S, StageDiagnostics) {
    let start = clock.now();
    let stage = advance();
    let duration = clock.elapsed(&start);
    let metrics = metrics(&stage);
    (stage, StageDiagnostics { duration, metrics })
}

/// Run the full pipeline, keeping every intermediate and timing each
/// stage with `clock`.
///
/// # Errors
///
/// Returns [`ReduceError`] under the same conditions as
/// [`Pipeline::new`].
pub fn reduce_with_diagnostics<C: Clock>(
    source: &Polyline,
    config: &ReduceConfig,
    clock: &C,
) -> Result<(StagedResult, ReductionDiagnostics), ReduceError> {
    let total_start = clock.now();
    let pending = Pipeline::new(source.clone(), config.clone())?;

    let (projected, project) = timed(clock, || pending.project(), Projected::metrics);
    let (resampled, resample) = timed(clock, || projected.resample(), Resampled::metrics);
    let (smoothed, smooth) = timed(clock, || resampled.smooth(), Smoothed::metrics);
    let (filtered, filter) = timed(clock, || smoothed.filter(), Filtered::metrics);
    let (area, visvalingam) = timed(clock, || filtered.simplify_area(), AreaSimplified::metrics);
    let (deviation, douglas_peucker) = timed(
        clock,
        || area.simplify_deviation(),
        DeviationSimplified::metrics,
    );
    let (unprojected, unproject) = timed(clock, || deviation.unproject(), Unprojected::metrics);

    let result = unprojected.into_result();
    let total_duration = clock.elapsed(&total_start);
    let summary = ReductionSummary::from_result(&result);

    log::debug!(
        "reduced {} -> {} fixes in {:.3}ms",
        summary.input_point_count,
        summary.output_point_count,
        duration_ms(total_duration),
    );

    let diagnostics = ReductionDiagnostics {
        project,
        resample,
        smooth,
        filter,
        visvalingam,
        douglas_peucker,
        unproject,
        total_duration,
        summary,
    };
    Ok((result, diagnostics))
}
