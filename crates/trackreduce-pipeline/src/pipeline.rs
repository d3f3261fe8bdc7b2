//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::reduce_staged`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use trackreduce_pipeline::{Pipeline, Point, Polyline, ReduceConfig, ReduceError};
//! # fn run() -> Result<(), ReduceError> {
//! let trace = Polyline::new(vec![
//!     Point::new(13.4050, 52.5200),
//!     Point::new(13.4060, 52.5203),
//!     Point::new(13.4071, 52.5201),
//! ]);
//! let pipeline = Pipeline::new(trace, ReduceConfig::default())?
//!     .project()
//!     .resample()
//!     .smooth()
//!     .filter()
//!     .simplify_area()
//!     .simplify_deviation()
//!     .unproject();
//!
//! let staged = pipeline.into_result();
//! assert!(staged.reduced.len() >= 2);
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying all previously computed intermediates. Only
//! [`Pipeline::new`] can fail: the configuration and every input
//! coordinate are validated up front, so no later stage has an error
//! path. Whether a stage holds geographic or planar coordinates is fixed
//! by its type.
//!
//! # Memory
//!
//! Every stage retains all earlier polylines. The resampled trace has
//! roughly one point per meter, so the planar intermediates of a long
//! trace dominate. Callers that only need the reduced trace should
//! prefer [`crate::reduce`], which drops intermediates as it goes.

use crate::diagnostics::{StageMetrics, mean_displacement};
use crate::types::{Polyline, ReduceConfig, ReduceError, StagedResult};
use crate::{kalman, projection, resample, simplify, smooth, visvalingam};

/// Ratio between the area threshold of the Visvalingam-Whyatt pass and
/// the square of the planar tolerance.
pub const AREA_THRESHOLD_FACTOR: f64 = 6.0;

/// Simplification tolerance in projected meters for a real-world
/// `threshold` at a latitude with the given projection scale factor.
#[must_use]
pub fn planar_tolerance(threshold: f64, scale_factor: f64) -> f64 {
    threshold * scale_factor
}

/// Visvalingam-Whyatt area threshold for a planar tolerance:
/// `AREA_THRESHOLD_FACTOR * tolerance^2`.
#[must_use]
pub fn area_threshold(tolerance: f64) -> f64 {
    AREA_THRESHOLD_FACTOR * tolerance * tolerance
}

/// Reject invalid configuration and non-finite input coordinates.
pub(crate) fn validate_input(source: &Polyline, config: &ReduceConfig) -> Result<(), ReduceError> {
    config.validate()?;
    if let Some(index) = source.points().iter().position(|p| !p.is_finite()) {
        return Err(ReduceError::NonFiniteCoordinate { index });
    }
    Ok(())
}

/// Moving-average half-window as a slice radius.
pub(crate) fn half_window(config: &ReduceConfig) -> usize {
    usize::try_from(config.smoothing).unwrap_or(usize::MAX)
}

/// Project the simplified planar trace back to geographic coordinates.
///
/// The first and last fixes are taken verbatim from `source`, so they
/// survive the round trip without projection rounding. Every earlier
/// stage preserves the endpoints, which makes this a pure rounding fix.
/// A source with fewer than 2 points is returned unchanged.
pub(crate) fn unproject_with_endpoints(source: &Polyline, planar: &Polyline) -> Polyline {
    if source.len() < 2 {
        return source.clone();
    }
    let mut points = projection::inverse_polyline(planar).into_points();
    if let (Some(first), Some(&fix)) = (points.first_mut(), source.first()) {
        *first = fix;
    }
    if let (Some(last), Some(&fix)) = (points.last_mut(), source.last()) {
        *last = fix;
    }
    Polyline::new(points)
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// The source trace and config have been validated but not yet touched.
/// Call [`project`](Self::project) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .project() to continue"]
#[derive(Debug)]
pub struct Pending {
    config: ReduceConfig,
    source: Polyline,
}

impl Pending {
    /// The geographic source trace.
    #[must_use]
    pub const fn source(&self) -> &Polyline {
        &self.source
    }

    /// The configuration this pipeline runs with.
    #[must_use]
    pub const fn config(&self) -> &ReduceConfig {
        &self.config
    }

    /// Project the trace to Web Mercator meters and advance to the
    /// [`Projected`] stage.
    ///
    /// The scale factor is evaluated at the center latitude of the
    /// trace's bounding box.
    pub fn project(self) -> Projected {
        let scale_factor = projection::center_scale_factor(&self.source);
        let projected = projection::project_polyline(&self.source);
        log::debug!(
            "project: {} points, scale factor {scale_factor:.6}",
            projected.len(),
        );
        Projected {
            config: self.config,
            source: self.source,
            projected,
            scale_factor,
        }
    }
}

// ───────────────────────── Stage 1: Projected ────────────────────────

/// Pipeline state after projecting to the plane.
///
/// Call [`resample`](Self::resample) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .resample() to continue"]
#[derive(Debug)]
pub struct Projected {
    config: ReduceConfig,
    source: Polyline,
    projected: Polyline,
    scale_factor: f64,
}

impl Projected {
    /// The trace in planar meters.
    #[must_use]
    pub const fn projected(&self) -> &Polyline {
        &self.projected
    }

    /// Projection scale factor at the center latitude of the trace.
    #[must_use]
    pub const fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Stage metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Project {
            point_count: self.projected.len(),
            scale_factor: self.scale_factor,
        }
    }

    /// Resample at ~1 planar meter spacing and advance to the
    /// [`Resampled`] stage.
    pub fn resample(self) -> Resampled {
        let segment_count = resample::unit_segment_count(&self.projected);
        let resampled = resample::resample(&self.projected, segment_count);
        log::debug!(
            "resample: {} -> {} points ({segment_count} segments)",
            self.projected.len(),
            resampled.len(),
        );
        Resampled {
            config: self.config,
            source: self.source,
            projected: self.projected,
            scale_factor: self.scale_factor,
            resampled,
            segment_count,
        }
    }
}

// ───────────────────────── Stage 2: Resampled ────────────────────────

/// Pipeline state after uniform resampling.
///
/// Call [`smooth`](Self::smooth) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .smooth() to continue"]
#[derive(Debug)]
pub struct Resampled {
    config: ReduceConfig,
    source: Polyline,
    projected: Polyline,
    scale_factor: f64,
    resampled: Polyline,
    segment_count: usize,
}

impl Resampled {
    /// The evenly spaced planar trace.
    #[must_use]
    pub const fn resampled(&self) -> &Polyline {
        &self.resampled
    }

    /// Stage metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Resample {
            planar_length: self.projected.length(),
            segment_count: self.segment_count,
            points_before: self.projected.len(),
            points_after: self.resampled.len(),
        }
    }

    /// Apply the moving-average smoother and advance to the
    /// [`Smoothed`] stage.
    pub fn smooth(self) -> Smoothed {
        let smoothed = smooth::smooth(&self.resampled, half_window(&self.config));
        log::debug!(
            "smooth: {} points, half-window {}",
            smoothed.len(),
            self.config.smoothing,
        );
        Smoothed {
            config: self.config,
            source: self.source,
            projected: self.projected,
            scale_factor: self.scale_factor,
            resampled: self.resampled,
            smoothed,
        }
    }
}

// ───────────────────────── Stage 3: Smoothed ─────────────────────────

/// Pipeline state after moving-average smoothing.
///
/// Call [`filter`](Self::filter) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .filter() to continue"]
#[derive(Debug)]
pub struct Smoothed {
    config: ReduceConfig,
    source: Polyline,
    projected: Polyline,
    scale_factor: f64,
    resampled: Polyline,
    smoothed: Polyline,
}

impl Smoothed {
    /// The smoothed planar trace.
    #[must_use]
    pub const fn smoothed(&self) -> &Polyline {
        &self.smoothed
    }

    /// Stage metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Smooth {
            half_window: self.config.smoothing,
            point_count: self.smoothed.len(),
            mean_displacement: mean_displacement(&self.resampled, &self.smoothed),
        }
    }

    /// Run the velocity filter and advance to the [`Filtered`] stage.
    pub fn filter(self) -> Filtered {
        let filtered = kalman::filter(&self.smoothed, self.config.noise);
        log::debug!(
            "filter: {} points, noise {}",
            filtered.len(),
            self.config.noise,
        );
        Filtered {
            config: self.config,
            source: self.source,
            projected: self.projected,
            scale_factor: self.scale_factor,
            resampled: self.resampled,
            smoothed: self.smoothed,
            filtered,
        }
    }
}

// ───────────────────────── Stage 4: Filtered ─────────────────────────

/// Pipeline state after the velocity Kalman filter.
///
/// Call [`simplify_area`](Self::simplify_area) to advance to the next
/// stage.
#[must_use = "pipeline stages are consumed by advancing; call .simplify_area() to continue"]
#[derive(Debug)]
pub struct Filtered {
    config: ReduceConfig,
    source: Polyline,
    projected: Polyline,
    scale_factor: f64,
    resampled: Polyline,
    smoothed: Polyline,
    filtered: Polyline,
}

impl Filtered {
    /// The filtered planar trace.
    #[must_use]
    pub const fn filtered(&self) -> &Polyline {
        &self.filtered
    }

    /// Stage metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Filter {
            noise: self.config.noise,
            point_count: self.filtered.len(),
            mean_displacement: mean_displacement(&self.smoothed, &self.filtered),
        }
    }

    /// Planar tolerance used by both simplification stages.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        planar_tolerance(self.config.threshold, self.scale_factor)
    }

    /// Apply Visvalingam-Whyatt with an area threshold derived from the
    /// planar tolerance and advance to the [`AreaSimplified`] stage.
    pub fn simplify_area(self) -> AreaSimplified {
        let area = area_threshold(self.tolerance());
        let area_simplified = visvalingam::simplify_vw(&self.filtered, area);
        log::debug!(
            "visvalingam: {} -> {} points, area threshold {area:.3}",
            self.filtered.len(),
            area_simplified.len(),
        );
        AreaSimplified {
            config: self.config,
            source: self.source,
            projected: self.projected,
            scale_factor: self.scale_factor,
            resampled: self.resampled,
            smoothed: self.smoothed,
            filtered: self.filtered,
            area_simplified,
        }
    }
}

// ────────────────────── Stage 5: AreaSimplified ──────────────────────

/// Pipeline state after the Visvalingam-Whyatt pass.
///
/// Call [`simplify_deviation`](Self::simplify_deviation) to advance to
/// the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .simplify_deviation() to continue"]
#[derive(Debug)]
pub struct AreaSimplified {
    config: ReduceConfig,
    source: Polyline,
    projected: Polyline,
    scale_factor: f64,
    resampled: Polyline,
    smoothed: Polyline,
    filtered: Polyline,
    area_simplified: Polyline,
}

impl AreaSimplified {
    /// The area-simplified planar trace.
    #[must_use]
    pub const fn area_simplified(&self) -> &Polyline {
        &self.area_simplified
    }

    /// Planar tolerance used by both simplification stages.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        planar_tolerance(self.config.threshold, self.scale_factor)
    }

    /// Stage metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let points_before = self.filtered.len();
        let points_after = self.area_simplified.len();
        StageMetrics::Visvalingam {
            area_threshold: area_threshold(self.tolerance()),
            points_before,
            points_after,
            reduction_ratio: reduction_ratio(points_before, points_after),
        }
    }

    /// Apply Douglas-Peucker with the planar tolerance and advance to
    /// the [`DeviationSimplified`] stage.
    pub fn simplify_deviation(self) -> DeviationSimplified {
        let tolerance = self.tolerance();
        let deviation_simplified = simplify::simplify_dp(&self.area_simplified, tolerance);
        log::debug!(
            "douglas-peucker: {} -> {} points, tolerance {tolerance:.3}",
            self.area_simplified.len(),
            deviation_simplified.len(),
        );
        DeviationSimplified {
            config: self.config,
            source: self.source,
            projected: self.projected,
            scale_factor: self.scale_factor,
            resampled: self.resampled,
            smoothed: self.smoothed,
            filtered: self.filtered,
            area_simplified: self.area_simplified,
            deviation_simplified,
        }
    }
}

// ──────────────────── Stage 6: DeviationSimplified ───────────────────

/// Pipeline state after the Douglas-Peucker pass.
///
/// Call [`unproject`](Self::unproject) to advance to the final stage, or
/// [`finish`](Self::finish) to go straight to the [`StagedResult`].
#[must_use = "pipeline stages are consumed by advancing; call .unproject() to continue"]
#[derive(Debug)]
pub struct DeviationSimplified {
    config: ReduceConfig,
    source: Polyline,
    projected: Polyline,
    scale_factor: f64,
    resampled: Polyline,
    smoothed: Polyline,
    filtered: Polyline,
    area_simplified: Polyline,
    deviation_simplified: Polyline,
}

impl DeviationSimplified {
    /// The fully simplified planar trace.
    #[must_use]
    pub const fn deviation_simplified(&self) -> &Polyline {
        &self.deviation_simplified
    }

    /// Stage metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let points_before = self.area_simplified.len();
        let points_after = self.deviation_simplified.len();
        StageMetrics::DouglasPeucker {
            tolerance: planar_tolerance(self.config.threshold, self.scale_factor),
            points_before,
            points_after,
            reduction_ratio: reduction_ratio(points_before, points_after),
        }
    }

    /// Project back to geographic coordinates and advance to the
    /// [`Unprojected`] stage.
    pub fn unproject(self) -> Unprojected {
        let reduced = unproject_with_endpoints(&self.source, &self.deviation_simplified);
        log::debug!(
            "unproject: {} -> {} points",
            self.source.len(),
            reduced.len(),
        );
        Unprojected {
            config: self.config,
            source: self.source,
            projected: self.projected,
            scale_factor: self.scale_factor,
            resampled: self.resampled,
            smoothed: self.smoothed,
            filtered: self.filtered,
            area_simplified: self.area_simplified,
            deviation_simplified: self.deviation_simplified,
            reduced,
        }
    }

    /// Shorthand for `.unproject().into_result()`.
    #[must_use]
    pub fn finish(self) -> StagedResult {
        self.unproject().into_result()
    }
}

// ───────────────────────── Stage 7: Unprojected ──────────────────────

/// Pipeline state after projecting back to geographic coordinates; the
/// final stage.
///
/// Call [`into_result`](Self::into_result) to extract the
/// [`StagedResult`] containing all intermediates.
#[must_use = "call .into_result() to extract the StagedResult"]
#[derive(Debug)]
pub struct Unprojected {
    config: ReduceConfig,
    source: Polyline,
    projected: Polyline,
    scale_factor: f64,
    resampled: Polyline,
    smoothed: Polyline,
    filtered: Polyline,
    area_simplified: Polyline,
    deviation_simplified: Polyline,
    reduced: Polyline,
}

impl Unprojected {
    /// The reduced geographic trace.
    #[must_use]
    pub const fn reduced(&self) -> &Polyline {
        &self.reduced
    }

    /// The configuration this pipeline ran with.
    #[must_use]
    pub const fn config(&self) -> &ReduceConfig {
        &self.config
    }

    /// Stage metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Unproject {
            point_count: self.reduced.len(),
        }
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            source: self.source,
            projected: self.projected,
            resampled: self.resampled,
            smoothed: self.smoothed,
            filtered: self.filtered,
            area_simplified: self.area_simplified,
            deviation_simplified: self.deviation_simplified,
            reduced: self.reduced,
            scale_factor: self.scale_factor,
        }
    }
}

/// Fraction of points removed: `1.0 - after / before`, or 0 when
/// `before` is 0.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn reduction_ratio(before: usize, after: usize) -> f64 {
    if before == 0 {
        0.0
    } else {
        1.0 - after as f64 / before as f64
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 8;

/// Trait implemented by every pipeline stage, enabling uniform iteration.
///
/// Each stage struct implements it, and [`Stage`] delegates to whichever
/// variant it holds.
///
/// # Loop pattern
///
/// ```rust
/// # use trackreduce_pipeline::{Pipeline, Point, Polyline, ReduceConfig, ReduceError};
/// # use trackreduce_pipeline::pipeline::{Advance, Stage};
/// # fn run() -> Result<(), ReduceError> {
/// # let trace = Polyline::new(vec![Point::new(0.0, 0.0), Point::new(0.001, 0.0)]);
/// let mut stage: Stage = Pipeline::new(trace, ReduceConfig::default())?.into();
/// loop {
///     match stage.advance() {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete();
/// assert_eq!(result.reduced.len(), 2);
/// # Ok(())
/// # }
/// ```
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage (e.g. `"source"`, `"smooth"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `7` for
    /// Unprojected).
    const INDEX: usize;

    /// The polyline this stage produced.
    fn output(&self) -> &Polyline;

    /// Stage-specific metrics for diagnostics.
    ///
    /// Returns `None` for the initial [`Pending`] stage which has not
    /// yet performed any processing.
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next stage, or `None` if already at the final
    /// stage.
    fn next(self) -> Option<Stage>;

    /// Run all remaining stages and return the final [`StagedResult`].
    fn complete(self) -> StagedResult;
}

macro_rules! impl_stage {
    ($ty:ident, $name:literal, $index:literal, $output:ident, $advance:ident, $variant:ident) => {
        impl PipelineStage for $ty {
            const NAME: &str = $name;
            const INDEX: usize = $index;

            fn output(&self) -> &Polyline {
                &self.$output
            }

            fn metrics(&self) -> Option<StageMetrics> {
                Some(Self::metrics(self))
            }

            fn next(self) -> Option<Stage> {
                Some(Stage::$variant(self.$advance()))
            }

            fn complete(self) -> StagedResult {
                self.$advance().complete()
            }
        }
    };
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn output(&self) -> &Polyline {
        &self.source
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Option<Stage> {
        Some(Stage::Projected(self.project()))
    }

    fn complete(self) -> StagedResult {
        self.project().complete()
    }
}

impl_stage!(Projected, "project", 1, projected, resample, Resampled);
impl_stage!(Resampled, "resample", 2, resampled, smooth, Smoothed);
impl_stage!(Smoothed, "smooth", 3, smoothed, filter, Filtered);
impl_stage!(Filtered, "filter", 4, filtered, simplify_area, AreaSimplified);
impl_stage!(
    AreaSimplified,
    "visvalingam",
    5,
    area_simplified,
    simplify_deviation,
    DeviationSimplified
);
impl_stage!(
    DeviationSimplified,
    "douglas_peucker",
    6,
    deviation_simplified,
    unproject,
    Unprojected
);

impl PipelineStage for Unprojected {
    const NAME: &str = "unproject";
    const INDEX: usize = 7;

    fn output(&self) -> &Polyline {
        &self.reduced
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(Self::metrics(self))
    }

    fn next(self) -> Option<Stage> {
        None
    }

    fn complete(self) -> StagedResult {
        self.into_result()
    }
}

/// Type-erased pipeline stage for loop-driven callers.
#[must_use]
#[derive(Debug)]
pub enum Stage {
    /// Stage 0: validated input.
    Pending(Pending),
    /// Stage 1: projected.
    Projected(Projected),
    /// Stage 2: resampled.
    Resampled(Resampled),
    /// Stage 3: smoothed.
    Smoothed(Smoothed),
    /// Stage 4: velocity-filtered.
    Filtered(Filtered),
    /// Stage 5: Visvalingam-Whyatt reduced.
    AreaSimplified(AreaSimplified),
    /// Stage 6: Douglas-Peucker reduced.
    DeviationSimplified(DeviationSimplified),
    /// Stage 7: back in geographic coordinates.
    Unprojected(Unprojected),
}

/// Result of [`Stage::advance`].
#[must_use]
#[derive(Debug)]
pub enum Advance {
    /// The pipeline moved to this stage.
    Next(Stage),
    /// The pipeline was already at its final stage, returned unchanged.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Projected(s) => s.$method($($arg),*),
            Self::Resampled(s) => s.$method($($arg),*),
            Self::Smoothed(s) => s.$method($($arg),*),
            Self::Filtered(s) => s.$method($($arg),*),
            Self::AreaSimplified(s) => s.$method($($arg),*),
            Self::DeviationSimplified(s) => s.$method($($arg),*),
            Self::Unprojected(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Human-readable name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, stage_name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, stage_index)
    }

    /// The polyline the current stage produced.
    #[must_use]
    pub fn output(&self) -> &Polyline {
        delegate!(self, output)
    }

    /// Stage-specific metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, stage_metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Unprojected(_))
    }

    /// Advance to the next stage, or `None` if already complete (the
    /// final stage is consumed).
    #[must_use]
    pub fn next(self) -> Option<Self> {
        delegate!(self, next_stage)
    }

    /// Advance to the next stage, returning `self` unchanged if already
    /// complete.
    ///
    /// This is the loop-friendly version of [`next`](Self::next).
    pub fn advance(self) -> Advance {
        match self {
            Self::Unprojected(s) => Advance::Complete(Self::Unprojected(s)),
            Self::Pending(s) => Advance::Next(Self::Projected(s.project())),
            Self::Projected(s) => Advance::Next(Self::Resampled(s.resample())),
            Self::Resampled(s) => Advance::Next(Self::Smoothed(s.smooth())),
            Self::Smoothed(s) => Advance::Next(Self::Filtered(s.filter())),
            Self::Filtered(s) => Advance::Next(Self::AreaSimplified(s.simplify_area())),
            Self::AreaSimplified(s) => {
                Advance::Next(Self::DeviationSimplified(s.simplify_deviation()))
            }
            Self::DeviationSimplified(s) => Advance::Next(Self::Unprojected(s.unproject())),
        }
    }

    /// Run all remaining stages to completion.
    #[must_use]
    pub fn complete(self) -> StagedResult {
        delegate!(self, complete_stage)
    }
}

// The trait's associated constants are not callable through `self`, and
// its methods share names with the inherent stage methods, so the
// `delegate!` macro goes through this private helper.
trait StageDispatch {
    fn stage_name(&self) -> &'static str;
    fn stage_index(&self) -> usize;
    fn stage_metrics(&self) -> Option<StageMetrics>;
    fn next_stage(self) -> Option<Stage>;
    fn complete_stage(self) -> StagedResult;
}

impl<T: PipelineStage> StageDispatch for T {
    fn stage_name(&self) -> &'static str {
        T::NAME
    }

    fn stage_index(&self) -> usize {
        T::INDEX
    }

    fn stage_metrics(&self) -> Option<StageMetrics> {
        PipelineStage::metrics(self)
    }

    fn next_stage(self) -> Option<Stage> {
        PipelineStage::next(self)
    }

    fn complete_stage(self) -> StagedResult {
        PipelineStage::complete(self)
    }
}

macro_rules! impl_from_stage {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Stage {
                fn from(s: $variant) -> Self {
                    Self::$variant(s)
                }
            }
        )*
    };
}

impl_from_stage!(
    Pending,
    Projected,
    Resampled,
    Smoothed,
    Filtered,
    AreaSimplified,
    DeviationSimplified,
    Unprojected,
);

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental trace reduction pipeline.
///
/// Created via [`Pipeline::new`], which validates the source trace and
/// config without doing any processing. Each stage method consumes the
/// current state and returns the next, making it a compile-time error
/// to skip stages or call them out of order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from a geographic trace (`x` = longitude,
    /// `y` = latitude, degrees) and config.
    ///
    /// # Errors
    ///
    /// Returns [`ReduceError::InvalidConfig`] if the config fails
    /// [`ReduceConfig::validate`], and
    /// [`ReduceError::NonFiniteCoordinate`] for the first input point
    /// with a NaN or infinite coordinate.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(source: Polyline, config: ReduceConfig) -> Result<Pending, ReduceError> {
        validate_input(&source, &config)?;
        Ok(Pending { config, source })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Point;

    /// A short eastward walk in Berlin with a small kink.
    fn walk() -> Polyline {
        Polyline::new(vec![
            Point::new(13.4050, 52.5200),
            Point::new(13.4055, 52.52005),
            Point::new(13.4060, 52.5200),
            Point::new(13.4070, 52.5201),
            Point::new(13.4080, 52.5200),
        ])
    }

    fn pending() -> Pending {
        Pipeline::new(walk(), ReduceConfig::default()).unwrap()
    }

    // ─────────── Validation ─────────────────────────────────────

    #[test]
    fn new_rejects_invalid_config() {
        let config = ReduceConfig {
            noise: 0.0,
            ..ReduceConfig::default()
        };
        let result = Pipeline::new(walk(), config);
        assert!(matches!(result, Err(ReduceError::InvalidConfig(_))));
    }

    #[test]
    fn new_rejects_non_finite_coordinate() {
        let mut points = walk().into_points();
        points[3].y = f64::NAN;
        let result = Pipeline::new(Polyline::new(points), ReduceConfig::default());
        assert!(matches!(
            result,
            Err(ReduceError::NonFiniteCoordinate { index: 3 })
        ));
    }

    #[test]
    fn pending_exposes_source_and_config() {
        let pending = pending();
        assert_eq!(pending.source(), &walk());
        assert_eq!(pending.config(), &ReduceConfig::default());
    }

    // ─────────── Typed API tests ─────────────────────────────────

    #[test]
    fn projected_is_planar_and_scaled() {
        let projected = pending().project();
        assert_eq!(projected.projected().len(), 5);
        // Berlin: 1 / cos(52.52 deg) is about 1.645.
        assert!((projected.scale_factor() - 1.645).abs() < 0.01);
        assert!(projected.projected().points()[0].x > 1_000_000.0);
    }

    #[test]
    fn resampled_has_about_one_meter_spacing() {
        let resampled = pending().project().resample();
        let pts = resampled.resampled().points();
        assert!(pts.len() > 100);
        for w in pts.windows(2) {
            assert!(w[0].distance(w[1]) <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn smoothed_and_filtered_keep_length() {
        let smoothed = pending().project().resample().smooth();
        let n = smoothed.smoothed().len();
        let filtered = smoothed.filter();
        assert_eq!(filtered.filtered().len(), n);
    }

    #[test]
    fn simplification_stages_only_shrink() {
        let filtered = pending().project().resample().smooth().filter();
        let before = filtered.filtered().len();
        let area = filtered.simplify_area();
        let after_area = area.area_simplified().len();
        assert!(after_area <= before);
        let deviation = area.simplify_deviation();
        assert!(deviation.deviation_simplified().len() <= after_area);
        assert!(deviation.deviation_simplified().len() >= 2);
    }

    #[test]
    fn finish_preserves_endpoints_exactly() {
        let source = walk();
        let result = Pipeline::new(source.clone(), ReduceConfig::default())
            .unwrap()
            .project()
            .resample()
            .smooth()
            .filter()
            .simplify_area()
            .simplify_deviation()
            .finish();
        assert_eq!(result.source, source);
        assert_eq!(result.reduced.first(), source.first());
        assert_eq!(result.reduced.last(), source.last());
        assert_eq!(result.reduced.len(), result.deviation_simplified.len());
    }

    #[test]
    fn thresholds_scale_with_latitude() {
        let filtered = pending().project().resample().smooth().filter();
        let tolerance = filtered.tolerance();
        assert!((tolerance - filtered.scale_factor * 1.0).abs() < 1e-12);
        assert!((area_threshold(tolerance) - 6.0 * tolerance * tolerance).abs() < 1e-12);
    }

    #[test]
    fn short_input_passes_through() {
        for points in [vec![], vec![Point::new(2.35, 48.85)]] {
            let source = Polyline::new(points);
            let result = Pipeline::new(source.clone(), ReduceConfig::default())
                .unwrap()
                .project()
                .resample()
                .smooth()
                .filter()
                .simplify_area()
                .simplify_deviation()
                .finish();
            assert_eq!(result.reduced, source);
        }
    }

    // ─────────── Metrics ─────────────────────────────────────────

    #[test]
    fn stage_metrics_report_counts() {
        let resampled = pending().project().resample();
        let metrics = resampled.metrics();
        assert!(matches!(
            metrics,
            StageMetrics::Resample { segment_count, points_before: 5, points_after, .. }
                if points_after == segment_count + 1
        ));
    }

    #[test]
    fn reduction_ratio_values() {
        assert!((reduction_ratio(0, 0) - 0.0).abs() < f64::EPSILON);
        assert!((reduction_ratio(100, 25) - 0.75).abs() < 1e-12);
        assert!((reduction_ratio(10, 10) - 0.0).abs() < 1e-12);
    }

    // ─────────── Stage enum ──────────────────────────────────────

    #[test]
    fn stage_loop_visits_every_stage_in_order() {
        let mut stage: Stage = pending().into();
        let mut names = vec![stage.name()];
        let mut indices = vec![stage.index()];
        assert!(stage.metrics().is_none());
        loop {
            match stage.advance() {
                Advance::Next(next) => {
                    assert!(next.metrics().is_some());
                    names.push(next.name());
                    indices.push(next.index());
                    stage = next;
                }
                Advance::Complete(done) => {
                    stage = done;
                    break;
                }
            }
        }
        assert!(stage.is_complete());
        assert_eq!(
            names,
            [
                "source",
                "project",
                "resample",
                "smooth",
                "filter",
                "visvalingam",
                "douglas_peucker",
                "unproject",
            ],
        );
        assert_eq!(indices, (0..STAGE_COUNT).collect::<Vec<_>>());
        assert_eq!(stage.output().first(), walk().first());
    }

    #[test]
    fn stage_next_consumes_final_stage() {
        let stage: Stage = pending()
            .project()
            .resample()
            .smooth()
            .filter()
            .simplify_area()
            .simplify_deviation()
            .unproject()
            .into();
        assert!(stage.next().is_none());
    }

    #[test]
    fn stage_complete_matches_typed_chain() {
        let from_stage = Stage::from(pending().project()).complete();
        let typed = pending()
            .project()
            .resample()
            .smooth()
            .filter()
            .simplify_area()
            .simplify_deviation()
            .finish();
        assert_eq!(from_stage, typed);
    }
}
