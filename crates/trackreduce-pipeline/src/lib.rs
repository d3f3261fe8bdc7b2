//! trackreduce-pipeline: Pure GPS trace reduction pipeline (sans-IO).
//!
//! Turns a dense, noisy trace of longitude/latitude fixes into a much
//! shorter polyline that still follows the travelled route:
//! projection -> resampling -> smoothing -> velocity filtering ->
//! area simplification -> deviation simplification -> inverse projection.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! polylines and returns structured data. File handling lives in
//! `trackreduce-bench`.

pub mod diagnostics;
pub mod kalman;
pub mod pipeline;
pub mod projection;
pub mod resample;
pub mod simplify;
pub mod smooth;
pub mod types;
pub mod visvalingam;

pub use pipeline::Pipeline;
pub use types::{Bound, Point, Polyline, ReduceConfig, ReduceError, StagedResult};

/// Reduce a geographic trace (`x` = longitude, `y` = latitude, degrees).
///
/// # Pipeline steps
///
/// 1. Project to Web Mercator meters
/// 2. Resample at ~1 planar meter spacing
/// 3. Centered moving-average smoothing (`config.smoothing`)
/// 4. Constant-velocity Kalman filter (`config.noise`)
/// 5. Visvalingam-Whyatt with area `6 * (threshold * scale)^2`
/// 6. Douglas-Peucker with tolerance `threshold * scale`
/// 7. Project back to longitude/latitude
///
/// `scale` is the projection scale factor at the center latitude of the
/// trace, so `threshold` stays in real-world meters.
///
/// The first and last fixes are always kept. A trace with fewer than 2
/// fixes is returned unchanged. Each call owns all of its state, so
/// concurrent calls may share `config`.
///
/// # Errors
///
/// Returns [`ReduceError::InvalidConfig`] if `config.noise` or
/// `config.threshold` is not finite and positive, and
/// [`ReduceError::NonFiniteCoordinate`] if any fix has a NaN or
/// infinite coordinate.
pub fn reduce(path: &Polyline, config: &ReduceConfig) -> Result<Polyline, ReduceError> {
    pipeline::validate_input(path, config)?;
    if path.len() < 2 {
        return Ok(path.clone());
    }

    // 1. Projection.
    let scale = projection::center_scale_factor(path);
    let planar = projection::project_polyline(path);

    // 2. Uniform resampling.
    let planar = resample::resample(&planar, resample::unit_segment_count(&planar));

    // 3. Moving-average smoothing.
    let planar = smooth::smooth(&planar, pipeline::half_window(config));

    // 4. Velocity filter.
    let planar = kalman::filter(&planar, config.noise);

    // 5-6. Simplification.
    let tolerance = pipeline::planar_tolerance(config.threshold, scale);
    let planar = visvalingam::simplify_vw(&planar, pipeline::area_threshold(tolerance));
    let planar = simplify::simplify_dp(&planar, tolerance);

    // 7. Back to geographic coordinates.
    let reduced = pipeline::unproject_with_endpoints(path, &planar);
    log::debug!("reduced {} -> {} fixes", path.len(), reduced.len());
    Ok(reduced)
}

/// Run the full pipeline, keeping every intermediate stage output.
///
/// Equivalent to driving [`Pipeline`] through every stage. The
/// `reduced` field of the result equals what [`reduce`] returns.
///
/// # Errors
///
/// Same as [`reduce`].
pub fn reduce_staged(path: &Polyline, config: &ReduceConfig) -> Result<StagedResult, ReduceError> {
    Ok(Pipeline::new(path.clone(), config.clone())?
        .project()
        .resample()
        .smooth()
        .filter()
        .simplify_area()
        .simplify_deviation()
        .finish())
}
