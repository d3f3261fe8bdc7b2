//! Centered moving-average smoothing.
//!
//! This is step 3 in the pipeline, between resampling and the velocity
//! filter. Each point is replaced by the centroid of its neighbors
//! within a half-window of `half_window` points on either side.
//!
//! # Boundary policy
//!
//! Near the ends of the trace the window is truncated *symmetrically*:
//! the radius at index `i` is `min(half_window, i, n - 1 - i)`. Only
//! in-range points are averaged, and the divisor is the number of
//! points averaged. The window therefore always stays centered on the
//! point it replaces, which means:
//!
//! - the first and last points are reproduced exactly (radius 0);
//! - evenly spaced collinear points are a fixed point of the smoother,
//!   including at the boundaries.
//!
//! This is neither clamping (repeating the end point to fill the
//! window) nor one-sided truncation (averaging `0..=half_window` at
//! index 0). Both of those pull the ends of a straight, evenly spaced
//! run towards its interior, so the line would not survive smoothing
//! unchanged.
//!
//! Window sums come from prefix sums taken relative to the first
//! point, so the stage is linear in the trace length whatever the
//! half-window.

use crate::types::{Point, Polyline};

/// Smooth `polyline` with a centered moving average.
///
/// The output has the same length as the input. A `half_window` of 0,
/// or a polyline with fewer than 3 points, is returned unchanged.
#[must_use = "returns the smoothed polyline"]
pub fn smooth(polyline: &Polyline, half_window: usize) -> Polyline {
    let points = polyline.points();
    let n = points.len();
    if n < 3 || half_window == 0 {
        return polyline.clone();
    }

    // Offsets from the first point keep the running sums small.
    let origin = points[0];
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(Point::new(0.0, 0.0));
    let mut sum = Point::new(0.0, 0.0);
    for p in points {
        sum = Point::new(sum.x + (p.x - origin.x), sum.y + (p.y - origin.y));
        prefix.push(sum);
    }

    (0..n)
        .map(|i| {
            let radius = half_window.min(i).min(n - 1 - i);
            if radius == 0 {
                return points[i];
            }
            let upper = prefix[i + radius + 1];
            let lower = prefix[i - radius];
            #[allow(clippy::cast_precision_loss)]
            let count = (2 * radius + 1) as f64;
            Point::new(
                origin.x + (upper.x - lower.x) / count,
                origin.y + (upper.y - lower.y) / count,
            )
        })
        .collect()
}
