//! Uniform arc-length resampling.
//!
//! This is step 2 in the pipeline, between projection and smoothing.
//!
//! Raw fixes arrive at irregular spacing (stops, speed changes, dropped
//! samples). Downstream stages reason in "ticks" rather than wall-clock
//! time, so the trace is rewritten as evenly spaced points along its
//! planar length, interpolating linearly between the original vertices.

use crate::types::{Point, Polyline};

/// Rewrite `polyline` as `segments + 1` points at equal arc-length
/// spacing.
///
/// The first and last points of the input are reproduced exactly.
/// Returns the polyline unchanged (by clone) when it has fewer than 2
/// points, when `segments` is 0, or when its total length is 0.
///
/// # Examples
///
/// ```
/// use trackreduce_pipeline::{Point, Polyline};
/// use trackreduce_pipeline::resample::resample;
///
/// let polyline = Polyline::new(vec![
///     Point::new(0.0, 0.0),
///     Point::new(10.0, 0.0),
/// ]);
/// let result = resample(&polyline, 4);
/// assert_eq!(result.len(), 5);
/// assert_eq!(result.points()[2], Point::new(5.0, 0.0));
/// ```
#[must_use = "returns the resampled polyline"]
pub fn resample(polyline: &Polyline, segments: usize) -> Polyline {
    let points = polyline.points();
    let total = polyline.length();
    if points.len() < 2 || segments == 0 || total <= 0.0 || !total.is_finite() {
        return polyline.clone();
    }

    #[allow(clippy::cast_precision_loss)]
    let step = total / segments as f64;

    let mut result = Vec::with_capacity(segments + 1);
    result.push(points[0]);

    // Walk the original segments once, carrying the arc length at the
    // start of the current segment.
    let mut seg = 0;
    let mut seg_start = 0.0;
    let mut seg_len = points[0].distance(points[1]);

    for k in 1..segments {
        #[allow(clippy::cast_precision_loss)]
        let target = step * k as f64;

        while seg_start + seg_len < target && seg + 2 < points.len() {
            seg_start += seg_len;
            seg += 1;
            seg_len = points[seg].distance(points[seg + 1]);
        }

        let a = points[seg];
        let b = points[seg + 1];
        let t = if seg_len > 0.0 {
            ((target - seg_start) / seg_len).clamp(0.0, 1.0)
        } else {
            0.0
        };
        result.push(Point::new(
            (b.x - a.x).mul_add(t, a.x),
            (b.y - a.y).mul_add(t, a.y),
        ));
    }

    result.push(points[points.len() - 1]);
    Polyline::new(result)
}

/// Number of segments that gives ~1 meter spacing along a planar
/// polyline: `ceil(length)`.
#[must_use]
pub fn unit_segment_count(polyline: &Polyline) -> usize {
    let length = polyline.length();
    if length.is_finite() && length > 0.0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = length.ceil() as usize;
        count
    } else {
        0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Helper: build a simple polyline from (x, y) pairs.
    fn poly(coords: &[(f64, f64)]) -> Polyline {
        Polyline::new(coords.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    // --- No-op cases ---

    #[test]
    fn empty_polyline_returns_empty() {
        assert!(resample(&poly(&[]), 10).is_empty());
    }

    #[test]
    fn single_point_returns_unchanged() {
        let result = resample(&poly(&[(1.0, 2.0)]), 10);
        assert_eq!(result.points(), &[Point::new(1.0, 2.0)]);
    }

    #[test]
    fn zero_length_returns_unchanged() {
        let p = poly(&[(3.0, 3.0), (3.0, 3.0), (3.0, 3.0)]);
        assert_eq!(resample(&p, 5), p);
    }

    #[test]
    fn zero_segments_returns_unchanged() {
        let p = poly(&[(0.0, 0.0), (10.0, 0.0)]);
        assert_eq!(resample(&p, 0), p);
    }

    // --- Spacing ---

    #[test]
    fn produces_segments_plus_one_points() {
        let p = poly(&[(0.0, 0.0), (7.0, 0.0), (7.0, 5.0)]);
        for segments in [1, 2, 3, 12, 100] {
            assert_eq!(resample(&p, segments).len(), segments + 1);
        }
    }

    #[test]
    fn endpoints_are_exact() {
        let p = poly(&[(0.1, 0.2), (5.3, 1.7), (9.9, -4.2)]);
        let result = resample(&p, 17);
        assert_eq!(result.first(), p.first());
        assert_eq!(result.last(), p.last());
    }

    #[test]
    fn spacing_is_uniform_along_a_corner() {
        // L-shape: 6 along x then 4 along y, total 10, 10 segments of 1.
        let p = poly(&[(0.0, 0.0), (6.0, 0.0), (6.0, 4.0)]);
        let result = resample(&p, 10);
        let pts = result.points();
        assert!(pts[3].distance(Point::new(3.0, 0.0)) < 1e-12);
        assert!(pts[6].distance(Point::new(6.0, 0.0)) < 1e-12);
        assert!(pts[8].distance(Point::new(6.0, 2.0)) < 1e-12);
    }

    #[test]
    fn arc_length_between_samples_is_constant_on_straight_runs() {
        let p = poly(&[(0.0, 0.0), (2.5, 0.0), (3.0, 0.0), (10.0, 0.0)]);
        let result = resample(&p, 20);
        for w in result.points().windows(2) {
            assert!((w[0].distance(w[1]) - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn skips_coincident_vertices() {
        let p = poly(&[(0.0, 0.0), (0.0, 0.0), (4.0, 0.0), (4.0, 0.0), (4.0, 4.0)]);
        let result = resample(&p, 8);
        assert_eq!(result.len(), 9);
        assert!(result.points()[4].distance(Point::new(4.0, 0.0)) < 1e-12);
        assert!(result.points()[6].distance(Point::new(4.0, 2.0)) < 1e-12);
    }

    #[test]
    fn preserves_trace_order() {
        let p = poly(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let result = resample(&p, 30);
        let along: Vec<f64> = result
            .points()
            .iter()
            .map(|pt| {
                if pt.y < 1e-9 {
                    pt.x
                } else if (pt.x - 10.0).abs() < 1e-9 {
                    10.0 + pt.y
                } else {
                    30.0 - pt.x
                }
            })
            .collect();
        assert!(along.windows(2).all(|w| w[1] > w[0]));
    }

    // --- Segment count ---

    #[test]
    fn unit_segment_count_rounds_up() {
        assert_eq!(unit_segment_count(&poly(&[(0.0, 0.0), (3.2, 0.0)])), 4);
        assert_eq!(unit_segment_count(&poly(&[(0.0, 0.0), (3.0, 4.0)])), 5);
        assert_eq!(unit_segment_count(&poly(&[(1.0, 1.0)])), 0);
        assert_eq!(unit_segment_count(&poly(&[])), 0);
    }
}
