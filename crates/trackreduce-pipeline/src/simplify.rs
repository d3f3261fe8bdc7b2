//! Path simplification using the Ramer-Douglas-Peucker algorithm.
//!
//! Reduces point count by discarding every point that lies within a
//! given perpendicular distance of the chord between two kept anchors.
//! After this stage, every discarded point is within `tolerance` of the
//! segment of the output that replaced it.
//!
//! This is step 6 in the pipeline, after the Visvalingam-Whyatt pass.

use crate::types::{Point, Polyline};

/// Simplify a polyline using the Ramer-Douglas-Peucker algorithm.
///
/// Points within `tolerance` planar meters of the chord between their
/// anchors are removed. A tolerance of 0.0 only removes points lying
/// exactly on their chord.
///
/// Returns the simplified polyline. Polylines with fewer than 3 points
/// are returned unchanged (nothing to simplify).
#[must_use = "returns the simplified polyline"]
pub fn simplify_dp(polyline: &Polyline, tolerance: f64) -> Polyline {
    let points = polyline.points();
    if points.len() < 3 {
        return polyline.clone();
    }

    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[points.len() - 1] = true;

    // Explicit work stack: resampled traces can be long enough that a
    // recursive split would overflow on pathological shapes.
    let mut ranges = vec![(0, points.len() - 1)];
    while let Some((start, end)) = ranges.pop() {
        if end <= start + 1 {
            continue;
        }

        let mut max_dist = 0.0;
        let mut max_idx = start;
        for i in (start + 1)..end {
            let d = perpendicular_distance(points[i], points[start], points[end]);
            if d > max_dist {
                max_dist = d;
                max_idx = i;
            }
        }

        if max_dist > tolerance {
            kept[max_idx] = true;
            ranges.push((max_idx, end));
            ranges.push((start, max_idx));
        }
    }

    points
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect()
}

/// Perpendicular distance from point `p` to the line defined by `a` and `b`.
///
/// Uses the formula: |cross(b-a, p-a)| / |b-a|.
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
pub(crate) fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        // a and b are the same point.
        return p.distance(a);
    }

    // |cross product| / |line length|
    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_polyline_unchanged() {
        let pl = Polyline::new(vec![]);
        let result = simplify_dp(&pl, 1.0);
        assert!(result.is_empty());
    }

    #[test]
    fn single_point_unchanged() {
        let pl = Polyline::new(vec![Point::new(1.0, 2.0)]);
        let result = simplify_dp(&pl, 1.0);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn two_points_unchanged() {
        let pl = Polyline::new(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
        let result = simplify_dp(&pl, 1.0);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn zero_tolerance_preserves_off_chord_points() {
        let pl = Polyline::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.1),
            Point::new(2.0, 0.0),
            Point::new(3.0, 0.05),
            Point::new(4.0, 0.0),
        ]);
        let result = simplify_dp(&pl, 0.0);
        assert_eq!(result.len(), 5);
    }

    #[test]
    fn collinear_points_collapse_to_endpoints() {
        let pl = Polyline::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
            Point::new(3.0, 3.0),
            Point::new(4.0, 4.0),
        ]);
        let result = simplify_dp(&pl, 0.1);
        assert_eq!(result.len(), 2);
        assert_eq!(result.points()[0], Point::new(0.0, 0.0));
        assert_eq!(result.points()[1], Point::new(4.0, 4.0));
    }

    #[test]
    fn coincident_points_collapse() {
        let pl = Polyline::new(vec![Point::new(2.0, 2.0); 6]);
        let result = simplify_dp(&pl, 0.5);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn zigzag_retains_peaks() {
        let pl = Polyline::new(vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 5.0),
            Point::new(4.0, 0.0),
            Point::new(6.0, 5.0),
            Point::new(8.0, 0.0),
        ]);
        let result = simplify_dp(&pl, 1.0);
        assert_eq!(result.len(), 5);
    }

    #[test]
    fn large_tolerance_collapses_zigzag() {
        let pl = Polyline::new(vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 5.0),
            Point::new(4.0, 0.0),
            Point::new(6.0, 5.0),
            Point::new(8.0, 0.0),
        ]);
        let result = simplify_dp(&pl, 10.0);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn distance_equal_to_tolerance_is_discarded() {
        let pl = Polyline::new(vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 1.0),
            Point::new(10.0, 0.0),
        ]);
        assert_eq!(simplify_dp(&pl, 1.0).len(), 2);
    }

    #[test]
    fn removed_points_stay_within_tolerance_of_their_chord() {
        let pl: Polyline = (0..400)
            .map(|i| {
                let t = f64::from(i) * 0.25;
                Point::new(t, (t * 0.9).sin() * 4.0 + (t * 2.3).cos() * 0.8)
            })
            .collect();
        let tolerance = 0.5;
        let result = simplify_dp(&pl, tolerance);
        assert!(result.len() < pl.len());

        // Kept points appear in the input in order; check every input
        // point between two consecutive kept points.
        let pts = pl.points();
        let kept = result.points();
        let mut cursor = 0;
        for w in kept.windows(2) {
            while pts[cursor] != w[0] {
                cursor += 1;
            }
            let start = cursor;
            while pts[cursor] != w[1] {
                cursor += 1;
            }
            for p in &pts[start + 1..cursor] {
                let d = perpendicular_distance(*p, w[0], w[1]);
                assert!(d <= tolerance + 1e-9, "point {p:?} is {d} from its chord");
            }
        }
    }

    #[test]
    fn long_spiral_keeps_endpoints() {
        let pl: Polyline = (0..20_000)
            .map(|i| {
                let t = f64::from(i) * 0.01;
                Point::new(t * t.cos(), t * t.sin())
            })
            .collect();
        let result = simplify_dp(&pl, 0.001);
        assert!(result.len() >= 2);
        assert_eq!(result.first(), pl.first());
        assert_eq!(result.last(), pl.last());
    }

    #[test]
    fn perpendicular_distance_on_axis() {
        let d = perpendicular_distance(
            Point::new(1.0, 3.0),
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
        );
        assert!((d - 3.0).abs() < 1e-10);
    }

    #[test]
    fn perpendicular_distance_diagonal_segment() {
        // Point (2, -1) is ~1.789 from line (0,0)->(4,2).
        let d = perpendicular_distance(
            Point::new(2.0, -1.0),
            Point::new(0.0, 0.0),
            Point::new(4.0, 2.0),
        );
        let expected = 8.0 / 20.0_f64.sqrt();
        assert!((d - expected).abs() < 1e-10, "got {d}, expected {expected}",);
    }

    #[test]
    fn perpendicular_distance_coincident_endpoints() {
        let d = perpendicular_distance(
            Point::new(3.0, 4.0),
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.0),
        );
        assert!((d - 5.0).abs() < 1e-10);
    }
}
