//! Area-based simplification using the Visvalingam-Whyatt algorithm.
//!
//! This is step 5 in the pipeline, between the velocity filter and
//! Douglas-Peucker. Each interior point is weighted by the area of the
//! triangle it forms with its current neighbors; the point with the
//! smallest area is removed and its neighbors re-weighted, until every
//! remaining interior point has an area of at least the threshold.
//!
//! A binary heap with lazy invalidation keeps this `O(n log n)`.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::types::{Point, Polyline};

/// Remove interior points whose triangle area is below `threshold`
/// (square planar meters), smallest first.
///
/// The endpoints are never removed. Polylines with fewer than 3 points
/// are returned unchanged. A non-positive threshold removes nothing.
#[must_use = "returns the simplified polyline"]
pub fn simplify_vw(polyline: &Polyline, threshold: f64) -> Polyline {
    let points = polyline.points();
    let n = points.len();
    if n < 3 || threshold.is_nan() || threshold <= 0.0 {
        return polyline.clone();
    }

    // Doubly linked list over indices; `usize::MAX` marks "none".
    let mut prev: Vec<usize> = (0..n).map(|i| i.wrapping_sub(1)).collect();
    let mut next: Vec<usize> = (1..=n).collect();
    next[n - 1] = usize::MAX;
    let mut removed = vec![false; n];
    let mut generation = vec![0_u32; n];

    let mut heap: BinaryHeap<Candidate> = (1..n - 1)
        .map(|i| Candidate {
            area: triangle_area(points[i - 1], points[i], points[i + 1]),
            index: i,
            generation: 0,
        })
        .collect();

    while let Some(candidate) = heap.pop() {
        if candidate.area >= threshold {
            break;
        }
        let i = candidate.index;
        if removed[i] || candidate.generation != generation[i] {
            continue;
        }

        removed[i] = true;
        let (p, q) = (prev[i], next[i]);
        next[p] = q;
        prev[q] = p;

        // Re-weight the neighbors that are themselves interior points.
        for j in [p, q] {
            let (a, b) = (prev[j], next[j]);
            if a == usize::MAX || b == usize::MAX {
                continue;
            }
            generation[j] += 1;
            heap.push(Candidate {
                area: triangle_area(points[a], points[j], points[b]),
                index: j,
                generation: generation[j],
            });
        }
    }

    points
        .iter()
        .zip(&removed)
        .filter(|&(_, r)| !*r)
        .map(|(&p, _)| p)
        .collect()
}

/// Area of the triangle `abc`.
///
/// Coincident or collinear points give zero, so they are the first to go.
fn triangle_area(a: Point, b: Point, c: Point) -> f64 {
    let cross = (b.x - a.x).mul_add(c.y - a.y, -((c.x - a.x) * (b.y - a.y)));
    cross.abs() / 2.0
}

/// Heap entry ordered so that the smallest area pops first.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    area: f64,
    index: usize,
    generation: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap. Ties go to the earlier index.
        other
            .area
            .total_cmp(&self.area)
            .then_with(|| other.index.cmp(&self.index))
    }
}
