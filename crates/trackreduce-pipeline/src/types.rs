//! Shared types for the trackreduce pipeline.

use geo::BoundingRect;
use serde::{Deserialize, Serialize};

/// A 2D point.
///
/// The same type is used for both coordinate modes of the pipeline:
///
/// - **geographic**: `x` is longitude and `y` is latitude, in degrees;
/// - **planar**: `x` and `y` are Web Mercator meters.
///
/// Which mode a path is in is tracked by the pipeline stage holding it
/// (see [`crate::pipeline`]), not by the point itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Longitude (degrees) or easting (meters).
    pub x: f64,
    /// Latitude (degrees) or northing (meters).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Returns `true` if both coordinates are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

impl From<Point> for geo::Coord<f64> {
    fn from(p: Point) -> Self {
        Self { x: p.x, y: p.y }
    }
}

impl From<geo::Coord<f64>> for Point {
    fn from(c: geo::Coord<f64>) -> Self {
        Self::new(c.x, c.y)
    }
}

/// An ordered sequence of points forming a trace.
///
/// Point order is the trace order and is never changed by any stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Sum of the Euclidean segment lengths.
    ///
    /// Only meaningful for planar polylines; for geographic traces see
    /// [`crate::projection::geodesic_length`].
    #[must_use]
    pub fn length(&self) -> f64 {
        self.0.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    /// Axis-aligned bounding box, or `None` for an empty polyline.
    #[must_use]
    pub fn bound(&self) -> Option<Bound> {
        let line: geo::LineString<f64> = self.0.iter().copied().map(geo::Coord::from).collect();
        line.bounding_rect().map(|rect| Bound {
            min: rect.min().into(),
            max: rect.max().into(),
        })
    }
}

impl FromIterator<Point> for Polyline {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Axis-aligned bounding box of a [`Polyline`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    /// Minimum corner.
    pub min: Point,
    /// Maximum corner.
    pub max: Point,
}

impl Bound {
    /// Center of the box.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(
            f64::midpoint(self.min.x, self.max.x),
            f64::midpoint(self.min.y, self.max.y),
        )
    }

    /// Horizontal extent.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Vertical extent.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Smallest bound containing both `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }
}

/// Configuration for a single reduction run.
///
/// Supplied once per call and never modified by the pipeline, so a
/// shared reference can be used by concurrent reductions.
///
/// Use [`validate`](Self::validate) (or any pipeline entry point, which
/// validates eagerly) to reject non-positive `noise` and `threshold`.
/// `smoothing` is unsigned, so a negative half-window is rejected when
/// the configuration is parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReduceConfig {
    /// Moving-average half-window, in resampled points (~meters).
    pub smoothing: u32,

    /// Process-noise magnitude of the velocity filter.
    ///
    /// Larger values trust the constant-velocity model less and follow
    /// the observations more tightly; smaller values smooth harder.
    pub noise: f64,

    /// Simplification tolerance in real-world meters, before the
    /// latitude scale correction.
    pub threshold: f64,
}

impl ReduceConfig {
    /// Default moving-average half-window.
    pub const DEFAULT_SMOOTHING: u32 = 10;
    /// Default filter process-noise magnitude.
    pub const DEFAULT_NOISE: f64 = 200.0;
    /// Default simplification tolerance in meters.
    pub const DEFAULT_THRESHOLD: f64 = 1.0;

    /// Check the invariants that the type system does not enforce.
    ///
    /// # Errors
    ///
    /// Returns [`ReduceError::InvalidConfig`] if `noise` or `threshold`
    /// is not a finite, strictly positive number.
    pub fn validate(&self) -> Result<(), ReduceError> {
        if !(self.noise.is_finite() && self.noise > 0.0) {
            return Err(ReduceError::InvalidConfig(format!(
                "noise must be a finite positive number, got {}",
                self.noise
            )));
        }
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(ReduceError::InvalidConfig(format!(
                "threshold must be a finite positive number, got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            smoothing: Self::DEFAULT_SMOOTHING,
            noise: Self::DEFAULT_NOISE,
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }
}

/// Result of running the pipeline with all intermediate stage outputs
/// preserved.
///
/// Planar stages are in Web Mercator meters; `source` and `reduced`
/// are geographic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedResult {
    /// The input trace, unchanged.
    pub source: Polyline,
    /// Stage 1: projected to the plane.
    pub projected: Polyline,
    /// Stage 2: resampled at ~1 meter spacing.
    pub resampled: Polyline,
    /// Stage 3: moving-average smoothed.
    pub smoothed: Polyline,
    /// Stage 4: velocity-filtered.
    pub filtered: Polyline,
    /// Stage 5: Visvalingam-Whyatt reduced.
    pub area_simplified: Polyline,
    /// Stage 6: Douglas-Peucker reduced.
    pub deviation_simplified: Polyline,
    /// Final trace, projected back to geographic coordinates.
    pub reduced: Polyline,
    /// Projection scale factor at the center latitude of the trace.
    pub scale_factor: f64,
}

/// Errors that can occur during trace reduction.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum ReduceError {
    /// Reduction configuration is invalid.
    #[error("invalid reduction configuration: {0}")]
    InvalidConfig(String),

    /// An input fix has a NaN or infinite coordinate.
    #[error("input point {index} has a non-finite coordinate")]
    NonFiniteCoordinate {
        /// Position of the offending point in the input trace.
        index: usize,
    },
}
