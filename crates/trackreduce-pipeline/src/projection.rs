//! Spherical Web Mercator projection between geographic degrees and
//! planar meters.
//!
//! This is stage 1 of the pipeline (and its inverse is the last stage).
//! The plane is conformal, so Euclidean distances and triangle areas
//! are meaningful locally, but lengths are stretched by
//! [`scale_factor`] as latitude grows.

use geo::line_measures::Distance;
use geo::Haversine;

use crate::types::{Point, Polyline};

/// Sphere radius used by Web Mercator (EPSG:3857), in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Latitude limit of the projection, in degrees.
///
/// Latitudes beyond this are clamped before projecting; at the limit
/// the projected plane is square.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Project a geographic point (`x` = longitude, `y` = latitude, degrees)
/// to planar meters.
#[must_use]
pub fn project(p: Point) -> Point {
    let lat = p.y.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = EARTH_RADIUS * p.x.to_radians();
    let y = EARTH_RADIUS * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();
    Point::new(x, y)
}

/// Inverse of [`project`]: planar meters back to longitude/latitude.
#[must_use]
pub fn inverse(p: Point) -> Point {
    let lng = (p.x / EARTH_RADIUS).to_degrees();
    let lat = 2.0f64
        .mul_add((p.y / EARTH_RADIUS).exp().atan(), -std::f64::consts::FRAC_PI_2)
        .to_degrees();
    Point::new(lng, lat)
}

/// Linear scale factor of the projection at `latitude` degrees.
///
/// A real-world distance `d` meters near that latitude spans
/// `d * scale_factor(latitude)` projected meters. Equal to 1 at the
/// equator and growing towards the poles.
///
/// Like [`project`], this is only meaningful within
/// +/-[`MAX_LATITUDE`], the domain where [`inverse`] round-trips.
/// Beyond it the latitude is clamped, so the factor stays flat at
/// about 11.59 instead of growing without bound.
#[must_use]
pub fn scale_factor(latitude: f64) -> f64 {
    1.0 / latitude
        .clamp(-MAX_LATITUDE, MAX_LATITUDE)
        .to_radians()
        .cos()
}

/// Project every point of a geographic polyline.
#[must_use]
pub fn project_polyline(polyline: &Polyline) -> Polyline {
    polyline.points().iter().copied().map(project).collect()
}

/// Inverse-project every point of a planar polyline.
#[must_use]
pub fn inverse_polyline(polyline: &Polyline) -> Polyline {
    polyline.points().iter().copied().map(inverse).collect()
}

/// Scale factor at the center latitude of the polyline's bounding box.
///
/// Returns 1.0 for an empty polyline.
#[must_use]
pub fn center_scale_factor(polyline: &Polyline) -> f64 {
    polyline
        .bound()
        .map_or(1.0, |bound| scale_factor(bound.center().y))
}

/// Great-circle length of a geographic polyline in meters.
#[must_use]
pub fn geodesic_length(polyline: &Polyline) -> f64 {
    polyline
        .points()
        .windows(2)
        .map(|w| {
            Haversine.distance(
                geo::Point::new(w[0].x, w[0].y),
                geo::Point::new(w[1].x, w[1].y),
            )
        })
        .sum()
}
