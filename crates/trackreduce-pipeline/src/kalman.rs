//! Constant-velocity Kalman filter over planar positions.
//!
//! This is step 4 in the pipeline, between smoothing and simplification.
//!
//! State vector: `[x, y, vx, vy]` (meters, meters per tick). Only the
//! position is observed. One tick corresponds to one resampled point,
//! so the time step is fixed at [`TIME_STEP`] rather than wall-clock
//! time.
//!
//! A [`VelocityFilter`] is a plain local value: each reduction creates
//! its own and drops it afterwards, so concurrent reductions never share
//! filter state.

use nalgebra::{Matrix2, Matrix2x4, Matrix4, Matrix4x2, Vector2, Vector4};

use crate::types::{Point, Polyline};

/// Time elapsed between two consecutive observations, in ticks.
pub const TIME_STEP: f64 = 1.0;

/// Variance of each observed coordinate, in square meters.
pub const MEASUREMENT_VARIANCE: f64 = 1.0;

/// Acceleration variance per unit of `noise`, in m²/tick⁴.
pub const ACCELERATION_VARIANCE_PER_NOISE: f64 = 1e-4;

/// Velocity variance assumed before the second observation.
const INITIAL_VELOCITY_VARIANCE: f64 = 1e6;

/// Kalman filter with a 4-dimensional constant-velocity state.
#[derive(Debug, Clone)]
pub struct VelocityFilter {
    /// `[x, y, vx, vy]`.
    state: Vector4<f64>,
    /// State covariance.
    covariance: Matrix4<f64>,
    /// State transition for one tick.
    transition: Matrix4<f64>,
    /// Process-noise covariance for one tick.
    process_noise: Matrix4<f64>,
    /// Observation-noise covariance.
    measurement_noise: Matrix2<f64>,
    /// `false` until the first observation has been absorbed.
    initialized: bool,
}

impl VelocityFilter {
    /// Create a filter with the given process-noise magnitude.
    ///
    /// The process noise follows the discrete white-noise-acceleration
    /// model with acceleration variance
    /// `noise * ACCELERATION_VARIANCE_PER_NOISE`. Larger `noise` lets the
    /// estimated velocity change faster, so the output follows the
    /// observations more tightly.
    ///
    /// `noise` is expected to be finite and positive (validated by
    /// [`ReduceConfig::validate`](crate::ReduceConfig::validate)).
    #[must_use]
    pub fn new(noise: f64) -> Self {
        let dt = TIME_STEP;
        let q = noise * ACCELERATION_VARIANCE_PER_NOISE;
        let pp = q * dt.powi(4) / 4.0;
        let pv = q * dt.powi(3) / 2.0;
        let vv = q * dt.powi(2);

        #[rustfmt::skip]
        let transition = Matrix4::new(
            1.0, 0.0, dt,  0.0,
            0.0, 1.0, 0.0, dt,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        #[rustfmt::skip]
        let process_noise = Matrix4::new(
            pp,  0.0, pv,  0.0,
            0.0, pp,  0.0, pv,
            pv,  0.0, vv,  0.0,
            0.0, pv,  0.0, vv,
        );

        Self {
            state: Vector4::zeros(),
            covariance: Matrix4::identity(),
            transition,
            process_noise,
            measurement_noise: Matrix2::identity() * MEASUREMENT_VARIANCE,
            initialized: false,
        }
    }

    /// Observation model: position only.
    #[rustfmt::skip]
    fn observation() -> Matrix2x4<f64> {
        Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
        )
    }

    /// Absorb one positional observation and return the corrected
    /// position.
    ///
    /// The first observation initializes the filter: the position is
    /// taken as-is with zero velocity and a high velocity variance, and
    /// is returned unchanged.
    pub fn update(&mut self, observation: Point) -> Point {
        if !self.initialized {
            self.state = Vector4::new(observation.x, observation.y, 0.0, 0.0);
            self.covariance = Matrix4::from_diagonal(&Vector4::new(
                MEASUREMENT_VARIANCE,
                MEASUREMENT_VARIANCE,
                INITIAL_VELOCITY_VARIANCE,
                INITIAL_VELOCITY_VARIANCE,
            ));
            self.initialized = true;
            return observation;
        }

        // Predict.
        let predicted_state = self.transition * self.state;
        let predicted_covariance =
            self.transition * self.covariance * self.transition.transpose() + self.process_noise;

        // Update.
        let h = Self::observation();
        let z = Vector2::new(observation.x, observation.y);
        let innovation = z - h * predicted_state;
        let s = h * predicted_covariance * h.transpose() + self.measurement_noise;
        let gain: Matrix4x2<f64> = predicted_covariance * h.transpose() * invert_innovation(&s);

        self.state = predicted_state + gain * innovation;

        // Joseph form keeps the covariance symmetric positive definite.
        let i_kh = Matrix4::identity() - gain * h;
        self.covariance = i_kh * predicted_covariance * i_kh.transpose()
            + gain * self.measurement_noise * gain.transpose();

        self.position()
    }

    /// Current position estimate.
    #[must_use]
    pub fn position(&self) -> Point {
        Point::new(self.state[0], self.state[1])
    }

    /// Current velocity estimate, in meters per tick.
    #[must_use]
    pub fn velocity(&self) -> Point {
        Point::new(self.state[2], self.state[3])
    }

    /// Trace of the position block of the covariance.
    ///
    /// Shrinks as consistent observations accumulate.
    #[must_use]
    pub fn position_variance(&self) -> f64 {
        self.covariance[(0, 0)] + self.covariance[(1, 1)]
    }
}

/// Inverse of the 2x2 innovation covariance `S = H P Hᵀ + R`.
///
/// `H P Hᵀ` is positive semi-definite and `R` is
/// `MEASUREMENT_VARIANCE * I`, so every eigenvalue of `S` is at least
/// `MEASUREMENT_VARIANCE` and `det(S) >= MEASUREMENT_VARIANCE²`.
fn invert_innovation(s: &Matrix2<f64>) -> Matrix2<f64> {
    let det = s[(0, 0)].mul_add(s[(1, 1)], -(s[(0, 1)] * s[(1, 0)]));
    Matrix2::new(s[(1, 1)], -s[(0, 1)], -s[(1, 0)], s[(0, 0)]) / det
}

/// Run a fresh [`VelocityFilter`] over every point of `polyline` except
/// the last, replacing each with the filtered position.
///
/// The last point passes through unchanged, as does the first (it seeds
/// the filter). Polylines with fewer than 3 points are returned as-is.
#[must_use = "returns the filtered polyline"]
pub fn filter(polyline: &Polyline, noise: f64) -> Polyline {
    let points = polyline.points();
    if points.len() < 3 {
        return polyline.clone();
    }

    let mut filter = VelocityFilter::new(noise);
    let mut filtered = points.to_vec();
    let last = filtered.len() - 1;
    for point in &mut filtered[..last] {
        *point = filter.update(*point);
    }
    Polyline::new(filtered)
}
