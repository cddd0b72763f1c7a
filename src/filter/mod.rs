mod ekf;
mod kalman;

use crate::error::Error;
pub use ekf::{BearingPairModel, ExtendedKalmanFilter};
pub use kalman::KalmanFilter;
use nalgebra::{Matrix2, Point2, Vector2};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Relative tolerance used when checking a noise model for symmetry.
const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// An innovation covariance whose determinant is below this fraction of its
/// squared norm is treated as singular.
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// A recursive estimator of a stationary 2D position.
pub trait PositionFilter {
    type Measurement;

    /// Propagates the estimate one step forward.
    fn predict(&mut self);

    /// Corrects the estimate with `measurement`.
    ///
    /// The estimate is left untouched if the update fails.
    fn update(&mut self, measurement: &Self::Measurement) -> Result<&PositionEstimate, Error>;

    fn state(&self) -> &PositionEstimate;
}

/// A 2D position and its covariance.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PositionEstimate {
    pub mean: Vector2<f64>,
    pub covariance: Matrix2<f64>,
}

impl PositionEstimate {
    pub fn new(mean: Vector2<f64>, covariance: Matrix2<f64>) -> Self {
        Self { mean, covariance }
    }

    /// An estimate at `position` with an isotropic covariance of `variance`.
    pub fn isotropic(position: Point2<f64>, variance: f64) -> Self {
        Self::new(position.coords, Matrix2::identity() * variance)
    }

    pub fn position(&self) -> Point2<f64> {
        Point2::from(self.mean)
    }

    /// The total variance of the estimate.
    pub fn trace(&self) -> f64 {
        self.covariance.trace()
    }

    pub fn is_finite(&self) -> bool {
        self.mean.iter().chain(self.covariance.iter()).all(|v| v.is_finite())
    }
}

/// Checks that `matrix` is a finite, symmetric, positive semi-definite covariance.
fn validate_covariance(matrix: &Matrix2<f64>, name: &'static str) -> Result<(), Error> {
    let scale = matrix.amax().max(1.0);
    let finite = matrix.iter().all(|v| v.is_finite());
    let symmetric = (matrix[(0, 1)] - matrix[(1, 0)]).abs() <= SYMMETRY_TOLERANCE * scale;

    // A symmetric 2x2 matrix is PSD iff its diagonal and determinant are non-negative.
    let tolerance = SYMMETRY_TOLERANCE * scale * scale;
    let psd = matrix[(0, 0)] >= 0.0
        && matrix[(1, 1)] >= 0.0
        && matrix.determinant() >= -tolerance;

    match finite && symmetric && psd {
        true => Ok(()),
        false => Err(Error::InvalidNoiseModel { name }),
    }
}

fn symmetrize(matrix: Matrix2<f64>) -> Matrix2<f64> {
    (matrix + matrix.transpose()) * 0.5
}

/// Checks a posterior estimate before it replaces the current one.
fn validate_posterior(estimate: &PositionEstimate) -> Result<(), Error> {
    if !estimate.is_finite() {
        return Err(Error::DegenerateUpdate);
    }

    validate_covariance(&estimate.covariance, "posterior covariance")
        .map_err(|_| Error::DegenerateUpdate)
}

/// Inverts an innovation covariance.
///
/// Fails on near-singular matrices, where the gain would blow up.
fn invert_innovation(innovation: Matrix2<f64>) -> Result<Matrix2<f64>, Error> {
    // Also rejects NaN.
    if !(innovation.determinant().abs() > SINGULAR_TOLERANCE * innovation.norm_squared()) {
        return Err(Error::SingularInnovation);
    }

    innovation
        .try_inverse()
        .filter(|inverse| inverse.iter().all(|v| v.is_finite()))
        .ok_or(Error::SingularInnovation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case(Matrix2::identity())]
    #[case(Matrix2::zeros())]
    #[case(Matrix2::new(2.0, 1.0, 1.0, 2.0))]
    #[case(Matrix2::new(1.0, 1.0, 1.0, 1.0))]
    fn accepts_psd(#[case] matrix: Matrix2<f64>) {
        assert_eq!(validate_covariance(&matrix, "Q"), Ok(()));
    }

    #[rstest]
    #[case(Matrix2::new(1.0, 0.5, 0.0, 1.0))]
    #[case(Matrix2::new(-1.0, 0.0, 0.0, 1.0))]
    #[case(Matrix2::new(1.0, 2.0, 2.0, 1.0))]
    #[case(Matrix2::new(f64::NAN, 0.0, 0.0, 1.0))]
    fn rejects_invalid(#[case] matrix: Matrix2<f64>) {
        assert_eq!(
            validate_covariance(&matrix, "R"),
            Err(Error::InvalidNoiseModel { name: "R" })
        );
    }

    #[rstest]
    #[case(Matrix2::zeros())]
    #[case(Matrix2::new(1.0, 1.0, 1.0, 1.0))]
    #[case(Matrix2::new(1.0, 1.0, 1.0, 1.0 + 1e-13))]
    #[case(Matrix2::new(f64::NAN, 0.0, 0.0, 1.0))]
    fn near_singular_innovation(#[case] matrix: Matrix2<f64>) {
        assert_eq!(invert_innovation(matrix), Err(Error::SingularInnovation));
    }

    #[test]
    fn small_innovation_is_inverted() {
        let inverse = invert_innovation(Matrix2::identity() * 1e-8).unwrap();
        assert_relative_eq!(inverse, Matrix2::identity() * 1e8, max_relative = 1e-12);
    }

    #[rstest]
    #[case(Matrix2::new(0.882, 0.510, 0.510, -0.373))]
    #[case(Matrix2::new(-1e-3, 0.0, 0.0, 1.0))]
    #[case(Matrix2::new(1.0, f64::INFINITY, f64::INFINITY, 1.0))]
    fn posterior_must_be_psd(#[case] covariance: Matrix2<f64>) {
        let estimate = PositionEstimate::new(Vector2::new(1.0, 2.0), covariance);
        assert_eq!(validate_posterior(&estimate), Err(Error::DegenerateUpdate));
    }

    #[test]
    fn posterior_with_non_finite_mean() {
        let estimate = PositionEstimate::new(Vector2::new(f64::NAN, 0.0), Matrix2::identity());
        assert_eq!(validate_posterior(&estimate), Err(Error::DegenerateUpdate));
        assert_eq!(
            validate_posterior(&PositionEstimate::isotropic(Point2::origin(), 1e-6)),
            Ok(())
        );
    }

    #[test]
    fn isotropic_estimate() {
        let estimate = PositionEstimate::isotropic(Point2::new(5.0, -10.0), 100.0);
        assert_eq!(estimate.position(), Point2::new(5.0, -10.0));
        assert_eq!(estimate.trace(), 200.0);
        assert!(estimate.is_finite());
    }
}
