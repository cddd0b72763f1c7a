use super::{
    PositionEstimate, PositionFilter, invert_innovation, symmetrize, validate_covariance,
    validate_posterior,
};
use crate::error::Error;
use nalgebra::{Matrix2, Point2};

/// A linear Kalman filter for a stationary source observed directly in
/// position.
///
/// Both the state transition and the observation model are the identity.
#[derive(Clone, Debug)]
pub struct KalmanFilter {
    state: PositionEstimate,
    process_noise: Matrix2<f64>,
    measurement_noise: Matrix2<f64>,
}

impl KalmanFilter {
    /// Creates a new `KalmanFilter`.
    ///
    /// Returns an error if the initial covariance, `process_noise` or
    /// `measurement_noise` is not a finite symmetric PSD matrix.
    pub fn new(
        initial: PositionEstimate,
        process_noise: Matrix2<f64>,
        measurement_noise: Matrix2<f64>,
    ) -> Result<Self, Error> {
        validate_covariance(&initial.covariance, "initial covariance")?;
        validate_covariance(&process_noise, "process noise")?;
        validate_covariance(&measurement_noise, "measurement noise")?;

        Ok(Self {
            state: initial,
            process_noise,
            measurement_noise,
        })
    }

    /// Creates a new `KalmanFilter` with diagonal noise models.
    pub fn with_scales(
        initial_mean: Point2<f64>,
        initial_variance: f64,
        q_scale: f64,
        r_scale: f64,
    ) -> Result<Self, Error> {
        Self::new(
            PositionEstimate::isotropic(initial_mean, initial_variance),
            Matrix2::identity() * q_scale,
            Matrix2::identity() * r_scale,
        )
    }

    /// Replaces the current estimate.
    pub fn reinitialize(&mut self, estimate: PositionEstimate) -> Result<(), Error> {
        validate_covariance(&estimate.covariance, "initial covariance")?;
        self.state = estimate;
        Ok(())
    }
}

impl PositionFilter for KalmanFilter {
    type Measurement = Point2<f64>;

    fn predict(&mut self) {
        self.state.covariance += self.process_noise;
    }

    fn update(&mut self, measurement: &Point2<f64>) -> Result<&PositionEstimate, Error> {
        if !measurement.coords.iter().all(|v| v.is_finite()) {
            return Err(Error::NonFiniteMeasurement);
        }

        let p = self.state.covariance;
        let innovation = measurement.coords - self.state.mean;
        let s_inv = invert_innovation(p + self.measurement_noise)?;
        let gain = p * s_inv;

        let next = PositionEstimate {
            mean: self.state.mean + gain * innovation,
            covariance: symmetrize((Matrix2::identity() - gain) * p),
        };

        validate_posterior(&next)?;
        self.state = next;
        Ok(&self.state)
    }

    fn state(&self) -> &PositionEstimate {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng, rngs::StdRng};
    use rand_distr::StandardNormal;

    fn filter() -> KalmanFilter {
        KalmanFilter::with_scales(Point2::new(5.0, -10.0), 100.0, 1e-4, 0.1).unwrap()
    }

    #[test]
    fn predict_adds_process_noise() {
        let mut kf = filter();
        kf.predict();
        assert_relative_eq!(kf.state().covariance, Matrix2::identity() * (100.0 + 1e-4));
        assert_eq!(kf.state().position(), Point2::new(5.0, -10.0));
    }

    #[test]
    fn update_moves_towards_measurement() {
        let mut kf = filter();
        let state = *kf.update(&Point2::new(3.0, 4.0)).unwrap();

        // Gain is 100 / 100.1 on both axes.
        let gain = 100.0 / 100.1;
        assert_relative_eq!(state.mean.x, 5.0 + gain * (3.0 - 5.0), epsilon = 1e-12);
        assert_relative_eq!(state.mean.y, -10.0 + gain * 14.0, epsilon = 1e-12);
        assert_relative_eq!(state.trace(), 2.0 * (1.0 - gain) * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn converges_on_noisy_measurements() {
        let truth = Point2::new(3.0, 4.0);
        let mut kf = filter();
        let mut rng = StdRng::seed_from_u64(42);

        let mut trace = kf.state().trace();
        for _ in 0..150 {
            let noise_x: f64 = rng.sample(StandardNormal);
            let noise_y: f64 = rng.sample(StandardNormal);
            let measurement = truth + nalgebra::Vector2::new(noise_x, noise_y) * 0.1f64.sqrt();

            kf.predict();
            let state = kf.update(&measurement).unwrap();

            assert!(state.trace() <= trace + 1e-12);
            trace = state.trace();
        }

        assert!((kf.state().position() - truth).norm() < 0.3);
    }

    #[test]
    fn non_finite_measurement_leaves_state_untouched() {
        let mut kf = filter();
        let before = *kf.state();

        assert_eq!(
            kf.update(&Point2::new(f64::NAN, 0.0)).unwrap_err(),
            Error::NonFiniteMeasurement
        );
        assert_eq!(*kf.state(), before);
    }

    #[test]
    fn singular_innovation() {
        let mut kf =
            KalmanFilter::with_scales(Point2::origin(), 0.0, 0.0, 0.0).unwrap();

        assert_eq!(
            kf.update(&Point2::new(1.0, 1.0)).unwrap_err(),
            Error::SingularInnovation
        );
        assert_eq!(kf.state().position(), Point2::origin());
    }

    #[test]
    fn rejects_invalid_noise() {
        assert_eq!(
            KalmanFilter::with_scales(Point2::origin(), 1.0, -1e-4, 0.1).unwrap_err(),
            Error::InvalidNoiseModel {
                name: "process noise"
            }
        );
    }

    #[test]
    fn reinitialize_replaces_estimate() {
        let mut kf = filter();
        kf.update(&Point2::new(0.0, 0.0)).unwrap();

        let estimate = PositionEstimate::isotropic(Point2::new(1.0, 2.0), 4.0);
        kf.reinitialize(estimate).unwrap();
        assert_eq!(*kf.state(), estimate);
    }
}
