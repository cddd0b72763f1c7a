use super::{
    PositionEstimate, PositionFilter, invert_innovation, symmetrize, validate_covariance,
    validate_posterior,
};
use crate::{bearing::Bearing, error::Error};
use nalgebra::{Matrix2, Point2, Vector2};

/// Squared ranges below this are clamped when linearizing.
const MIN_RANGE_SQUARED: f64 = 1e-12;

/// Observes a position as the pair of bearings seen from two sensors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BearingPairModel {
    pub sensors: [Point2<f64>; 2],
}

impl BearingPairModel {
    pub fn new(first: Point2<f64>, second: Point2<f64>) -> Self {
        Self {
            sensors: [first, second],
        }
    }

    /// The bearings of `position` from both sensors.
    pub fn observe(&self, position: &Point2<f64>) -> [Bearing; 2] {
        self.sensors.map(|sensor| Bearing::between(&sensor, position))
    }

    /// The Jacobian of [`observe`](Self::observe) at `position`.
    ///
    /// Row `i` is `(-dy, dx) / r^2` for the offset from sensor `i`.
    pub fn jacobian(&self, position: &Point2<f64>) -> Matrix2<f64> {
        let row = |sensor: &Point2<f64>| {
            let offset = position - sensor;
            let r2 = offset.norm_squared().max(MIN_RANGE_SQUARED);
            (-offset.y / r2, offset.x / r2)
        };

        let (a, b) = row(&self.sensors[0]);
        let (c, d) = row(&self.sensors[1]);
        Matrix2::new(a, b, c, d)
    }
}

/// An extended Kalman filter for a stationary source observed by a pair of
/// bearings.
#[derive(Clone, Debug)]
pub struct ExtendedKalmanFilter {
    state: PositionEstimate,
    process_noise: Matrix2<f64>,
    measurement_noise: Matrix2<f64>,
    model: BearingPairModel,
}

impl ExtendedKalmanFilter {
    /// Creates a new `ExtendedKalmanFilter`.
    ///
    /// `measurement_noise` is expressed in squared radians.
    pub fn new(
        initial: PositionEstimate,
        process_noise: Matrix2<f64>,
        measurement_noise: Matrix2<f64>,
        model: BearingPairModel,
    ) -> Result<Self, Error> {
        validate_covariance(&initial.covariance, "initial covariance")?;
        validate_covariance(&process_noise, "process noise")?;
        validate_covariance(&measurement_noise, "measurement noise")?;

        Ok(Self {
            state: initial,
            process_noise,
            measurement_noise,
            model,
        })
    }

    pub fn model(&self) -> &BearingPairModel {
        &self.model
    }

    /// Replaces the current estimate.
    pub fn reinitialize(&mut self, estimate: PositionEstimate) -> Result<(), Error> {
        validate_covariance(&estimate.covariance, "initial covariance")?;
        self.state = estimate;
        Ok(())
    }
}

impl PositionFilter for ExtendedKalmanFilter {
    type Measurement = [Bearing; 2];

    /// The source is stationary, only the uncertainty grows.
    fn predict(&mut self) {
        self.state.covariance += self.process_noise;
    }

    fn update(&mut self, measurement: &[Bearing; 2]) -> Result<&PositionEstimate, Error> {
        if !measurement.iter().all(Bearing::is_finite) {
            return Err(Error::NonFiniteMeasurement);
        }

        let position = self.state.position();
        let predicted = self.model.observe(&position);
        let innovation = Vector2::new(
            (measurement[0] - predicted[0]).radians(),
            (measurement[1] - predicted[1]).radians(),
        );

        let h = self.model.jacobian(&position);
        let p = self.state.covariance;
        let s_inv = invert_innovation(h * p * h.transpose() + self.measurement_noise)?;
        let gain = p * h.transpose() * s_inv;

        let next = PositionEstimate {
            mean: self.state.mean + gain * innovation,
            covariance: symmetrize((Matrix2::identity() - gain * h) * p),
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
    use rstest::rstest;

    fn model() -> BearingPairModel {
        BearingPairModel::new(Point2::new(0.0, 0.0), Point2::new(-10.0, -6.0))
    }

    #[rstest]
    #[case(Point2::new(3.0, 4.0))]
    #[case(Point2::new(-12.0, 7.5))]
    #[case(Point2::new(0.5, -9.0))]
    fn jacobian_matches_finite_differences(#[case] position: Point2<f64>) {
        let model = model();
        let step = 1e-6;
        let jacobian = model.jacobian(&position);

        for (col, delta) in [Vector2::new(step, 0.0), Vector2::new(0.0, step)]
            .into_iter()
            .enumerate()
        {
            let ahead = model.observe(&(position + delta));
            let behind = model.observe(&(position - delta));
            for row in 0..2 {
                let derivative = (ahead[row] - behind[row]).radians() / (2.0 * step);
                assert_relative_eq!(jacobian[(row, col)], derivative, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn converges_with_exact_bearings() {
        let truth = Point2::new(3.0, 4.0);
        let model = model();
        let mut ekf = ExtendedKalmanFilter::new(
            PositionEstimate::isotropic(Point2::new(2.0, 5.0), 100.0),
            Matrix2::identity() * 1e-2,
            Matrix2::identity() * 1e-6,
            model,
        )
        .unwrap();

        // Only the update is checked to shrink the trace. With this much
        // process noise a whole predict/update cycle can still grow it on the
        // first step, and a smaller one no longer reaches the truth in ten.
        let measurement = model.observe(&truth);
        let initial_trace = ekf.state().trace();
        for _ in 0..10 {
            ekf.predict();
            let prior = ekf.state().trace();
            let posterior = ekf.update(&measurement).unwrap().trace();
            assert!(posterior < prior);
        }

        assert_relative_eq!(ekf.state().position(), truth, epsilon = 1e-3);
        assert!(ekf.state().trace() < initial_trace * 1e-3);
    }

    #[test]
    fn innovation_wraps_across_branch_cut() {
        // Sensor at the origin sees the source just below the negative x axis.
        let model = BearingPairModel::new(Point2::new(0.0, 0.0), Point2::new(-5.0, -5.0));
        let start = Point2::new(-5.0, 0.1);
        let mut ekf = ExtendedKalmanFilter::new(
            PositionEstimate::isotropic(start, 1.0),
            Matrix2::zeros(),
            Matrix2::identity() * 1e-4,
            model,
        )
        .unwrap();

        let measurement = model.observe(&Point2::new(-5.0, -0.1));
        let state = ekf.update(&measurement).unwrap();

        // Without wrapping the first innovation would be close to 2 * PI.
        assert!((state.position() - start).norm() < 1.0);
        assert!(state.mean.y < start.y);
    }

    #[test]
    fn estimate_at_sensor_stays_finite() {
        let model = model();
        let mut ekf = ExtendedKalmanFilter::new(
            PositionEstimate::isotropic(Point2::new(0.0, 0.0), 100.0),
            Matrix2::identity() * 1e-4,
            Matrix2::identity() * 1e-2,
            model,
        )
        .unwrap();

        ekf.predict();
        let state = ekf.update(&model.observe(&Point2::new(3.0, 4.0))).unwrap();
        assert!(state.is_finite());
    }

    #[test]
    fn state_on_sensor_baseline_is_rejected() {
        // Both sensors see (5, 3) along the same line, so the two rows of the
        // Jacobian are almost parallel.
        let start = Point2::new(5.0, 3.0 + 1e-9);
        let mut ekf = ExtendedKalmanFilter::new(
            PositionEstimate::isotropic(start, 1.0),
            Matrix2::zeros(),
            Matrix2::zeros(),
            model(),
        )
        .unwrap();
        let before = *ekf.state();

        let measurement = model().observe(&Point2::new(3.0, 4.0));
        assert_eq!(
            ekf.update(&measurement).unwrap_err(),
            Error::SingularInnovation
        );
        assert_eq!(*ekf.state(), before);
    }

    #[test]
    fn non_finite_bearing_is_rejected() {
        let mut ekf = ExtendedKalmanFilter::new(
            PositionEstimate::isotropic(Point2::new(1.0, 1.0), 1.0),
            Matrix2::zeros(),
            Matrix2::identity(),
            model(),
        )
        .unwrap();
        let before = *ekf.state();

        let measurement = [Bearing::from_radians(f64::NAN), Bearing::from_radians(0.0)];
        assert_eq!(
            ekf.update(&measurement).unwrap_err(),
            Error::NonFiniteMeasurement
        );
        assert_eq!(*ekf.state(), before);
    }
}
