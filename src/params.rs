use crate::estimator::PeakCriteria;
use nalgebra::Point2;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration of a recursive position filter.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FilterParams {
    /// Number of predict/update cycles.
    pub epochs: usize,
    pub initial_mean: Point2<f64>,
    pub initial_variance: f64,
    /// Diagonal of the process noise covariance.
    pub q_scale: f64,
    /// Diagonal of the measurement noise covariance.
    pub r_scale: f64,
}

/// Configuration of the multi-source intersection pipeline.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IntersectParams {
    pub sources: usize,
    pub snr: f64,
    pub snapshots: usize,
}

/// Everything needed to build a [`Scenario`](crate::scenario::Scenario).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ScenarioParams {
    pub seed: u64,

    /// Elements per circular array.
    pub elements: usize,

    /// Radius of every array in wavelengths.
    pub array_radius: f64,

    /// One circular array is placed at each center.
    pub array_centers: Vec<Point2<f64>>,

    /// Linear signal to noise ratio of the single-source pipelines.
    pub snr: f64,
    pub snapshots: usize,

    /// Number of angles scanned over the full circle.
    pub grid_size: usize,
    pub peak_criteria: PeakCriteria,

    /// Linear filter fed with multilaterated positions.
    pub kalman: FilterParams,

    /// Extended filter fed with bearings from the first two arrays.
    pub extended: FilterParams,

    pub intersect: IntersectParams,

    /// Vertices of the room sources are drawn from.
    pub room: Vec<Point2<f64>>,
}

impl ScenarioParams {
    /// Vertices of an L-shaped room spanning [-15, 15] on both axes with the
    /// `x > 10, y > 0` corner removed.
    pub fn l_shaped_room() -> Vec<Point2<f64>> {
        vec![
            Point2::new(-15.0, -15.0),
            Point2::new(15.0, -15.0),
            Point2::new(15.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 15.0),
            Point2::new(-15.0, 15.0),
        ]
    }
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            seed: 42,
            elements: 16,
            array_radius: 1.0,
            array_centers: vec![
                Point2::new(0.0, 0.0),
                Point2::new(-10.0, -6.0),
                Point2::new(8.0, 10.0),
            ],
            snr: 5.0,
            snapshots: 200,
            grid_size: 360,
            peak_criteria: PeakCriteria::default(),
            kalman: FilterParams {
                epochs: 20,
                initial_mean: Point2::new(5.0, -10.0),
                initial_variance: 100.0,
                q_scale: 1e-4,
                r_scale: 0.1,
            },
            extended: FilterParams {
                epochs: 30,
                initial_mean: Point2::new(-5.0, 10.0),
                initial_variance: 100.0,
                q_scale: 1e-4,
                r_scale: 1e-2,
            },
            intersect: IntersectParams {
                sources: 3,
                snr: 10.0,
                snapshots: 100,
            },
            room: Self::l_shaped_room(),
        }
    }
}
