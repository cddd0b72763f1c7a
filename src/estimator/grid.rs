use crate::{bearing::Bearing, error::Error};
use std::f64::consts::{PI, TAU};

/// The candidate angles scanned by a spectral estimator.
#[derive(Clone, Debug, PartialEq)]
pub struct AngleGrid {
    angles: Vec<f64>,
    circular: bool,
}

impl AngleGrid {
    /// `count` evenly spaced angles over [-PI, PI).
    ///
    /// The first and last samples are neighbours, so peak search wraps around.
    pub fn full_circle(count: usize) -> Result<Self, Error> {
        if count < 3 {
            return Err(Error::InvalidGrid {
                start: -PI,
                stop: PI,
                count,
            });
        }

        let step = TAU / count as f64;
        Ok(Self {
            angles: (0..count).map(|i| -PI + step * i as f64).collect(),
            circular: true,
        })
    }

    /// `count` evenly spaced angles over [`start`, `stop`], both inclusive.
    pub fn linspace(start: f64, stop: f64, count: usize) -> Result<Self, Error> {
        if count < 3 || !start.is_finite() || !stop.is_finite() || start >= stop {
            return Err(Error::InvalidGrid { start, stop, count });
        }

        let step = (stop - start) / (count - 1) as f64;
        Ok(Self {
            angles: (0..count).map(|i| start + step * i as f64).collect(),
            circular: false,
        })
    }

    /// Angles in radians. They may lie outside (-PI, PI] for a `linspace` grid.
    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    pub fn bearing(&self, index: usize) -> Option<Bearing> {
        self.angles.get(index).copied().map(Bearing::from_radians)
    }

    pub fn len(&self) -> usize {
        self.angles.len()
    }

    /// Always `false`, construction requires at least three angles.
    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }

    pub fn is_circular(&self) -> bool {
        self.circular
    }

    /// The spacing between neighbouring angles.
    pub fn resolution(&self) -> f64 {
        self.angles[1] - self.angles[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn full_circle_excludes_duplicate_endpoint() {
        let grid = AngleGrid::full_circle(360).unwrap();
        assert_eq!(grid.len(), 360);
        assert!(grid.is_circular());
        assert_relative_eq!(grid.angles()[0], -PI);
        assert_relative_eq!(grid.resolution(), TAU / 360.0, epsilon = 1e-12);
        assert!(*grid.angles().last().unwrap() < PI);
    }

    #[test]
    fn linspace_includes_endpoints() {
        let grid = AngleGrid::linspace(-PI, PI, 360).unwrap();
        assert!(!grid.is_circular());
        assert_relative_eq!(grid.angles()[0], -PI);
        assert_relative_eq!(*grid.angles().last().unwrap(), PI, epsilon = 1e-12);
    }

    #[rstest]
    #[case(0.0, 1.0, 2)]
    #[case(1.0, 0.0, 10)]
    #[case(f64::NAN, 1.0, 10)]
    fn invalid_linspace(#[case] start: f64, #[case] stop: f64, #[case] count: usize) {
        assert!(matches!(
            AngleGrid::linspace(start, stop, count),
            Err(Error::InvalidGrid { .. })
        ));
    }

    #[test]
    fn bearings_are_wrapped() {
        let grid = AngleGrid::linspace(0.0, TAU, 5).unwrap();
        assert_relative_eq!(grid.bearing(3).unwrap().radians(), -PI / 2.0, epsilon = 1e-12);
        assert_eq!(grid.bearing(5), None);
    }
}
