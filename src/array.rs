use crate::{bearing::Bearing, error::Error};
use nalgebra::{DVector, Point2, Vector2};
use num_complex::Complex64;
use std::f64::consts::{PI, TAU};

/// The positions of the elements of a planar sensor array.
///
/// Positions are expressed in wavelengths so that the phase observed by an
/// element is `2 * PI * <position, direction>`.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayGeometry {
    elements: Vec<Point2<f64>>,
}

impl ArrayGeometry {
    /// Creates a new `ArrayGeometry` from element positions.
    ///
    /// Returns an error if `elements` is empty.
    pub fn try_new(elements: Vec<Point2<f64>>) -> Result<Self, Error> {
        if elements.is_empty() {
            return Err(Error::EmptyArray);
        }

        Ok(Self { elements })
    }

    /// Creates a uniform circular array of `count` elements around `center`.
    ///
    /// Element `i` sits at angle `2 * PI * i / count` on the circle.
    pub fn circular(center: Point2<f64>, count: usize, radius: f64) -> Result<Self, Error> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(Error::InvalidRadius { radius });
        }

        let elements = (0..count)
            .map(|i| {
                let (sin, cos) = (TAU * i as f64 / count as f64).sin_cos();
                center + Vector2::new(cos, sin) * radius
            })
            .collect();

        Self::try_new(elements)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Always `false`, construction rejects empty arrays.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[Point2<f64>] {
        &self.elements
    }

    /// The mean position of the elements.
    pub fn centroid(&self) -> Point2<f64> {
        let sum = self
            .elements
            .iter()
            .fold(Vector2::zeros(), |acc, element| acc + element.coords);
        Point2::from(sum / self.len() as f64)
    }

    /// Computes the unit-norm response of the array to a plane wave arriving
    /// from `bearing`.
    pub fn response_vector(&self, bearing: Bearing) -> DVector<Complex64> {
        let direction = bearing.direction();
        let scale = 1.0 / (self.len() as f64).sqrt();

        DVector::from_iterator(
            self.len(),
            self.elements.iter().map(|element| {
                let phase = 2.0 * PI * element.coords.dot(&direction);
                Complex64::from_polar(scale, phase)
            }),
        )
    }
}
