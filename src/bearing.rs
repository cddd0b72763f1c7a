use nalgebra::{Point2, Vector2};
use std::f64::consts::{PI, TAU};
use uom::si::{angle::radian, f64::Angle};

/// Wraps `angle` in radians onto the interval (-PI, PI].
///
/// Angles already on the interval are returned unchanged.
pub fn wrap_angle(angle: f64) -> f64 {
    if is_valid(angle) {
        return angle;
    }

    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    match wrapped <= -PI {
        // -PI and PI name the same direction.
        true => wrapped + TAU,
        false => wrapped,
    }
}

/// Returns `true` if `angle` is on the interval (-PI, PI], `false` otherwise.
fn is_valid(angle: f64) -> bool {
    -PI < angle && angle <= PI
}

/// Describes the direction from a sensor array towards a source.
///
/// The angle is measured counter-clockwise from the positive x axis and
/// always lies on the interval (-PI, PI].
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Bearing {
    angle: Angle,
}

impl Bearing {
    /// Creates a new `Bearing` from `angle`.
    ///
    /// Returns `None` if `angle` is not on the interval (-PI, PI].
    pub fn from_angle(angle: Angle) -> Option<Self> {
        if !is_valid(angle.get::<radian>()) {
            return None;
        }

        Some(Self { angle })
    }

    /// Creates a new `Bearing` from `angle` wrapped onto (-PI, PI].
    pub fn from_angle_wrapped(angle: Angle) -> Self {
        Self::from_radians(angle.get::<radian>())
    }

    /// Creates a new `Bearing` from `radians` wrapped onto (-PI, PI].
    pub fn from_radians(radians: f64) -> Self {
        Self {
            angle: Angle::new::<radian>(wrap_angle(radians)),
        }
    }

    /// The bearing of `to` as seen from `from`.
    pub fn between(from: &Point2<f64>, to: &Point2<f64>) -> Self {
        let offset = to - from;
        Self::from_radians(offset.y.atan2(offset.x))
    }

    pub fn radians(&self) -> f64 {
        self.angle.get::<radian>()
    }

    /// Unit vector pointing along the bearing.
    pub fn direction(&self) -> Vector2<f64> {
        let (sin, cos) = self.radians().sin_cos();
        Vector2::new(cos, sin)
    }

    /// Unit vector perpendicular to the bearing, rotated counter-clockwise.
    pub fn normal(&self) -> Vector2<f64> {
        let (sin, cos) = self.radians().sin_cos();
        Vector2::new(-sin, cos)
    }

    pub fn is_finite(&self) -> bool {
        self.radians().is_finite()
    }

    pub fn into_inner(self) -> Angle {
        self.angle
    }
}

impl From<Bearing> for Angle {
    fn from(bearing: Bearing) -> Self {
        bearing.angle
    }
}

impl std::ops::Sub for Bearing {
    type Output = Self;

    /// The signed circular difference between two bearings.
    fn sub(self, other: Self) -> Self::Output {
        Self::from_radians(self.radians() - other.radians())
    }
}
