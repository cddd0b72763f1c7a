use crate::{bearing::Bearing, error::Error};
use nalgebra::{Matrix2, Point2, Vector2};

/// Determinants smaller than this treat two rays as parallel.
const PARALLEL_TOLERANCE: f64 = 1e-10;

/// A line through `origin` along `bearing`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BearingLine {
    pub origin: Point2<f64>,
    pub bearing: Bearing,
}

impl BearingLine {
    pub fn new(origin: Point2<f64>, bearing: Bearing) -> Self {
        Self { origin, bearing }
    }

    /// Perpendicular distance from `point` to the line.
    pub fn distance(&self, point: &Point2<f64>) -> f64 {
        self.bearing.normal().dot(&(point - self.origin)).abs()
    }
}

/// Intersects the lines `c0 + t * d0` and `c1 + s * d1`, where `d0` and `d1`
/// are the directions of `b0` and `b1`.
///
/// Returns `None` if the lines are parallel. The intersection may lie behind
/// either origin.
pub fn line_intersection(
    c0: Point2<f64>,
    b0: Bearing,
    c1: Point2<f64>,
    b1: Bearing,
) -> Option<Point2<f64>> {
    let (d0, d1) = (b0.direction(), b1.direction());
    let a = Matrix2::new(d0.x, -d1.x, d0.y, -d1.y);

    let det = a.determinant();
    if det.abs() < PARALLEL_TOLERANCE {
        return None;
    }

    let offset = c1 - c0;
    // First component of A^-1 * offset by Cramer's rule.
    let t = (offset.x * -d1.y + d1.x * offset.y) / det;
    Some(c0 + d0 * t)
}

/// Finds the point minimizing the summed squared distance to every line.
///
/// Solves `(A^T A) X = A^T b` with a pseudo-inverse, where row `i` of `A` is
/// the normal of line `i` and `b_i = n_i . c_i`. When every line is parallel
/// the minimum-norm solution is returned.
pub fn multilaterate(lines: &[BearingLine]) -> Result<Point2<f64>, Error> {
    if lines.len() < 2 {
        return Err(Error::InsufficientBearings { count: lines.len() });
    }

    let (ata, atb) = lines.iter().fold(
        (Matrix2::zeros(), Vector2::zeros()),
        |(ata, atb), line| {
            let normal = line.bearing.normal();
            let b = normal.dot(&line.origin.coords);
            (ata + normal * normal.transpose(), atb + normal * b)
        },
    );

    let pinv = ata
        .pseudo_inverse(f64::EPSILON * ata.norm().max(1.0))
        .map_err(|reason| Error::PseudoInverse { reason })?;

    Ok(Point2::from(pinv * atb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_relative_eq, relative_eq};
    use quickcheck::{TestResult, quickcheck};
    use rstest::rstest;
    use std::f64::consts::PI;

    fn line_towards(origin: Point2<f64>, target: Point2<f64>) -> BearingLine {
        BearingLine::new(origin, Bearing::between(&origin, &target))
    }

    quickcheck! {
        fn intersection_round_trip(x: i8, y: i8) -> TestResult {
            let target = Point2::new(x as f64 / 4.0, y as f64 / 4.0);
            let c0 = Point2::new(0.0, 0.0);
            let c1 = Point2::new(-10.0, -6.0);
            let (b0, b1) = (Bearing::between(&c0, &target), Bearing::between(&c1, &target));

            // Collinear with both centers: the bearings do not fix the point.
            if (b0 - b1).radians().sin().abs() < 1e-6 {
                return TestResult::discard();
            }

            match line_intersection(c0, b0, c1, b1) {
                Some(point) => TestResult::from_bool(relative_eq!(point, target, epsilon = 1e-6)),
                None => TestResult::failed(),
            }
        }
    }

    #[rstest]
    #[case(0.3, 0.3)]
    #[case(0.3, 0.3 - PI)]
    #[case(PI, 0.0)]
    fn parallel_rays_do_not_intersect(#[case] b0: f64, #[case] b1: f64) {
        let intersection = line_intersection(
            Point2::new(0.0, 0.0),
            Bearing::from_radians(b0),
            Point2::new(1.0, -2.0),
            Bearing::from_radians(b1),
        );
        assert_eq!(intersection, None);
    }

    #[test]
    fn intersection_may_lie_behind_origin() {
        let point = line_intersection(
            Point2::new(0.0, 0.0),
            Bearing::from_radians(0.0),
            Point2::new(-5.0, 1.0),
            Bearing::from_radians(PI / 2.0),
        );
        assert_relative_eq!(point.unwrap(), Point2::new(-5.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn consistent_bearings_are_exact() {
        let target = Point2::new(3.0, 4.0);
        let lines = [
            line_towards(Point2::new(0.0, 0.0), target),
            line_towards(Point2::new(-10.0, -6.0), target),
            line_towards(Point2::new(8.0, 10.0), target),
        ];

        assert_relative_eq!(multilaterate(&lines).unwrap(), target, epsilon = 1e-9);
    }

    #[test]
    fn inconsistent_bearings_minimize_squared_distance() {
        let target = Point2::new(3.0, 4.0);
        let mut lines = [
            line_towards(Point2::new(0.0, 0.0), target),
            line_towards(Point2::new(-10.0, -6.0), target),
            line_towards(Point2::new(8.0, 10.0), target),
        ];
        lines[1].bearing = Bearing::from_radians(lines[1].bearing.radians() + 0.05);

        let estimate = multilaterate(&lines).unwrap();
        let cost = |point: Point2<f64>| {
            lines
                .iter()
                .map(|line| line.distance(&point).powi(2))
                .sum::<f64>()
        };

        // Any small step away from the solution increases the cost.
        let best = cost(estimate);
        for step in [
            Vector2::new(1e-3, 0.0),
            Vector2::new(-1e-3, 0.0),
            Vector2::new(0.0, 1e-3),
            Vector2::new(0.0, -1e-3),
        ] {
            assert!(cost(estimate + step) > best);
        }

        // Normal equations of the three lines, solved by Cramer's rule.
        let (mut sxx, mut sxy, mut syy, mut bx, mut by) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for line in &lines {
            let n = line.bearing.normal();
            let b = n.dot(&line.origin.coords);
            sxx += n.x * n.x;
            sxy += n.x * n.y;
            syy += n.y * n.y;
            bx += n.x * b;
            by += n.y * b;
        }
        let det = sxx * syy - sxy * sxy;
        let expected = Point2::new((syy * bx - sxy * by) / det, (sxx * by - sxy * bx) / det);

        assert_relative_eq!(estimate, expected, epsilon = 1e-9);
    }

    #[test]
    fn parallel_bearings_give_minimum_norm_point() {
        // Both lines are y = 2, so every point on it is a solution.
        let lines = [
            BearingLine::new(Point2::new(-4.0, 2.0), Bearing::from_radians(0.0)),
            BearingLine::new(Point2::new(7.0, 2.0), Bearing::from_radians(PI)),
        ];

        assert_relative_eq!(
            multilaterate(&lines).unwrap(),
            Point2::new(0.0, 2.0),
            epsilon = 1e-9
        );
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    fn too_few_bearings(#[case] count: usize) {
        let lines = vec![BearingLine::new(Point2::origin(), Bearing::from_radians(0.0)); count];
        assert_eq!(
            multilaterate(&lines),
            Err(Error::InsufficientBearings { count })
        );
    }
}
