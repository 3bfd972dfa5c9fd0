//! Support points on the Minkowski difference of two convex shapes.

use crate::geometry::Shape;
use crate::math::{Isometry, Point, Real, Vector};

/// A support point of the configuration-space difference of two shapes.
///
/// Carries the world-space witness points on both shapes so that simplex
/// points can be back-projected to closest points on the original shapes.
#[derive(Copy, Clone, Debug)]
pub struct SupportPoint {
    /// The support point on the first shape, in world space.
    pub point1: Point<Real>,
    /// The support point on the second shape, in world space.
    pub point2: Point<Real>,
    /// `point1 - point2`: the support point on the Minkowski difference.
    pub point: Vector<Real>,
}

/// Computes the support point of `shape1 - shape2` in the direction `dir`.
///
/// `point1` maximizes `<p, dir>` over the first shape, `point2` maximizes
/// `<p, -dir>` over the second.
#[inline]
pub fn support(
    shape1: &Shape,
    pos1: &Isometry<Real>,
    shape2: &Shape,
    pos2: &Isometry<Real>,
    dir: &Vector<Real>,
) -> SupportPoint {
    let point1 = shape1.support_point(pos1, dir);
    let point2 = shape2.support_point(pos2, &-dir);
    SupportPoint {
        point1,
        point2,
        point: point1 - point2,
    }
}

/// The usual starting direction for the iterative algorithms: from the
/// center of the first shape towards the center of the second.
#[inline]
pub fn initial_direction(
    shape1: &Shape,
    pos1: &Isometry<Real>,
    shape2: &Shape,
    pos2: &Isometry<Real>,
) -> Vector<Real> {
    let c1 = pos1 * shape1.local_center();
    let c2 = pos2 * shape2.local_center();
    let dir = c2 - c1;
    if dir.norm_squared() > 1.0e-12 {
        dir
    } else {
        Vector::new(1.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Circle;

    #[test]
    fn support_of_two_circles() {
        let c1 = Shape::Circle(Circle::new(1.0));
        let c2 = Shape::Circle(Circle::new(0.5));
        let p1 = Isometry::translation(0.0, 0.0);
        let p2 = Isometry::translation(3.0, 0.0);

        let s = support(&c1, &p1, &c2, &p2, &Vector::new(1.0, 0.0));
        assert_eq!(s.point1, Point::new(1.0, 0.0));
        assert_eq!(s.point2, Point::new(2.5, 0.0));
        assert_eq!(s.point, Vector::new(-1.5, 0.0));
    }
}
