//! The Gilbert-Johnson-Keerthi algorithm on the Minkowski difference of two
//! convex shapes: intersection tests, distance queries, raycasts, and
//! containment tests.

use crate::geometry::minkowski::{self, SupportPoint};
use crate::geometry::simplex::{closest_to_origin, Simplex};
use crate::geometry::Shape;
use crate::math::{Isometry, Point, Real, Vector};

/// The default maximum number of iterations of the GJK loops.
pub const DEFAULT_GJK_MAX_ITERATIONS: usize = 30;

/// The default convergence threshold of the GJK distance loop.
pub const DEFAULT_GJK_DISTANCE_EPSILON: Real = 1.0e-5;

/// The result of a successful distance query between two disjoint shapes.
#[derive(Copy, Clone, Debug)]
pub struct Separation {
    /// The unit separating direction, pointing from the first shape towards
    /// the second.
    pub normal: Vector<Real>,
    /// The distance between the two closest points.
    pub distance: Real,
    /// The closest point on the first shape, in world space.
    pub point1: Point<Real>,
    /// The closest point on the second shape, in world space.
    pub point2: Point<Real>,
}

/// A ray with a unit direction.
#[derive(Copy, Clone, Debug)]
pub struct Ray {
    /// The starting point of the ray.
    pub origin: Point<Real>,
    /// The unit direction of the ray.
    pub dir: Vector<Real>,
}

impl Ray {
    /// Creates a ray. The direction must be non-zero; it is normalized.
    pub fn new(origin: Point<Real>, dir: Vector<Real>) -> Self {
        let dir = dir
            .try_normalize(1.0e-12)
            .expect("The ray direction must be non-zero.");
        Self { origin, dir }
    }

    /// The point at parameter `t` along this ray.
    pub fn point_at(&self, t: Real) -> Point<Real> {
        self.origin + self.dir * t
    }
}

/// The result of a successful raycast.
#[derive(Copy, Clone, Debug)]
pub struct RaycastHit {
    /// The distance from the ray origin to the hit point.
    pub distance: Real,
    /// The hit point on the shape's boundary, in world space.
    pub point: Point<Real>,
    /// The outward unit normal of the shape at the hit point.
    pub normal: Vector<Real>,
}

/// The GJK narrow-phase algorithm.
#[derive(Copy, Clone, Debug)]
pub struct Gjk {
    max_iterations: usize,
    distance_epsilon: Real,
}

impl Default for Gjk {
    fn default() -> Self {
        Self::new(DEFAULT_GJK_MAX_ITERATIONS, DEFAULT_GJK_DISTANCE_EPSILON)
    }
}

impl Gjk {
    /// Creates a GJK solver with the given iteration cap and convergence
    /// threshold. Both must be positive.
    pub fn new(max_iterations: usize, distance_epsilon: Real) -> Self {
        assert!(
            max_iterations > 0,
            "The GJK maximum number of iterations must be positive."
        );
        assert!(
            distance_epsilon > 0.0,
            "The GJK distance epsilon must be positive."
        );
        Self {
            max_iterations,
            distance_epsilon,
        }
    }

    /// The convergence threshold of the distance loop.
    pub fn distance_epsilon(&self) -> Real {
        self.distance_epsilon
    }

    /// Tests whether two shapes intersect.
    ///
    /// On intersection, returns the terminal simplex enclosing the origin of
    /// the Minkowski difference, which seeds the EPA penetration solver.
    /// Running out of iterations conservatively reports an intersection with
    /// the last simplex.
    pub fn intersect(
        &self,
        shape1: &Shape,
        pos1: &Isometry<Real>,
        shape2: &Shape,
        pos2: &Isometry<Real>,
    ) -> Option<Simplex> {
        let support = |d: &Vector<Real>| minkowski::support(shape1, pos1, shape2, pos2, d);

        let dir0 = minkowski::initial_direction(shape1, pos1, shape2, pos2);
        let mut simplex = Simplex::new();
        simplex.push(support(&dir0));
        let mut dir = -simplex[0].point;

        for _ in 0..self.max_iterations {
            if dir.norm_squared() < 1.0e-12 {
                // The origin lies on the current feature: touching counts as
                // intersecting.
                return Some(simplex);
            }

            let w = support(&dir);
            if w.point.dot(&dir) < 0.0 {
                return None;
            }
            simplex.push(w);

            if do_simplex(&mut simplex, &mut dir) {
                return Some(simplex);
            }
        }

        log::debug!("GJK intersection test ran out of iterations; reporting intersection.");
        Some(simplex)
    }

    /// Computes the separation between two disjoint shapes.
    ///
    /// Returns `None` when the shapes intersect or touch (including the
    /// degenerate duplicate-support case, reported as distance zero).
    pub fn distance(
        &self,
        shape1: &Shape,
        pos1: &Isometry<Real>,
        shape2: &Shape,
        pos2: &Isometry<Real>,
    ) -> Option<Separation> {
        let dir0 = minkowski::initial_direction(shape1, pos1, shape2, pos2);
        self.closest_points(
            |d: &Vector<Real>| minkowski::support(shape1, pos1, shape2, pos2, d),
            dir0,
        )
    }

    fn closest_points(
        &self,
        support: impl Fn(&Vector<Real>) -> SupportPoint,
        dir0: Vector<Real>,
    ) -> Option<Separation> {
        let mut a = support(&dir0);
        let mut b = support(&-dir0);

        for _ in 0..self.max_iterations {
            let (p, _) = closest_to_origin(&a.point, &b.point);
            let dist = p.norm();
            if dist <= self.distance_epsilon {
                // Inside (or on) the difference: no separation.
                return None;
            }

            let d = -p / dist;
            let c = support(&d);

            // `-<c, d>` is a lower bound of the distance; `dist` is an upper
            // bound. Stop when successive supports no longer close the gap.
            if dist + c.point.dot(&d) < self.distance_epsilon {
                return separation_from(&a, &b);
            }

            if a.point.norm_squared() < b.point.norm_squared() {
                b = c;
            } else {
                a = c;
            }
        }

        log::debug!("GJK distance query ran out of iterations; returning best estimate.");
        separation_from(&a, &b)
    }

    /// Casts a ray on a shape.
    ///
    /// Returns `None` when the ray origin is inside the shape, when the ray
    /// points away from it, or when the hit lies beyond `max_len`
    /// (`max_len <= 0` means unbounded).
    pub fn raycast(
        &self,
        ray: &Ray,
        max_len: Real,
        shape: &Shape,
        pos: &Isometry<Real>,
    ) -> Option<RaycastHit> {
        if shape.contains_point(pos, &ray.origin) {
            return None;
        }

        let mut t = 0.0;
        let mut x = ray.origin;
        // The outward direction seen just before touching, used when the
        // marching point lands exactly on the boundary.
        let mut last_normal = -ray.dir;

        for _ in 0..self.max_iterations {
            let sep = match self.point_separation(&x, shape, pos) {
                Some(sep) => sep,
                // Within tolerance of the boundary.
                None => {
                    return Some(RaycastHit {
                        distance: t,
                        point: x,
                        normal: last_normal,
                    });
                }
            };

            if sep.distance <= self.distance_epsilon {
                return Some(RaycastHit {
                    distance: t,
                    point: sep.point1,
                    normal: sep.normal,
                });
            }

            // Rate at which the ray closes the remaining gap.
            let closing = -ray.dir.dot(&sep.normal);
            if closing <= 1.0e-9 {
                return None;
            }

            t += sep.distance / closing;
            if max_len > 0.0 && t > max_len {
                return None;
            }
            x = ray.point_at(t);
            last_normal = sep.normal;
        }

        log::debug!("GJK raycast ran out of iterations; reporting a miss.");
        None
    }

    // The separation between a shape (first) and a point (second).
    fn point_separation(
        &self,
        pt: &Point<Real>,
        shape: &Shape,
        pos: &Isometry<Real>,
    ) -> Option<Separation> {
        let center = pos * shape.local_center();
        let dir0 = pt - center;
        let dir0 = if dir0.norm_squared() > 1.0e-12 {
            dir0
        } else {
            Vector::new(1.0, 0.0)
        };

        // The point plays the role of the second shape of the difference, so
        // the resulting normal points from the shape towards the point, i.e.
        // outward at the surface.
        self.closest_points(
            |d: &Vector<Real>| {
                let point1 = shape.support_point(pos, d);
                SupportPoint {
                    point1,
                    point2: *pt,
                    point: point1 - pt,
                }
            },
            dir0,
        )
    }

    /// Tests whether `inner` lies strictly inside `container`.
    ///
    /// Shapes that merely touch the container's boundary, and equal shapes,
    /// are not contained. Thin containers (segments, links) can contain
    /// nothing.
    pub fn contains(
        &self,
        container: &Shape,
        container_pos: &Isometry<Real>,
        inner: &Shape,
        inner_pos: &Isometry<Real>,
    ) -> bool {
        let eps = self.distance_epsilon;

        match inner {
            Shape::Polygon(p) => p
                .vertices()
                .iter()
                .all(|v| container.boundary_margin(container_pos, &(inner_pos * v)) > eps),
            Shape::Segment(s) => {
                container.boundary_margin(container_pos, &(inner_pos * s.a)) > eps
                    && container.boundary_margin(container_pos, &(inner_pos * s.b)) > eps
            }
            Shape::Link(l) => {
                let s = &l.segment;
                container.boundary_margin(container_pos, &(inner_pos * s.a)) > eps
                    && container.boundary_margin(container_pos, &(inner_pos * s.b)) > eps
            }
            Shape::Circle(c) => {
                let center = inner_pos * Point::origin();
                container.boundary_margin(container_pos, &center) > c.radius + eps
            }
            Shape::Capsule(c) => {
                // A capsule is the convex hull of its two cap circles, and a
                // convex container holding both circles holds the hull.
                let c1 = inner_pos * Point::new(-c.half_length, 0.0);
                let c2 = inner_pos * Point::new(c.half_length, 0.0);
                container.boundary_margin(container_pos, &c1) > c.radius + eps
                    && container.boundary_margin(container_pos, &c2) > c.radius + eps
            }
            Shape::Ellipse(_) => {
                // No closed form against a general container: compare support
                // functions over a fan of directions.
                const SAMPLES: usize = 32;
                (0..SAMPLES).all(|i| {
                    let angle = std::f32::consts::PI * 2.0 * i as Real / SAMPLES as Real;
                    let d = Vector::new(angle.cos(), angle.sin());
                    let h_in = inner.support_point(inner_pos, &d).coords.dot(&d);
                    let h_out = container.support_point(container_pos, &d).coords.dot(&d);
                    h_in + eps < h_out
                })
            }
        }
    }
}

fn separation_from(a: &SupportPoint, b: &SupportPoint) -> Option<Separation> {
    let (p, t) = closest_to_origin(&a.point, &b.point);
    let dist = p.norm();
    if dist < 1.0e-9 {
        return None;
    }

    Some(Separation {
        normal: -p / dist,
        distance: dist,
        point1: a.point1 + (b.point1 - a.point1) * t,
        point2: a.point2 + (b.point2 - a.point2) * t,
    })
}

// One step of the simplex-reduction subroutine: updates the simplex to the
// feature closest to the origin and `dir` to the next search direction.
// Returns `true` when the simplex encloses the origin.
fn do_simplex(simplex: &mut Simplex, dir: &mut Vector<Real>) -> bool {
    match simplex.len() {
        2 => {
            let a = simplex[1].point; // latest support point
            let b = simplex[0].point;
            let ab = b - a;
            let ao = -a;

            let mut perp = Vector::new(-ab.y, ab.x);
            if perp.dot(&ao) < 0.0 {
                perp = -perp;
            }

            if perp.norm_squared() < 1.0e-20 {
                // Degenerate segment: both supports coincide.
                return closest_to_origin(&a, &b).0.norm_squared() < 1.0e-12;
            }

            *dir = perp;
            false
        }
        3 => {
            let a = simplex[2].point; // latest support point
            let b = simplex[1].point;
            let c = simplex[0].point;
            let ab = b - a;
            let ac = c - a;
            let ao = -a;

            let mut ab_perp = Vector::new(-ab.y, ab.x);
            if ab_perp.dot(&ac) > 0.0 {
                ab_perp = -ab_perp;
            }
            if ab_perp.dot(&ao) > 0.0 {
                // The origin lies beyond the AB edge: drop C.
                simplex.remove(0);
                *dir = ab_perp;
                return false;
            }

            let mut ac_perp = Vector::new(-ac.y, ac.x);
            if ac_perp.dot(&ab) > 0.0 {
                ac_perp = -ac_perp;
            }
            if ac_perp.dot(&ao) > 0.0 {
                // The origin lies beyond the AC edge: drop B.
                simplex.remove(1);
                *dir = ac_perp;
                return false;
            }

            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Circle, Polygon, Segment};
    use approx::assert_relative_eq;

    fn circle(r: Real) -> Shape {
        Shape::Circle(Circle::new(r))
    }

    #[test]
    fn overlapping_circles_intersect() {
        let gjk = Gjk::default();
        let p1 = Isometry::translation(0.0, 0.0);
        let p2 = Isometry::translation(0.5, 0.0);
        assert!(gjk.intersect(&circle(1.0), &p1, &circle(1.0), &p2).is_some());
    }

    #[test]
    fn disjoint_circles_do_not_intersect() {
        let gjk = Gjk::default();
        let p1 = Isometry::translation(0.0, 0.0);
        let p2 = Isometry::translation(3.0, 0.0);
        assert!(gjk.intersect(&circle(1.0), &p1, &circle(1.0), &p2).is_none());
    }

    #[test]
    fn circle_distance_matches_closed_form() {
        let gjk = Gjk::default();
        let p1 = Isometry::translation(0.0, 0.0);
        let p2 = Isometry::translation(3.0, 0.0);
        let sep = gjk
            .distance(&circle(1.0), &p1, &circle(0.5), &p2)
            .expect("the circles are disjoint");

        assert_relative_eq!(sep.distance, 1.5, epsilon = 1.0e-4);
        assert_relative_eq!(sep.normal.x, 1.0, epsilon = 1.0e-4);
        assert_relative_eq!(sep.point1.x, 1.0, epsilon = 1.0e-3);
        assert_relative_eq!(sep.point2.x, 2.5, epsilon = 1.0e-3);
    }

    #[test]
    fn polygon_distance_between_squares() {
        let gjk = Gjk::default();
        let s1 = Shape::Polygon(Polygon::rectangle(0.5, 0.5));
        let s2 = Shape::Polygon(Polygon::rectangle(0.5, 0.5));
        let p1 = Isometry::translation(0.0, 0.0);
        let p2 = Isometry::translation(2.0, 0.0);

        let sep = gjk.distance(&s1, &p1, &s2, &p2).unwrap();
        assert_relative_eq!(sep.distance, 1.0, epsilon = 1.0e-4);
        assert_relative_eq!(sep.normal.x, 1.0, epsilon = 1.0e-4);
    }

    #[test]
    fn touching_shapes_have_no_separation() {
        let gjk = Gjk::default();
        let p1 = Isometry::translation(0.0, 0.0);
        let p2 = Isometry::translation(2.0, 0.0);
        assert!(gjk.distance(&circle(1.0), &p1, &circle(1.0), &p2).is_none());
    }

    #[test]
    fn raycast_segment() {
        // The scenario: a diagonal ray hitting a horizontal segment from
        // below.
        let gjk = Gjk::default();
        let seg = Shape::Segment(Segment::new(
            Point::new(-0.68, 0.68),
            Point::new(-0.53, 0.68),
        ));
        let angle = std::f32::consts::FRAC_PI_4;
        let ray = Ray::new(
            Point::new(-0.85, 0.48),
            Vector::new(angle.cos(), angle.sin()),
        );

        let hit = gjk
            .raycast(&ray, 0.0, &seg, &Isometry::identity())
            .expect("the ray hits the segment");

        assert_relative_eq!(hit.distance, 0.2828, epsilon = 1.0e-3);
        assert_relative_eq!(hit.point.x, -0.65, epsilon = 1.0e-3);
        assert_relative_eq!(hit.point.y, 0.68, epsilon = 1.0e-3);
        assert_relative_eq!(hit.normal.x, 0.0, epsilon = 1.0e-3);
        assert_relative_eq!(hit.normal.y, -1.0, epsilon = 1.0e-3);
    }

    #[test]
    fn raycast_misses_when_pointing_away() {
        let gjk = Gjk::default();
        let ray = Ray::new(Point::new(2.0, 0.0), Vector::new(1.0, 0.0));
        assert!(gjk
            .raycast(&ray, 0.0, &circle(1.0), &Isometry::identity())
            .is_none());
    }

    #[test]
    fn raycast_respects_max_length() {
        let gjk = Gjk::default();
        let ray = Ray::new(Point::new(-5.0, 0.0), Vector::new(1.0, 0.0));
        let shape = circle(1.0);
        assert!(gjk.raycast(&ray, 3.0, &shape, &Isometry::identity()).is_none());
        assert!(gjk.raycast(&ray, 5.0, &shape, &Isometry::identity()).is_some());
    }

    #[test]
    fn strict_containment() {
        let gjk = Gjk::default();
        let big = circle(2.0);
        let small = circle(0.5);
        let id = Isometry::identity();

        assert!(gjk.contains(&big, &id, &small, &id));
        // Touching the boundary from inside is not strict containment.
        assert!(!gjk.contains(&big, &id, &small, &Isometry::translation(1.5, 0.0)));
        // Equal shapes do not contain each other.
        assert!(!gjk.contains(&big, &id, &big, &id));

        let tri = Shape::Polygon(Polygon::new(vec![
            Point::new(-1.0, -1.0),
            Point::new(2.0, -1.0),
            Point::new(0.0, 2.0),
        ]));
        assert!(gjk.contains(&big, &id, &tri, &Isometry::translation(0.0, 0.0)) == false);
        assert!(gjk.contains(
            &Shape::Polygon(Polygon::rectangle(3.0, 3.0)),
            &id,
            &tri,
            &id
        ));
    }

    #[test]
    #[should_panic]
    fn zero_epsilon_is_a_programmer_error() {
        let _ = Gjk::new(30, 0.0);
    }

    #[test]
    fn distance_matches_circle_geometry_under_random_configurations() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(0x2d_b0d1e5);
        let gjk = Gjk::default();

        for _ in 0..200 {
            let r1: Real = rng.gen_range(0.1..2.0);
            let r2: Real = rng.gen_range(0.1..2.0);
            let c1 = Vector::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0));
            let c2 = Vector::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0));

            let true_distance = (c2 - c1).norm() - r1 - r2;
            if true_distance < 1.0e-2 {
                // Touching or overlapping: not a distance-query case.
                continue;
            }

            let sep = gjk
                .distance(
                    &circle(r1),
                    &Isometry::new(c1, 0.0),
                    &circle(r2),
                    &Isometry::new(c2, 0.0),
                )
                .expect("the circles are disjoint");
            assert_relative_eq!(sep.distance, true_distance, epsilon = 1.0e-3);
        }
    }
}
