//! Convex shapes usable by the narrow-phase.

use crate::geometry::AABB;
use crate::math::{Isometry, Point, Real, Vector};

/// A ball shape.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Circle {
    /// The radius of the circle.
    pub radius: Real,
}

/// A convex polygon with counter-clockwise winding.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Polygon {
    vertices: Vec<Point<Real>>,
    normals: Vec<Vector<Real>>,
}

/// A capsule: the set of points at distance at most `radius` from a segment
/// of half-length `half_length` aligned with the local x axis.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Capsule {
    /// Half the length of the capsule's inner segment.
    pub half_length: Real,
    /// The radius of the capsule's caps.
    pub radius: Real,
}

/// A line segment.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Segment {
    /// The first endpoint.
    pub a: Point<Real>,
    /// The second endpoint.
    pub b: Point<Real>,
}

/// An ellipse with principal radii along the local axes.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Ellipse {
    /// The radius along the local x axis.
    pub radius_x: Real,
    /// The radius along the local y axis.
    pub radius_y: Real,
}

/// One segment of a chain of connected edges.
///
/// A link is one-sided: only its outward half-space (to the right of the
/// `a -> b` direction, like the outward side of a counter-clockwise polygon
/// edge) is collidable. The optional neighbor vertices are used to fix up
/// contact normals near chain vertices.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Link {
    /// The segment of this link.
    pub segment: Segment,
    /// The vertex preceding `segment.a` on the chain, if any.
    pub prev: Option<Point<Real>>,
    /// The vertex following `segment.b` on the chain, if any.
    pub next: Option<Point<Real>>,
}

impl Circle {
    /// Creates a circle from its radius.
    pub fn new(radius: Real) -> Self {
        assert!(radius > 0.0, "The circle radius must be positive.");
        Self { radius }
    }
}

impl Polygon {
    /// Creates a polygon from its vertices, given in counter-clockwise order.
    pub fn new(vertices: Vec<Point<Real>>) -> Self {
        assert!(
            vertices.len() >= 3,
            "A polygon must have at least 3 vertices."
        );

        let mut area = 0.0;
        for i in 0..vertices.len() {
            let v1 = vertices[i];
            let v2 = vertices[(i + 1) % vertices.len()];
            area += v1.x * v2.y - v2.x * v1.y;
        }
        assert!(
            area > 0.0,
            "The polygon vertices must be in counter-clockwise order and non-degenerate."
        );

        let normals = (0..vertices.len())
            .map(|i| {
                let d = vertices[(i + 1) % vertices.len()] - vertices[i];
                Vector::new(d.y, -d.x).normalize()
            })
            .collect();

        Self { vertices, normals }
    }

    /// An axis-aligned rectangle with the given half-extents.
    pub fn rectangle(half_width: Real, half_height: Real) -> Self {
        assert!(
            half_width > 0.0 && half_height > 0.0,
            "The rectangle half-extents must be positive."
        );
        Self::new(vec![
            Point::new(half_width, -half_height),
            Point::new(half_width, half_height),
            Point::new(-half_width, half_height),
            Point::new(-half_width, -half_height),
        ])
    }

    /// A regular polygon inscribed in a circle of the given radius, with its
    /// first vertex at angle zero.
    pub fn regular(sides: usize, radius: Real) -> Self {
        assert!(sides >= 3, "A polygon must have at least 3 sides.");
        assert!(radius > 0.0, "The circumscribed radius must be positive.");
        let step = std::f32::consts::PI * 2.0 / sides as Real;
        Self::new(
            (0..sides)
                .map(|i| {
                    let a = step * i as Real;
                    Point::new(radius * a.cos(), radius * a.sin())
                })
                .collect(),
        )
    }

    /// The vertices of this polygon.
    pub fn vertices(&self) -> &[Point<Real>] {
        &self.vertices
    }

    /// The outward unit normals of this polygon's edges. The `i`-th normal
    /// belongs to the edge joining vertices `i` and `i + 1`.
    pub fn normals(&self) -> &[Vector<Real>] {
        &self.normals
    }
}

impl Segment {
    /// Creates a segment from its endpoints.
    pub fn new(a: Point<Real>, b: Point<Real>) -> Self {
        Self { a, b }
    }

    fn closest_point_to(&self, pt: &Point<Real>) -> Point<Real> {
        let ab = self.b - self.a;
        let len2 = ab.norm_squared();
        if len2 == 0.0 {
            return self.a;
        }
        let t = ((pt - self.a).dot(&ab) / len2).max(0.0).min(1.0);
        self.a + ab * t
    }
}

/// The feature of a shape farthest in a given direction: either a single
/// vertex (curved boundary) or a whole edge.
#[derive(Copy, Clone, Debug)]
pub enum Feature {
    /// A single extreme point.
    Vertex {
        /// The vertex, in world space.
        point: Point<Real>,
        /// A shape-local identifier of the vertex.
        id: u32,
    },
    /// An extreme edge, with `a -> b` following the shape's counter-clockwise
    /// winding (the outward normal is `(b - a)` rotated -90 degrees).
    Edge {
        /// The edge start, in world space.
        a: Point<Real>,
        /// The edge end, in world space.
        b: Point<Real>,
        /// A shape-local identifier of the edge.
        id: u32,
    },
}

// A direction deviating from an edge normal by less than this is still
// considered to designate the whole edge.
const EDGE_FEATURE_COS: Real = 0.99;

/// A convex shape, modeled as a tagged enum to keep the support-function
/// dispatch branch-predictable in the GJK inner loop.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum Shape {
    /// A circle.
    Circle(Circle),
    /// A convex polygon.
    Polygon(Polygon),
    /// A capsule.
    Capsule(Capsule),
    /// A segment.
    Segment(Segment),
    /// An ellipse.
    Ellipse(Ellipse),
    /// A one-sided chain link.
    Link(Link),
}

impl Shape {
    /// The extreme point of this shape in the given local-space direction.
    ///
    /// The direction does not need to be normalized. Ties are broken
    /// deterministically by vertex order.
    pub fn local_support_point(&self, dir: &Vector<Real>) -> Point<Real> {
        let dir = dir
            .try_normalize(1.0e-12)
            .unwrap_or_else(|| Vector::new(1.0, 0.0));

        match self {
            Shape::Circle(c) => Point::from(dir * c.radius),
            Shape::Polygon(p) => {
                let mut best = 0;
                let mut best_dot = p.vertices[0].coords.dot(&dir);
                for (i, v) in p.vertices.iter().enumerate().skip(1) {
                    let d = v.coords.dot(&dir);
                    if d > best_dot {
                        best_dot = d;
                        best = i;
                    }
                }
                p.vertices[best]
            }
            Shape::Capsule(c) => {
                let x = if dir.x >= 0.0 {
                    c.half_length
                } else {
                    -c.half_length
                };
                Point::new(x, 0.0) + dir * c.radius
            }
            Shape::Segment(s) => {
                if s.a.coords.dot(&dir) >= s.b.coords.dot(&dir) {
                    s.a
                } else {
                    s.b
                }
            }
            Shape::Ellipse(e) => {
                let v = Vector::new(e.radius_x * e.radius_x * dir.x, e.radius_y * e.radius_y * dir.y);
                let len = (dir.x * dir.x * e.radius_x * e.radius_x
                    + dir.y * dir.y * e.radius_y * e.radius_y)
                    .sqrt();
                if len == 0.0 {
                    Point::origin()
                } else {
                    Point::from(v / len)
                }
            }
            Shape::Link(l) => Shape::Segment(l.segment).local_support_point(&dir),
        }
    }

    /// The extreme point of this shape in the given world-space direction.
    pub fn support_point(&self, pos: &Isometry<Real>, dir: &Vector<Real>) -> Point<Real> {
        let local_dir = pos.inverse_transform_vector(dir);
        pos * self.local_support_point(&local_dir)
    }

    /// The farthest feature of this shape in the given world-space direction.
    ///
    /// Curved boundaries yield a vertex; flat boundaries aligned with the
    /// direction yield the whole edge, which is what the manifold clipper
    /// needs to produce two-point manifolds.
    pub fn farthest_feature(&self, pos: &Isometry<Real>, dir: &Vector<Real>) -> Feature {
        let local_dir = pos
            .inverse_transform_vector(dir)
            .try_normalize(1.0e-12)
            .unwrap_or_else(|| Vector::new(1.0, 0.0));

        match self {
            Shape::Circle(_) | Shape::Ellipse(_) => Feature::Vertex {
                point: pos * self.local_support_point(&local_dir),
                id: 0,
            },
            Shape::Polygon(p) => {
                let n = p.vertices.len();
                let mut best = 0;
                let mut best_dot = p.vertices[0].coords.dot(&local_dir);
                for (i, v) in p.vertices.iter().enumerate().skip(1) {
                    let d = v.coords.dot(&local_dir);
                    if d > best_dot {
                        best_dot = d;
                        best = i;
                    }
                }

                // The adjacent edge whose normal is most aligned with the
                // direction wins.
                let prev_edge = (best + n - 1) % n;
                if p.normals[prev_edge].dot(&local_dir) >= p.normals[best].dot(&local_dir) {
                    Feature::Edge {
                        a: pos * p.vertices[prev_edge],
                        b: pos * p.vertices[best],
                        id: prev_edge as u32,
                    }
                } else {
                    Feature::Edge {
                        a: pos * p.vertices[best],
                        b: pos * p.vertices[(best + 1) % n],
                        id: best as u32,
                    }
                }
            }
            Shape::Capsule(c) => {
                if local_dir.y >= EDGE_FEATURE_COS {
                    Feature::Edge {
                        a: pos * Point::new(c.half_length, c.radius),
                        b: pos * Point::new(-c.half_length, c.radius),
                        id: 0,
                    }
                } else if local_dir.y <= -EDGE_FEATURE_COS {
                    Feature::Edge {
                        a: pos * Point::new(-c.half_length, -c.radius),
                        b: pos * Point::new(c.half_length, -c.radius),
                        id: 1,
                    }
                } else {
                    Feature::Vertex {
                        point: pos * self.local_support_point(&local_dir),
                        id: 2 + (local_dir.x >= 0.0) as u32,
                    }
                }
            }
            Shape::Segment(s) => segment_farthest_feature(s, pos, &local_dir),
            Shape::Link(l) => segment_farthest_feature(&l.segment, pos, &local_dir),
        }
    }

    /// The axis-aligned bounding box of this shape under the given position.
    pub fn compute_aabb(&self, pos: &Isometry<Real>) -> AABB {
        match self {
            Shape::Polygon(p) => {
                let mut aabb = AABB::from_point(pos * p.vertices[0]);
                for v in &p.vertices[1..] {
                    aabb = aabb.merged(&AABB::from_point(pos * v));
                }
                aabb
            }
            Shape::Segment(s) => {
                AABB::from_point(pos * s.a).merged(&AABB::from_point(pos * s.b))
            }
            Shape::Link(l) => Shape::Segment(l.segment).compute_aabb(pos),
            _ => {
                // Support-mapped bounds along the world axes.
                let right = self.support_point(pos, &Vector::new(1.0, 0.0));
                let up = self.support_point(pos, &Vector::new(0.0, 1.0));
                let left = self.support_point(pos, &Vector::new(-1.0, 0.0));
                let down = self.support_point(pos, &Vector::new(0.0, -1.0));
                AABB::new(Point::new(left.x, down.y), Point::new(right.x, up.y))
            }
        }
    }

    /// The radius of the smallest circle centered at the local origin
    /// containing this shape. Used to bound the surface velocity of a
    /// rotating shape during continuous collision detection.
    pub fn bounding_radius(&self) -> Real {
        match self {
            Shape::Circle(c) => c.radius,
            Shape::Polygon(p) => p
                .vertices
                .iter()
                .map(|v| v.coords.norm())
                .fold(0.0, Real::max),
            Shape::Capsule(c) => c.half_length + c.radius,
            Shape::Segment(s) => s.a.coords.norm().max(s.b.coords.norm()),
            Shape::Ellipse(e) => e.radius_x.max(e.radius_y),
            Shape::Link(l) => Shape::Segment(l.segment).bounding_radius(),
        }
    }

    /// Does this shape contain the given world-space point?
    pub fn contains_point(&self, pos: &Isometry<Real>, pt: &Point<Real>) -> bool {
        self.boundary_margin(pos, pt) >= 0.0
    }

    /// A lower bound of the signed distance from `pt` to the boundary of
    /// this shape: positive inside, negative outside. Thin shapes (segments,
    /// links) have no interior and always report a non-positive margin.
    pub fn boundary_margin(&self, pos: &Isometry<Real>, pt: &Point<Real>) -> Real {
        let local = pos.inverse_transform_point(pt);

        match self {
            Shape::Circle(c) => c.radius - local.coords.norm(),
            Shape::Polygon(p) => {
                let mut margin = Real::MAX;
                for (i, n) in p.normals.iter().enumerate() {
                    margin = margin.min(-n.dot(&(local - p.vertices[i])));
                }
                margin
            }
            Shape::Capsule(c) => {
                let seg = Segment::new(
                    Point::new(-c.half_length, 0.0),
                    Point::new(c.half_length, 0.0),
                );
                c.radius - (local - seg.closest_point_to(&local)).norm()
            }
            Shape::Segment(s) => -(local - s.closest_point_to(&local)).norm(),
            Shape::Ellipse(e) => {
                let q = ((local.x / e.radius_x) * (local.x / e.radius_x)
                    + (local.y / e.radius_y) * (local.y / e.radius_y))
                    .sqrt();
                (1.0 - q) * e.radius_x.min(e.radius_y)
            }
            Shape::Link(l) => Shape::Segment(l.segment).boundary_margin(pos, pt),
        }
    }

    /// The local centroid of this shape.
    pub fn local_center(&self) -> Point<Real> {
        match self {
            Shape::Circle(_) | Shape::Capsule(_) | Shape::Ellipse(_) => Point::origin(),
            Shape::Polygon(p) => {
                // Area-weighted centroid.
                let mut area = 0.0;
                let mut center = Vector::zeros();
                for i in 0..p.vertices.len() {
                    let v1 = p.vertices[i].coords;
                    let v2 = p.vertices[(i + 1) % p.vertices.len()].coords;
                    let cross = v1.x * v2.y - v2.x * v1.y;
                    area += cross;
                    center += (v1 + v2) * cross;
                }
                Point::from(center / (3.0 * area))
            }
            Shape::Segment(s) => na::center(&s.a, &s.b),
            Shape::Link(l) => na::center(&l.segment.a, &l.segment.b),
        }
    }
}

fn segment_farthest_feature(s: &Segment, pos: &Isometry<Real>, local_dir: &Vector<Real>) -> Feature {
    let ab = (s.b - s.a).normalize();
    let normal = Vector::new(ab.y, -ab.x);

    if normal.dot(local_dir) >= EDGE_FEATURE_COS {
        Feature::Edge {
            a: pos * s.a,
            b: pos * s.b,
            id: 0,
        }
    } else if normal.dot(local_dir) <= -EDGE_FEATURE_COS {
        Feature::Edge {
            a: pos * s.b,
            b: pos * s.a,
            id: 0,
        }
    } else if s.a.coords.dot(local_dir) >= s.b.coords.dot(local_dir) {
        Feature::Vertex {
            point: pos * s.a,
            id: 0,
        }
    } else {
        Feature::Vertex {
            point: pos * s.b,
            id: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn polygon_support_is_extreme_vertex() {
        let square = Shape::Polygon(Polygon::rectangle(1.0, 2.0));
        let s = square.local_support_point(&Vector::new(1.0, 1.0));
        assert_eq!(s, Point::new(1.0, 2.0));
    }

    #[test]
    fn rotated_support_accounts_for_the_transform() {
        let square = Shape::Polygon(Polygon::rectangle(1.0, 1.0));
        let pos = Isometry::new(Vector::new(10.0, 0.0), std::f32::consts::FRAC_PI_4);
        let s = square.support_point(&pos, &Vector::new(1.0, 0.0));
        // A unit square rotated by 45 degrees sticks out by sqrt(2).
        assert_relative_eq!(s.x, 10.0 + std::f32::consts::SQRT_2, epsilon = 1.0e-5);
    }

    #[test]
    fn ellipse_support_maximizes_projection() {
        let e = Shape::Ellipse(Ellipse {
            radius_x: 2.0,
            radius_y: 1.0,
        });
        let s = e.local_support_point(&Vector::new(1.0, 0.0));
        assert_relative_eq!(s.x, 2.0, epsilon = 1.0e-6);
        let s = e.local_support_point(&Vector::new(0.0, -1.0));
        assert_relative_eq!(s.y, -1.0, epsilon = 1.0e-6);
    }

    #[test]
    fn capsule_farthest_feature_is_flat_side_when_aligned() {
        let c = Shape::Capsule(Capsule {
            half_length: 1.0,
            radius: 0.5,
        });
        match c.farthest_feature(&Isometry::identity(), &Vector::new(0.0, 1.0)) {
            Feature::Edge { a, b, id } => {
                assert_eq!(id, 0);
                assert_relative_eq!(a.y, 0.5);
                assert_relative_eq!(b.y, 0.5);
                assert!(a.x > b.x);
            }
            other => panic!("expected an edge feature, got {:?}", other),
        }
    }

    #[test]
    fn polygon_centroid_of_rectangle_is_origin() {
        let p = Polygon::rectangle(2.0, 1.0);
        let c = Shape::Polygon(p).local_center();
        assert_relative_eq!(c.x, 0.0, epsilon = 1.0e-6);
        assert_relative_eq!(c.y, 0.0, epsilon = 1.0e-6);
    }

    #[test]
    fn boundary_margin_sign_convention() {
        let p = Shape::Polygon(Polygon::rectangle(1.0, 1.0));
        let id = Isometry::identity();
        assert!(p.boundary_margin(&id, &Point::new(0.0, 0.0)) > 0.9);
        assert!(p.boundary_margin(&id, &Point::new(2.0, 0.0)) < 0.0);
        assert!(p.contains_point(&id, &Point::new(0.5, -0.5)));
    }
}
