//! The Expanding Polytope Algorithm, computing the minimum penetration
//! vector of two intersecting convex shapes from a GJK terminal simplex.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::geometry::minkowski::{self, SupportPoint};
use crate::geometry::{Shape, Simplex};
use crate::math::{Isometry, Real, Vector};

/// The default maximum number of expansions of the polytope.
pub const DEFAULT_EPA_MAX_ITERATIONS: usize = 100;

/// The smallest accepted EPA iteration cap.
pub const MIN_EPA_ITERATIONS: usize = 5;

/// The default convergence threshold of the expansion loop.
pub const DEFAULT_EPA_DISTANCE_EPSILON: Real = 1.0e-5;

/// A penetration vector: the minimum translation separating two
/// intersecting shapes.
#[derive(Copy, Clone, Debug)]
pub struct Penetration {
    /// The unit penetration direction, pointing from the first shape towards
    /// the second. Translating the second shape by `normal * depth`
    /// separates the pair.
    pub normal: Vector<Real>,
    /// The penetration depth.
    pub depth: Real,
}

// One edge of the expanding polytope. Edges are only ever split by
// inserting the new support point between their endpoints, so an edge
// pushed on the heap stays valid until it is popped.
#[derive(Copy, Clone, Debug)]
pub(crate) struct PolytopeEdge {
    pub v1: usize,
    pub v2: usize,
    pub distance: Real,
    pub normal: Vector<Real>,
    seq: u32,
}

impl PolytopeEdge {
    // `winding` is +1 when the polytope vertices wind counter-clockwise.
    pub(crate) fn new(
        vertices: &[SupportPoint],
        v1: usize,
        v2: usize,
        winding: i8,
        seq: u32,
    ) -> Self {
        let a = vertices[v1].point;
        let b = vertices[v2].point;
        let ab = b - a;

        let normal = Vector::new(ab.y, -ab.x) * winding as Real;
        let normal = normal
            .try_normalize(1.0e-12)
            .unwrap_or_else(Vector::zeros);

        Self {
            v1,
            v2,
            // Rounding may produce a slightly negative supporting distance
            // for an edge passing through the origin.
            distance: normal.dot(&a).max(0.0),
            normal,
            seq,
        }
    }
}

impl PartialEq for PolytopeEdge {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PolytopeEdge {}

impl PartialOrd for PolytopeEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PolytopeEdge {
    // `BinaryHeap` is a max-heap; invert so the closest edge is popped
    // first, with ties broken by insertion order.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .partial_cmp(&self.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// The EPA penetration solver.
#[derive(Copy, Clone, Debug)]
pub struct Epa {
    max_iterations: usize,
    distance_epsilon: Real,
}

impl Default for Epa {
    fn default() -> Self {
        Self::new(DEFAULT_EPA_MAX_ITERATIONS, DEFAULT_EPA_DISTANCE_EPSILON)
    }
}

impl Epa {
    /// Creates an EPA solver with the given iteration cap (at least
    /// [`MIN_EPA_ITERATIONS`]) and convergence threshold (positive).
    pub fn new(max_iterations: usize, distance_epsilon: Real) -> Self {
        assert!(
            max_iterations >= MIN_EPA_ITERATIONS,
            "The EPA maximum number of iterations must be at least {}.",
            MIN_EPA_ITERATIONS
        );
        assert!(
            distance_epsilon > 0.0,
            "The EPA distance epsilon must be positive."
        );
        Self {
            max_iterations,
            distance_epsilon,
        }
    }

    /// Expands a GJK terminal simplex into the minimum penetration vector.
    ///
    /// Returns a zero penetration when the simplex cannot be inflated to a
    /// proper polytope (fully degenerate input).
    pub fn penetration(
        &self,
        shape1: &Shape,
        pos1: &Isometry<Real>,
        shape2: &Shape,
        pos2: &Isometry<Real>,
        simplex: &Simplex,
    ) -> Penetration {
        let support = |d: &Vector<Real>| minkowski::support(shape1, pos1, shape2, pos2, d);

        let mut vertices: Vec<SupportPoint> = simplex.points().to_vec();
        let mut winding = simplex.winding();

        // GJK may terminate on a lower-dimensional or collinear simplex
        // when the origin lies on its boundary; rebuild a proper triangle
        // from its distinct points first.
        if winding == 0 {
            vertices.dedup_by(|a, b| (a.point - b.point).norm_squared() < 1.0e-12);
            vertices.truncate(2);
            if !inflate(&mut vertices, &mut winding, &support) {
                return Penetration {
                    normal: Vector::zeros(),
                    depth: 0.0,
                };
            }
        }

        let mut seq = 0;
        let mut heap = BinaryHeap::new();
        for i in 0..vertices.len() {
            let j = (i + 1) % vertices.len();
            heap.push(PolytopeEdge::new(&vertices, i, j, winding, seq));
            seq += 1;
        }

        let mut best: Option<Penetration> = None;

        for _ in 0..self.max_iterations {
            let edge = match heap.pop() {
                Some(edge) => edge,
                None => break,
            };
            if edge.normal == Vector::zeros() {
                continue;
            }

            let w = support(&edge.normal);
            let projection = w.point.dot(&edge.normal);

            if projection - edge.distance < self.distance_epsilon {
                return Penetration {
                    normal: edge.normal,
                    depth: projection.max(0.0),
                };
            }

            best = Some(Penetration {
                normal: edge.normal,
                depth: projection.max(0.0),
            });

            // Split the popped edge around the new vertex, preserving the
            // winding.
            vertices.push(w);
            let k = vertices.len() - 1;
            heap.push(PolytopeEdge::new(&vertices, edge.v1, k, winding, seq));
            heap.push(PolytopeEdge::new(&vertices, k, edge.v2, winding, seq + 1));
            seq += 2;
        }

        log::debug!("EPA ran out of iterations; returning the best edge so far.");
        best.unwrap_or(Penetration {
            normal: Vector::zeros(),
            depth: 0.0,
        })
    }
}

// Grows a 1- or 2-point simplex into a proper triangle by supporting along
// directions perpendicular to the current feature. Returns `false` when
// every attempt stays degenerate.
fn inflate(
    vertices: &mut Vec<SupportPoint>,
    winding: &mut i8,
    support: &impl Fn(&Vector<Real>) -> SupportPoint,
) -> bool {
    if vertices.is_empty() {
        return false;
    }

    if vertices.len() == 1 {
        for dir in &[Vector::new(1.0, 0.0), Vector::new(-1.0, 0.0)] {
            let w = support(dir);
            if (w.point - vertices[0].point).norm_squared() > 1.0e-12 {
                vertices.push(w);
                break;
            }
        }
        if vertices.len() == 1 {
            return false;
        }
    }

    let ab = vertices[1].point - vertices[0].point;
    for dir in &[Vector::new(-ab.y, ab.x), Vector::new(ab.y, -ab.x)] {
        let w = support(dir);
        let cross = ab.x * (w.point.y - vertices[0].point.y)
            - ab.y * (w.point.x - vertices[0].point.x);
        if cross.abs() > 1.0e-12 {
            vertices.push(w);
            *winding = if cross > 0.0 { 1 } else { -1 };
            return true;
        }
    }

    false
}
