//! Contact-normal correction for chain links.
//!
//! A chain of connected edge segments has internal ("ghost") vertices. A
//! body crossing such a vertex can momentarily produce a contact normal
//! pointing along the vertex direction instead of a face normal, ejecting
//! the body sideways. This pass restricts every link contact normal to the
//! fan of directions the chain geometry actually allows, and discards
//! contacts on the non-collidable back side.

use crate::geometry::{ContactManifold, Link};
use crate::math::{Isometry, Real, Vector};

#[inline]
fn cross(a: &Vector<Real>, b: &Vector<Real>) -> Real {
    a.x * b.y - a.y * b.x
}

#[inline]
fn right_normal(dir: &Vector<Real>) -> Vector<Real> {
    Vector::new(dir.y, -dir.x).normalize()
}

const FAN_EPSILON: Real = 1.0e-6;

/// Restricts the manifold normal of a contact involving a chain link.
///
/// `link_is_first` tells whether the link is the first shape of the pair
/// (the manifold normal points from the first shape to the second). Contacts
/// entirely on the link's back side are zeroed: depth 0, normal 0.
pub fn filter_link_contact(
    link: &Link,
    link_pos: &Isometry<Real>,
    link_is_first: bool,
    manifold: &mut ContactManifold,
) {
    if manifold.points.is_empty() {
        return;
    }

    let a = link_pos * link.segment.a;
    let b = link_pos * link.segment.b;
    let edge = b - a;
    let e = match edge.try_normalize(1.0e-12) {
        Some(e) => e,
        None => return,
    };
    let n0 = right_normal(&e);

    // Work with the normal oriented away from the link.
    let mut n = if link_is_first {
        manifold.normal
    } else {
        -manifold.normal
    };

    // Links are one-way: the inward half-space is not collidable.
    if n.dot(&n0) < 0.0 {
        manifold.normal = Vector::zeros();
        for pt in &mut manifold.points {
            pt.depth = 0.0;
        }
        return;
    }

    let lean = cross(&n0, &n);

    if lean < -FAN_EPSILON {
        // Leaning towards the link start: the transition to `prev` decides
        // what is allowed.
        if let Some(prev) = link.prev {
            let prev_dir = (a - link_pos * prev)
                .try_normalize(1.0e-12)
                .unwrap_or(e);
            if cross(&prev_dir, &e) > FAN_EPSILON {
                // Convex transition: normals between the neighbor's face
                // normal and ours are fine; beyond that, the contact belongs
                // to the neighbor.
                let np = right_normal(&prev_dir);
                if cross(&np, &n) < 0.0 {
                    n = np;
                }
            } else {
                // Concave (or straight) transition: only the face normal.
                n = n0;
            }
        }
    } else if lean > FAN_EPSILON {
        // Leaning towards the link end: same reasoning with `next`.
        if let Some(next) = link.next {
            let next_dir = (link_pos * next - b)
                .try_normalize(1.0e-12)
                .unwrap_or(e);
            if cross(&e, &next_dir) > FAN_EPSILON {
                let nn = right_normal(&next_dir);
                if cross(&n, &nn) < 0.0 {
                    n = nn;
                }
            } else {
                n = n0;
            }
        }
    }

    manifold.normal = if link_is_first { n } else { -n };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::contact_pair::ContactData;
    use crate::geometry::{ContactId, ManifoldPoint, Segment};
    use crate::math::Point;
    use approx::assert_relative_eq;

    // A floor chain running right to left, so the collidable side faces up.
    fn floor_link(prev: Option<Point<Real>>, next: Option<Point<Real>>) -> Link {
        Link {
            segment: Segment::new(Point::new(1.0, 0.0), Point::new(0.0, 0.0)),
            prev,
            next,
        }
    }

    fn manifold_with_normal(n: Vector<Real>) -> ContactManifold {
        let mut manifold = ContactManifold::default();
        manifold.normal = n;
        manifold.points.push(ManifoldPoint {
            id: ContactId {
                reference_edge: 0,
                incident_edge: 0,
                feature: ContactId::FEATURE_VERTEX,
                flipped: false,
            },
            point: Point::new(0.5, 0.0),
            depth: 0.1,
            data: ContactData::default(),
        });
        manifold
    }

    #[test]
    fn back_side_contact_is_zeroed() {
        let link = floor_link(None, None);
        let mut manifold = manifold_with_normal(Vector::new(0.0, -1.0));

        filter_link_contact(&link, &Isometry::identity(), true, &mut manifold);

        assert_eq!(manifold.normal, Vector::zeros());
        assert_eq!(manifold.points[0].depth, 0.0);
    }

    #[test]
    fn straight_chain_clamps_to_face_normal() {
        // A straight continuation behind the link start.
        let link = floor_link(Some(Point::new(2.0, 0.0)), None);
        let tilted = Vector::new(0.5, 1.0).normalize();
        let mut manifold = manifold_with_normal(tilted);

        filter_link_contact(&link, &Isometry::identity(), true, &mut manifold);

        assert_relative_eq!(manifold.normal.x, 0.0, epsilon = 1.0e-6);
        assert_relative_eq!(manifold.normal.y, 1.0, epsilon = 1.0e-6);
    }

    #[test]
    fn concave_transition_only_allows_face_normal() {
        // The chain rises behind the link start: a pocket.
        let link = floor_link(Some(Point::new(2.0, 1.0)), None);
        let tilted = Vector::new(0.4, 1.0).normalize();
        let mut manifold = manifold_with_normal(tilted);

        filter_link_contact(&link, &Isometry::identity(), true, &mut manifold);

        assert_relative_eq!(manifold.normal.x, 0.0, epsilon = 1.0e-6);
        assert_relative_eq!(manifold.normal.y, 1.0, epsilon = 1.0e-6);
    }

    #[test]
    fn convex_transition_keeps_normals_inside_the_fan() {
        // The chain descends behind the link start: an overhang corner with
        // a 45-degree allowed fan.
        let link = floor_link(Some(Point::new(2.0, -1.0)), None);

        // Inside the fan: untouched.
        let inside = Vector::new(0.5, 1.0).normalize();
        let mut manifold = manifold_with_normal(inside);
        filter_link_contact(&link, &Isometry::identity(), true, &mut manifold);
        assert_relative_eq!(manifold.normal.x, inside.x, epsilon = 1.0e-6);
        assert_relative_eq!(manifold.normal.y, inside.y, epsilon = 1.0e-6);

        // Beyond the neighbor's face normal: clamped onto the fan boundary.
        let beyond = Vector::new(2.0, 1.0).normalize();
        let mut manifold = manifold_with_normal(beyond);
        filter_link_contact(&link, &Isometry::identity(), true, &mut manifold);
        let bound = Vector::new(1.0, 1.0).normalize();
        assert_relative_eq!(manifold.normal.x, bound.x, epsilon = 1.0e-6);
        assert_relative_eq!(manifold.normal.y, bound.y, epsilon = 1.0e-6);
    }

    #[test]
    fn flipped_pair_is_filtered_in_link_space() {
        // Same back-side scenario, with the link as second shape: the
        // manifold normal points towards the link.
        let link = floor_link(None, None);
        let mut manifold = manifold_with_normal(Vector::new(0.0, 1.0));

        filter_link_contact(&link, &Isometry::identity(), false, &mut manifold);

        assert_eq!(manifold.normal, Vector::zeros());
    }
}
