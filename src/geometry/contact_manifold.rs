//! Contact manifolds: 1-2 contact points sharing a reference normal,
//! produced by clipping the supporting features of two penetrating shapes.

use arrayvec::ArrayVec;

use crate::geometry::contact_pair::ContactData;
use crate::geometry::{Feature, Penetration, Shape};
use crate::math::{Isometry, Point, Real, Vector, MAX_MANIFOLD_POINTS};

/// A stable identifier of a manifold point, derived from the pair of
/// clipped features.
///
/// Identifiers are deterministic given the shapes and normal, and stay
/// equal across timesteps as long as the underlying feature pair does not
/// change, which is what lets the contact cache warm-start impulses.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ContactId {
    /// The reference edge identifier.
    pub reference_edge: u32,
    /// The incident edge (or vertex) identifier.
    pub incident_edge: u32,
    /// How the point was produced (see the `FEATURE_*` constants).
    pub feature: u8,
    /// `true` when the reference feature came from the second shape.
    pub flipped: bool,
}

impl ContactId {
    /// The point is the incident edge's first endpoint, kept by clipping.
    pub const FEATURE_INCIDENT_A: u8 = 0;
    /// The point is the incident edge's second endpoint, kept by clipping.
    pub const FEATURE_INCIDENT_B: u8 = 1;
    /// The point was cut by the side plane at the reference edge's start.
    pub const FEATURE_CLIP_A: u8 = 2;
    /// The point was cut by the side plane at the reference edge's end.
    pub const FEATURE_CLIP_B: u8 = 3;
    /// The manifold has a single point on a curved feature.
    pub const FEATURE_VERTEX: u8 = 4;
}

/// A single point of a contact manifold.
#[derive(Copy, Clone, Debug)]
pub struct ManifoldPoint {
    /// The identifier of this point.
    pub id: ContactId,
    /// The contact point, in world space.
    pub point: Point<Real>,
    /// The penetration depth at this point.
    pub depth: Real,
    /// The solver state carried by this point across steps.
    pub data: ContactData,
}

/// The contact region between two penetrating shapes: one or two points
/// sharing a reference normal.
#[derive(Clone, Debug, Default)]
pub struct ContactManifold {
    /// The shared unit contact normal, pointing from the first shape
    /// towards the second.
    pub normal: Vector<Real>,
    /// The contact points. At most two in 2D.
    pub points: ArrayVec<ManifoldPoint, MAX_MANIFOLD_POINTS>,
}

impl ContactManifold {
    /// Zeroes this manifold: no normal, no point.
    pub fn clear(&mut self) {
        self.normal = Vector::zeros();
        self.points.clear();
    }
}

/// Builds the contact manifold of two penetrating shapes from their
/// penetration vector.
///
/// Returns `None` when the penetration is degenerate (zero normal) or when
/// clipping leaves no point with non-negative depth.
pub fn build_manifold(
    shape1: &Shape,
    pos1: &Isometry<Real>,
    shape2: &Shape,
    pos2: &Isometry<Real>,
    penetration: &Penetration,
) -> Option<ContactManifold> {
    let n = penetration.normal;
    if n.norm_squared() < 1.0e-12 {
        return None;
    }

    let feature1 = shape1.farthest_feature(pos1, &n);
    let feature2 = shape2.farthest_feature(pos2, &-n);

    let mut manifold = ContactManifold {
        normal: n,
        points: ArrayVec::new(),
    };

    match (feature1, feature2) {
        (Feature::Vertex { point, id }, other) => {
            manifold.points.push(ManifoldPoint {
                id: ContactId {
                    reference_edge: feature_id(&other),
                    incident_edge: id,
                    feature: ContactId::FEATURE_VERTEX,
                    flipped: true,
                },
                point,
                depth: penetration.depth,
                data: ContactData::default(),
            });
        }
        (other, Feature::Vertex { point, id }) => {
            manifold.points.push(ManifoldPoint {
                id: ContactId {
                    reference_edge: feature_id(&other),
                    incident_edge: id,
                    feature: ContactId::FEATURE_VERTEX,
                    flipped: false,
                },
                point,
                depth: penetration.depth,
                data: ContactData::default(),
            });
        }
        (Feature::Edge { a: a1, b: b1, id: id1 }, Feature::Edge { a: a2, b: b2, id: id2 }) => {
            // The reference edge is the one most perpendicular to the
            // normal; the other edge is clipped against its side planes.
            let d1 = (b1 - a1).normalize();
            let d2 = (b2 - a2).normalize();

            let (ref_a, ref_b, ref_id, inc_a, inc_b, inc_id, flipped) =
                if d1.dot(&n).abs() <= d2.dot(&n).abs() {
                    (a1, b1, id1, a2, b2, id2, false)
                } else {
                    (a2, b2, id2, a1, b1, id1, true)
                };

            let ref_dir = (ref_b - ref_a).normalize();

            let mut clipped: ArrayVec<ClipPoint, 2> = ArrayVec::new();
            clipped.push(ClipPoint {
                point: inc_a,
                feature: ContactId::FEATURE_INCIDENT_A,
            });
            clipped.push(ClipPoint {
                point: inc_b,
                feature: ContactId::FEATURE_INCIDENT_B,
            });

            // Side plane at the reference edge start, then at its end.
            let clipped = clip(
                &clipped,
                &ref_dir,
                ref_dir.dot(&ref_a.coords),
                ContactId::FEATURE_CLIP_A,
            )?;
            let clipped = clip(
                &clipped,
                &-ref_dir,
                -ref_dir.dot(&ref_b.coords),
                ContactId::FEATURE_CLIP_B,
            )?;

            // Keep the clipped points that actually penetrate the reference
            // face.
            let face_normal = if flipped { -n } else { n };
            let face_offset = face_normal.dot(&ref_a.coords);

            for cp in &clipped {
                let depth = face_offset - face_normal.dot(&cp.point.coords);
                if depth >= 0.0 {
                    manifold.points.push(ManifoldPoint {
                        id: ContactId {
                            reference_edge: ref_id,
                            incident_edge: inc_id,
                            feature: cp.feature,
                            flipped,
                        },
                        point: cp.point,
                        depth,
                        data: ContactData::default(),
                    });
                }
            }
        }
    }

    if manifold.points.is_empty() {
        None
    } else {
        Some(manifold)
    }
}

#[derive(Copy, Clone)]
struct ClipPoint {
    point: Point<Real>,
    feature: u8,
}

// Keeps the part of the segment on the positive side of the plane
// `<p, dir> >= offset`, tagging any newly cut point with `clip_feature`.
fn clip(
    points: &ArrayVec<ClipPoint, 2>,
    dir: &Vector<Real>,
    offset: Real,
    clip_feature: u8,
) -> Option<ArrayVec<ClipPoint, 2>> {
    let mut out = ArrayVec::new();

    let d0 = dir.dot(&points[0].point.coords) - offset;
    let d1 = dir.dot(&points[1].point.coords) - offset;

    if d0 >= 0.0 {
        out.push(points[0]);
    }
    if d1 >= 0.0 {
        out.push(points[1]);
    }

    // The segment crosses the plane: add the intersection point.
    if d0 * d1 < 0.0 && out.len() < 2 {
        let t = d0 / (d0 - d1);
        let p = points[0].point + (points[1].point - points[0].point) * t;
        out.push(ClipPoint {
            point: p,
            feature: clip_feature,
        });
    }

    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn feature_id(feature: &Feature) -> u32 {
    match feature {
        Feature::Vertex { id, .. } => *id,
        Feature::Edge { id, .. } => *id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Circle, Epa, Gjk, Polygon};
    use approx::assert_relative_eq;

    fn penetration_of(
        shape1: &Shape,
        pos1: &Isometry<Real>,
        shape2: &Shape,
        pos2: &Isometry<Real>,
    ) -> Penetration {
        let gjk = Gjk::default();
        let epa = Epa::default();
        let simplex = gjk.intersect(shape1, pos1, shape2, pos2).expect("overlap");
        epa.penetration(shape1, pos1, shape2, pos2, &simplex)
    }

    #[test]
    fn box_on_box_produces_two_points() {
        let ground = Shape::Polygon(Polygon::rectangle(10.0, 0.5));
        let cube = Shape::Polygon(Polygon::rectangle(0.5, 0.5));
        let p1 = Isometry::translation(0.0, 0.0);
        // Resting on the ground, sunk by 0.1.
        let p2 = Isometry::translation(0.0, 0.9);

        let pen = penetration_of(&ground, &p1, &cube, &p2);
        assert_relative_eq!(pen.depth, 0.1, epsilon = 1.0e-3);

        let manifold = build_manifold(&ground, &p1, &cube, &p2, &pen).unwrap();
        assert_eq!(manifold.points.len(), 2);
        for pt in &manifold.points {
            assert!(pt.depth >= 0.0);
            assert_relative_eq!(pt.depth, 0.1, epsilon = 1.0e-2);
            assert_relative_eq!(pt.point.y, 0.4, epsilon = 1.0e-2);
        }
        assert_ne!(manifold.points[0].id, manifold.points[1].id);
    }

    #[test]
    fn circle_on_box_produces_one_point() {
        let ground = Shape::Polygon(Polygon::rectangle(10.0, 0.5));
        let ball = Shape::Circle(Circle::new(0.5));
        let p1 = Isometry::translation(0.0, 0.0);
        let p2 = Isometry::translation(0.0, 0.95);

        let pen = penetration_of(&ground, &p1, &ball, &p2);
        let manifold = build_manifold(&ground, &p1, &ball, &p2, &pen).unwrap();

        assert_eq!(manifold.points.len(), 1);
        assert_eq!(manifold.points[0].id.feature, ContactId::FEATURE_VERTEX);
        assert_relative_eq!(manifold.points[0].depth, 0.05, epsilon = 1.0e-2);
    }

    #[test]
    fn identifiers_are_deterministic() {
        let ground = Shape::Polygon(Polygon::rectangle(10.0, 0.5));
        let cube = Shape::Polygon(Polygon::rectangle(0.5, 0.5));
        let p1 = Isometry::translation(0.0, 0.0);
        let p2 = Isometry::translation(0.0, 0.9);

        let pen = penetration_of(&ground, &p1, &cube, &p2);
        let m1 = build_manifold(&ground, &p1, &cube, &p2, &pen).unwrap();
        let m2 = build_manifold(&ground, &p1, &cube, &p2, &pen).unwrap();

        assert_eq!(m1.points.len(), m2.points.len());
        for (a, b) in m1.points.iter().zip(m2.points.iter()) {
            assert_eq!(a.id, b.id);
        }
    }
}
