//! Non-linear position correction of contact penetration.
//!
//! The velocity solve does not carry a positional error term; residual
//! overlap is removed here instead, by pushing the bodies apart a fraction
//! of the remaining depth at each iteration, working on a position buffer
//! so joints and contacts observe each other's corrections.

use crate::dynamics::{IntegrationParameters, RigidBodySet};
use crate::geometry::ContactPair;
use crate::math::{Isometry, Point, Real, Rotation, Translation, Vector, MAX_MANIFOLD_POINTS};
use crate::utils::WCross;
use arrayvec::ArrayVec;

// One side of a position constraint: the solver-buffer offset of a dynamic
// body, or the frozen pose of a non-dynamic one.
#[derive(Copy, Clone, Debug)]
pub(crate) enum PositionConstraintBody {
    Dynamic {
        mj_lambda: usize,
        im: Real,
        ii: Real,
        local_com: Point<Real>,
    },
    Ground {
        position: Isometry<Real>,
    },
}

impl PositionConstraintBody {
    fn position(&self, positions: &[Isometry<Real>]) -> Isometry<Real> {
        match self {
            PositionConstraintBody::Dynamic { mj_lambda, .. } => positions[*mj_lambda],
            PositionConstraintBody::Ground { position } => *position,
        }
    }

    fn apply_impulse(
        &self,
        positions: &mut [Isometry<Real>],
        impulse: &Vector<Real>,
        dp: &Vector<Real>,
    ) {
        if let PositionConstraintBody::Dynamic {
            mj_lambda,
            im,
            ii,
            local_com,
        } = self
        {
            let pos = &mut positions[*mj_lambda];
            let com = *pos * *local_com;
            let new_com = com + impulse * *im;
            let new_rot = Rotation::new(*ii * dp.gcross(*impulse)) * pos.rotation;
            // Rotate about the center of mass, then translate it.
            *pos = Isometry::from_parts(
                Translation::from(new_com.coords - new_rot * local_com.coords),
                new_rot,
            );
        }
    }

    fn inv_masses(&self) -> (Real, Real) {
        match self {
            PositionConstraintBody::Dynamic { im, ii, .. } => (*im, *ii),
            PositionConstraintBody::Ground { .. } => (0.0, 0.0),
        }
    }
}

// A contact point expressed in the local frames of both bodies, so the
// remaining depth can be re-evaluated as the correction progresses.
#[derive(Copy, Clone, Debug)]
struct PositionConstraintPoint {
    local_p1: Point<Real>,
    local_p2: Point<Real>,
    depth0: Real,
}

/// A contact position constraint.
#[derive(Clone, Debug)]
pub(crate) struct PositionConstraint {
    body1: PositionConstraintBody,
    body2: PositionConstraintBody,
    // The contact normal in the first body's local frame.
    local_n1: Vector<Real>,
    points: ArrayVec<PositionConstraintPoint, MAX_MANIFOLD_POINTS>,
}

impl PositionConstraint {
    pub fn generate(
        pair: &ContactPair,
        bodies: &RigidBodySet,
        out_constraints: &mut Vec<PositionConstraint>,
    ) {
        let rb1 = &bodies[pair.body1];
        let rb2 = &bodies[pair.body2];

        let body = |rb: &crate::dynamics::RigidBody| {
            if rb.is_dynamic() {
                PositionConstraintBody::Dynamic {
                    mj_lambda: rb.active_set_offset,
                    im: rb.effective_inv_mass,
                    ii: rb.effective_inv_inertia,
                    local_com: rb.mass_properties.local_com,
                }
            } else {
                PositionConstraintBody::Ground {
                    position: *rb.position(),
                }
            }
        };

        let mut constraint = PositionConstraint {
            body1: body(rb1),
            body2: body(rb2),
            local_n1: rb1.position().inverse_transform_vector(&pair.manifold.normal),
            points: ArrayVec::new(),
        };

        for point in &pair.manifold.points {
            constraint.points.push(PositionConstraintPoint {
                local_p1: rb1.position().inverse_transform_point(&point.point),
                local_p2: rb2.position().inverse_transform_point(&point.point),
                depth0: point.depth,
            });
        }

        out_constraints.push(constraint);
    }

    /// One correction iteration. Returns `true` when every point of this
    /// constraint is within the convergence tolerance.
    pub fn solve(&self, params: &IntegrationParameters, positions: &mut [Isometry<Real>]) -> bool {
        let mut converged = true;

        for point in &self.points {
            let pos1 = self.body1.position(positions);
            let pos2 = self.body2.position(positions);

            let n = pos1 * self.local_n1;
            let p1 = pos1 * point.local_p1;
            let p2 = pos2 * point.local_p2;

            // The anchors coincided at generation time with depth `depth0`;
            // relative motion along the normal since then changes the depth.
            let depth = point.depth0 + n.dot(&(p1 - p2));

            if depth > params.allowed_linear_error * 3.0 {
                converged = false;
            }

            let correction = (params.baumgarte * (depth - params.allowed_linear_error))
                .max(0.0)
                .min(params.max_linear_correction);
            if correction == 0.0 {
                continue;
            }

            let (im1, ii1) = self.body1.inv_masses();
            let (im2, ii2) = self.body2.inv_masses();
            let com1 = match &self.body1 {
                PositionConstraintBody::Dynamic { local_com, .. } => pos1 * *local_com,
                PositionConstraintBody::Ground { position } => {
                    Point::from(position.translation.vector)
                }
            };
            let com2 = match &self.body2 {
                PositionConstraintBody::Dynamic { local_com, .. } => pos2 * *local_com,
                PositionConstraintBody::Ground { position } => {
                    Point::from(position.translation.vector)
                }
            };

            let dp1 = p1 - com1;
            let dp2 = p2 - com2;
            let gcross1 = dp1.gcross(n);
            let gcross2 = dp2.gcross(n);
            let k = im1 + im2 + ii1 * gcross1 * gcross1 + ii2 * gcross2 * gcross2;
            if k <= 0.0 {
                continue;
            }

            let impulse = n * (correction / k);
            self.body1.apply_impulse(positions, &-impulse, &dp1);
            self.body2.apply_impulse(positions, &impulse, &dp2);
        }

        converged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{RigidBodyBuilder, RigidBodySet};
    use crate::geometry::{ColliderBuilder, ColliderPair, ColliderSet, ContactPair as Pair};
    use crate::geometry::{ContactId, ManifoldPoint, Polygon, Shape};

    #[test]
    fn correction_pushes_the_dynamic_body_out() {
        let params = IntegrationParameters::default();
        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();

        let ground = bodies.insert(RigidBodyBuilder::new_static().build());
        let cube = bodies.insert(
            RigidBodyBuilder::new_dynamic().translation(0.0, 0.9).build(),
        );
        let ground_collider = colliders.insert(
            ColliderBuilder::new(Shape::Polygon(Polygon::rectangle(10.0, 0.5))).build(),
            ground,
            &mut bodies,
        );
        let cube_collider = colliders.insert(
            ColliderBuilder::new(Shape::Polygon(Polygon::rectangle(0.5, 0.5))).build(),
            cube,
            &mut bodies,
        );

        // Sunk by 0.1 into the ground.
        let mut pair = Pair::new(
            ColliderPair::new(ground_collider, cube_collider),
            ground,
            cube,
        );
        pair.manifold.normal = Vector::new(0.0, 1.0);
        pair.manifold.points.push(ManifoldPoint {
            id: ContactId {
                reference_edge: 0,
                incident_edge: 0,
                feature: ContactId::FEATURE_INCIDENT_A,
                flipped: false,
            },
            point: Point::new(0.0, 0.45),
            depth: 0.1,
            data: Default::default(),
        });

        // Pretend the cube is alone in its island at offset 0.
        bodies.get_mut_internal(cube).unwrap().active_set_offset = 0;

        let mut constraints = Vec::new();
        PositionConstraint::generate(&pair, &bodies, &mut constraints);

        let mut positions = vec![*bodies[cube].position()];
        for _ in 0..20 {
            if constraints[0].solve(&params, &mut positions) {
                break;
            }
        }

        // The cube ends up lifted, with the residual depth within tolerance.
        let lifted = positions[0].translation.vector.y - 0.9;
        assert!(lifted > 0.0);
        assert!(0.1 - lifted <= params.allowed_linear_error * 3.0 + 1.0e-4);
    }
}
