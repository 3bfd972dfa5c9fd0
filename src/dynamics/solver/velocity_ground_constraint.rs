//! Contact velocity constraints between a dynamic body and a
//! non-dynamic one.
//!
//! The non-dynamic side contributes its (constant) velocity to the relative
//! motion but receives no impulse, so these constraints only touch one
//! entry of the solver working buffers.

use crate::dynamics::solver::velocity_constraint::effective_mass;
use crate::dynamics::solver::{AnyVelocityConstraint, SolverVel};
use crate::dynamics::RigidBodySet;
use crate::geometry::ContactPair;
use crate::math::{Real, Vector, MAX_MANIFOLD_POINTS};
use crate::utils::{WBasis, WCross};
use arrayvec::ArrayVec;

#[derive(Copy, Clone, Debug)]
pub(crate) struct VelocityGroundConstraintElement {
    // Contact point relative to the ground body's center of mass.
    pub dp1: Vector<Real>,
    // Contact point relative to the dynamic body's center of mass.
    pub dp2: Vector<Real>,
    pub normal_mass: Real,
    pub tangent_mass: Real,
    pub rhs: Real,
    pub normal_impulse: Real,
    pub tangent_impulse: Real,
}

/// A contact velocity constraint where only the second body is dynamic.
#[derive(Clone, Debug)]
pub(crate) struct VelocityGroundConstraint {
    // Points from the ground body towards the dynamic body.
    pub normal: Vector<Real>,
    pub tangent: Vector<Real>,
    pub im2: Real,
    pub ii2: Real,
    // The ground body's velocity, constant during the solve.
    pub ground_linvel: Vector<Real>,
    pub ground_angvel: Real,
    pub limit: Real,
    pub mj_lambda2: usize,
    pub manifold_id: usize,
    pub elements: ArrayVec<VelocityGroundConstraintElement, MAX_MANIFOLD_POINTS>,
}

impl VelocityGroundConstraint {
    pub fn generate(
        manifold_id: usize,
        pair: &ContactPair,
        bodies: &RigidBodySet,
        solver_vels: &[SolverVel],
        out_constraints: &mut Vec<AnyVelocityConstraint>,
    ) {
        let mut rb1 = &bodies[pair.body1];
        let mut rb2 = &bodies[pair.body2];
        let flipped = !rb2.is_dynamic();

        // Make sure the dynamic body is the second one; the normal keeps
        // pointing from the ground body towards it.
        let normal = if flipped {
            std::mem::swap(&mut rb1, &mut rb2);
            -pair.manifold.normal
        } else {
            pair.manifold.normal
        };

        if !rb2.is_dynamic() {
            // Both non-dynamic: nothing to solve.
            return;
        }

        let tangent = normal.orthonormal_basis()[0];
        let mj_lambda2 = rb2.active_set_offset;
        let vel2 = &solver_vels[mj_lambda2];

        let mut constraint = VelocityGroundConstraint {
            normal,
            tangent,
            im2: rb2.effective_inv_mass,
            ii2: rb2.effective_inv_inertia,
            ground_linvel: *rb1.linvel(),
            ground_angvel: rb1.angvel(),
            limit: pair.friction,
            mj_lambda2,
            manifold_id,
            elements: ArrayVec::new(),
        };

        for point in &pair.manifold.points {
            let dp1 = point.point - rb1.world_com;
            let dp2 = point.point - rb2.world_com;

            let normal_mass = effective_mass(
                0.0,
                constraint.im2,
                0.0,
                constraint.ii2,
                &dp1,
                &dp2,
                &normal,
            );
            let tangent_mass = effective_mass(
                0.0,
                constraint.im2,
                0.0,
                constraint.ii2,
                &dp1,
                &dp2,
                &tangent,
            );

            let u1 = constraint.ground_linvel + constraint.ground_angvel.gcross(dp1);
            let u2 = vel2.linear + vel2.angular.gcross(dp2);
            let closing = -(u2 - u1).dot(&normal);
            let rhs = if closing > pair.restitution_velocity {
                pair.restitution * closing
            } else {
                0.0
            };

            constraint.elements.push(VelocityGroundConstraintElement {
                dp1,
                dp2,
                normal_mass,
                tangent_mass,
                rhs,
                normal_impulse: point.data.impulse,
                tangent_impulse: point.data.tangent_impulse,
            });
        }

        out_constraints.push(AnyVelocityConstraint::NongroupedGround(constraint));
    }

    pub fn warmstart(&self, solver_vels: &mut [SolverVel]) {
        let mut vel2 = solver_vels[self.mj_lambda2];

        for element in &self.elements {
            let impulse =
                self.normal * element.normal_impulse + self.tangent * element.tangent_impulse;
            vel2.linear += impulse * self.im2;
            vel2.angular += self.ii2 * element.dp2.gcross(impulse);
        }

        solver_vels[self.mj_lambda2] = vel2;
    }

    pub fn solve(&mut self, solver_vels: &mut [SolverVel]) {
        let mut vel2 = solver_vels[self.mj_lambda2];

        for element in &mut self.elements {
            let u1 = self.ground_linvel + self.ground_angvel.gcross(element.dp1);
            let u2 = vel2.linear + vel2.angular.gcross(element.dp2);
            let vt = (u2 - u1).dot(&self.tangent);

            let max_impulse = self.limit * element.normal_impulse;
            let new_impulse = (element.tangent_impulse - element.tangent_mass * vt)
                .max(-max_impulse)
                .min(max_impulse);
            let delta = new_impulse - element.tangent_impulse;
            element.tangent_impulse = new_impulse;

            let impulse = self.tangent * delta;
            vel2.linear += impulse * self.im2;
            vel2.angular += self.ii2 * element.dp2.gcross(impulse);
        }

        for element in &mut self.elements {
            let u1 = self.ground_linvel + self.ground_angvel.gcross(element.dp1);
            let u2 = vel2.linear + vel2.angular.gcross(element.dp2);
            let vn = (u2 - u1).dot(&self.normal);

            let new_impulse =
                (element.normal_impulse - element.normal_mass * (vn - element.rhs)).max(0.0);
            let delta = new_impulse - element.normal_impulse;
            element.normal_impulse = new_impulse;

            let impulse = self.normal * delta;
            vel2.linear += impulse * self.im2;
            vel2.angular += self.ii2 * element.dp2.gcross(impulse);
        }

        solver_vels[self.mj_lambda2] = vel2;
    }

    pub fn writeback_impulses(&self, pairs: &mut [&mut ContactPair]) {
        let pair = &mut pairs[self.manifold_id];
        for (element, point) in self.elements.iter().zip(pair.manifold.points.iter_mut()) {
            point.data.impulse = element.normal_impulse;
            point.data.tangent_impulse = element.tangent_impulse;
        }
    }
}
