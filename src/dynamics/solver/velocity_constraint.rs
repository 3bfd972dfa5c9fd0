//! Contact velocity constraints between two dynamic bodies.

use crate::dynamics::solver::{SolverVel, VelocityGroundConstraint};
use crate::dynamics::RigidBodySet;
use crate::geometry::ContactPair;
use crate::math::{Real, Vector, MAX_MANIFOLD_POINTS};
use crate::utils::{WBasis, WCross};
use arrayvec::ArrayVec;

/// A contact velocity constraint, in its two-dynamic-bodies or
/// one-dynamic-body flavor.
#[derive(Clone, Debug)]
pub(crate) enum AnyVelocityConstraint {
    Nongrouped(VelocityConstraint),
    NongroupedGround(VelocityGroundConstraint),
}

impl AnyVelocityConstraint {
    pub fn warmstart(&self, solver_vels: &mut [SolverVel]) {
        match self {
            AnyVelocityConstraint::Nongrouped(c) => c.warmstart(solver_vels),
            AnyVelocityConstraint::NongroupedGround(c) => c.warmstart(solver_vels),
        }
    }

    pub fn solve(&mut self, solver_vels: &mut [SolverVel]) {
        match self {
            AnyVelocityConstraint::Nongrouped(c) => c.solve(solver_vels),
            AnyVelocityConstraint::NongroupedGround(c) => c.solve(solver_vels),
        }
    }

    pub fn writeback_impulses(&self, pairs: &mut [&mut ContactPair]) {
        match self {
            AnyVelocityConstraint::Nongrouped(c) => c.writeback_impulses(pairs),
            AnyVelocityConstraint::NongroupedGround(c) => c.writeback_impulses(pairs),
        }
    }
}

/// One contact point of a velocity constraint.
#[derive(Copy, Clone, Debug)]
pub(crate) struct VelocityConstraintElement {
    // Contact point relative to each body's center of mass, in world space.
    pub dp1: Vector<Real>,
    pub dp2: Vector<Real>,
    pub normal_mass: Real,
    pub tangent_mass: Real,
    // The target separating velocity: positive when restitution applies.
    pub rhs: Real,
    pub normal_impulse: Real,
    pub tangent_impulse: Real,
}

/// A contact velocity constraint between two dynamic bodies.
#[derive(Clone, Debug)]
pub(crate) struct VelocityConstraint {
    // Non-penetration direction, pointing from the first body towards the
    // second: impulses push the second body along `normal`.
    pub normal: Vector<Real>,
    pub tangent: Vector<Real>,
    pub im1: Real,
    pub im2: Real,
    pub ii1: Real,
    pub ii2: Real,
    // The friction coefficient bounding the tangent impulses.
    pub limit: Real,
    pub mj_lambda1: usize,
    pub mj_lambda2: usize,
    pub manifold_id: usize,
    pub elements: ArrayVec<VelocityConstraintElement, MAX_MANIFOLD_POINTS>,
}

impl VelocityConstraint {
    pub fn generate(
        manifold_id: usize,
        pair: &ContactPair,
        bodies: &RigidBodySet,
        solver_vels: &[SolverVel],
        out_constraints: &mut Vec<AnyVelocityConstraint>,
    ) {
        let rb1 = &bodies[pair.body1];
        let rb2 = &bodies[pair.body2];

        if !rb1.is_dynamic() || !rb2.is_dynamic() {
            VelocityGroundConstraint::generate(
                manifold_id,
                pair,
                bodies,
                solver_vels,
                out_constraints,
            );
            return;
        }

        let normal = pair.manifold.normal;
        let tangent = normal.orthonormal_basis()[0];
        let mj_lambda1 = rb1.active_set_offset;
        let mj_lambda2 = rb2.active_set_offset;

        let mut constraint = VelocityConstraint {
            normal,
            tangent,
            im1: rb1.effective_inv_mass,
            im2: rb2.effective_inv_mass,
            ii1: rb1.effective_inv_inertia,
            ii2: rb2.effective_inv_inertia,
            limit: pair.friction,
            mj_lambda1,
            mj_lambda2,
            manifold_id,
            elements: ArrayVec::new(),
        };

        let vel1 = &solver_vels[mj_lambda1];
        let vel2 = &solver_vels[mj_lambda2];

        for point in &pair.manifold.points {
            let dp1 = point.point - rb1.world_com;
            let dp2 = point.point - rb2.world_com;

            let normal_mass = effective_mass(
                constraint.im1,
                constraint.im2,
                constraint.ii1,
                constraint.ii2,
                &dp1,
                &dp2,
                &normal,
            );
            let tangent_mass = effective_mass(
                constraint.im1,
                constraint.im2,
                constraint.ii1,
                constraint.ii2,
                &dp1,
                &dp2,
                &tangent,
            );

            // Restitution applies only above the velocity threshold.
            let u1 = vel1.linear + vel1.angular.gcross(dp1);
            let u2 = vel2.linear + vel2.angular.gcross(dp2);
            let closing = -(u2 - u1).dot(&normal);
            let rhs = if closing > pair.restitution_velocity {
                pair.restitution * closing
            } else {
                0.0
            };

            constraint.elements.push(VelocityConstraintElement {
                dp1,
                dp2,
                normal_mass,
                tangent_mass,
                rhs,
                normal_impulse: point.data.impulse,
                tangent_impulse: point.data.tangent_impulse,
            });
        }

        out_constraints.push(AnyVelocityConstraint::Nongrouped(constraint));
    }

    pub fn warmstart(&self, solver_vels: &mut [SolverVel]) {
        let mut vel1 = solver_vels[self.mj_lambda1];
        let mut vel2 = solver_vels[self.mj_lambda2];

        for element in &self.elements {
            let impulse =
                self.normal * element.normal_impulse + self.tangent * element.tangent_impulse;
            vel1.linear -= impulse * self.im1;
            vel1.angular -= self.ii1 * element.dp1.gcross(impulse);
            vel2.linear += impulse * self.im2;
            vel2.angular += self.ii2 * element.dp2.gcross(impulse);
        }

        solver_vels[self.mj_lambda1] = vel1;
        solver_vels[self.mj_lambda2] = vel2;
    }

    pub fn solve(&mut self, solver_vels: &mut [SolverVel]) {
        let mut vel1 = solver_vels[self.mj_lambda1];
        let mut vel2 = solver_vels[self.mj_lambda2];

        // Friction, bounded by the accumulated normal impulses.
        for element in &mut self.elements {
            let u1 = vel1.linear + vel1.angular.gcross(element.dp1);
            let u2 = vel2.linear + vel2.angular.gcross(element.dp2);
            let vt = (u2 - u1).dot(&self.tangent);

            let max_impulse = self.limit * element.normal_impulse;
            let new_impulse = (element.tangent_impulse - element.tangent_mass * vt)
                .max(-max_impulse)
                .min(max_impulse);
            let delta = new_impulse - element.tangent_impulse;
            element.tangent_impulse = new_impulse;

            let impulse = self.tangent * delta;
            vel1.linear -= impulse * self.im1;
            vel1.angular -= self.ii1 * element.dp1.gcross(impulse);
            vel2.linear += impulse * self.im2;
            vel2.angular += self.ii2 * element.dp2.gcross(impulse);
        }

        // Non-penetration, with the accumulated impulse clamped to remain
        // non-negative.
        for element in &mut self.elements {
            let u1 = vel1.linear + vel1.angular.gcross(element.dp1);
            let u2 = vel2.linear + vel2.angular.gcross(element.dp2);
            let vn = (u2 - u1).dot(&self.normal);

            let new_impulse =
                (element.normal_impulse - element.normal_mass * (vn - element.rhs)).max(0.0);
            let delta = new_impulse - element.normal_impulse;
            element.normal_impulse = new_impulse;

            let impulse = self.normal * delta;
            vel1.linear -= impulse * self.im1;
            vel1.angular -= self.ii1 * element.dp1.gcross(impulse);
            vel2.linear += impulse * self.im2;
            vel2.angular += self.ii2 * element.dp2.gcross(impulse);
        }

        solver_vels[self.mj_lambda1] = vel1;
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

#[inline]
pub(crate) fn effective_mass(
    im1: Real,
    im2: Real,
    ii1: Real,
    ii2: Real,
    dp1: &Vector<Real>,
    dp2: &Vector<Real>,
    dir: &Vector<Real>,
) -> Real {
    let gcross1 = dp1.gcross(*dir);
    let gcross2 = dp2.gcross(*dir);
    let k = im1 + im2 + ii1 * gcross1 * gcross1 + ii2 * gcross2 * gcross2;
    if k > 0.0 {
        1.0 / k
    } else {
        0.0
    }
}
