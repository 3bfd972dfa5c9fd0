//! A pin joint forcing two body-local anchor points to coincide.

use crate::dynamics::joint::{
    apply_pos_impulse, apply_vel_impulse, body_pose, body_vel, world_com, Joint,
};
use crate::dynamics::solver::SolverVel;
use crate::dynamics::{IntegrationParameters, RigidBodyHandle, RigidBodySet};
use crate::math::{Isometry, Point, Real, Vector};
use crate::utils::WCross;

/// A revolute joint: the two bodies rotate freely about a common anchor
/// point.
pub struct RevoluteJoint {
    bodies: [RigidBodyHandle; 2],
    local_anchor1: Point<Real>,
    local_anchor2: Point<Real>,
    collision_allowed: bool,
    impulse: Vector<Real>,
    // Solve-time cache.
    r1: Vector<Real>,
    r2: Vector<Real>,
    mass: na::Matrix2<Real>,
}

impl RevoluteJoint {
    /// Creates a revolute joint from a world-space anchor point and the
    /// current body positions.
    pub fn new(
        bodies: &RigidBodySet,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        anchor: Point<Real>,
    ) -> Self {
        let rb1 = bodies.get(body1).expect("Invalid first body handle.");
        let rb2 = bodies.get(body2).expect("Invalid second body handle.");
        Self {
            bodies: [body1, body2],
            local_anchor1: rb1.position().inverse_transform_point(&anchor),
            local_anchor2: rb2.position().inverse_transform_point(&anchor),
            collision_allowed: false,
            impulse: Vector::zeros(),
            r1: Vector::zeros(),
            r2: Vector::zeros(),
            mass: na::Matrix2::zeros(),
        }
    }

    /// Allows or forbids collision between the two linked bodies.
    pub fn set_collision_allowed(&mut self, allowed: bool) {
        self.collision_allowed = allowed;
    }
}

// The effective-mass matrix of a point-to-point constraint.
fn k_matrix(
    im1: Real,
    ii1: Real,
    im2: Real,
    ii2: Real,
    r1: &Vector<Real>,
    r2: &Vector<Real>,
) -> na::Matrix2<Real> {
    na::Matrix2::new(
        im1 + im2 + ii1 * r1.y * r1.y + ii2 * r2.y * r2.y,
        -ii1 * r1.x * r1.y - ii2 * r2.x * r2.y,
        -ii1 * r1.x * r1.y - ii2 * r2.x * r2.y,
        im1 + im2 + ii1 * r1.x * r1.x + ii2 * r2.x * r2.x,
    )
}

impl Joint for RevoluteJoint {
    fn bodies(&self) -> &[RigidBodyHandle] {
        &self.bodies
    }

    fn is_collision_allowed(&self) -> bool {
        self.collision_allowed
    }

    fn initialize_constraints(
        &mut self,
        _params: &IntegrationParameters,
        bodies: &RigidBodySet,
        vels: &mut [SolverVel],
    ) {
        let rb1 = &bodies[self.bodies[0]];
        let rb2 = &bodies[self.bodies[1]];

        self.r1 = rb1.position() * self.local_anchor1 - rb1.world_com();
        self.r2 = rb2.position() * self.local_anchor2 - rb2.world_com();
        self.mass = k_matrix(
            rb1.effective_inv_mass(),
            rb1.effective_inv_inertia(),
            rb2.effective_inv_mass(),
            rb2.effective_inv_inertia(),
            &self.r1,
            &self.r2,
        )
        .try_inverse()
        .unwrap_or_else(na::Matrix2::zeros);

        apply_vel_impulse(rb1, vels, &-self.impulse, &self.r1);
        apply_vel_impulse(rb2, vels, &self.impulse, &self.r2);
    }

    fn solve_velocity_constraints(
        &mut self,
        _params: &IntegrationParameters,
        bodies: &RigidBodySet,
        vels: &mut [SolverVel],
    ) {
        let rb1 = &bodies[self.bodies[0]];
        let rb2 = &bodies[self.bodies[1]];

        let v1 = body_vel(rb1, vels);
        let v2 = body_vel(rb2, vels);
        let cdot = (v2.linear + v2.angular.gcross(self.r2))
            - (v1.linear + v1.angular.gcross(self.r1));

        let delta = self.mass * (-cdot);
        self.impulse += delta;

        apply_vel_impulse(rb1, vels, &-delta, &self.r1);
        apply_vel_impulse(rb2, vels, &delta, &self.r2);
    }

    fn solve_position_constraints(
        &mut self,
        params: &IntegrationParameters,
        bodies: &RigidBodySet,
        positions: &mut [Isometry<Real>],
    ) -> bool {
        let rb1 = &bodies[self.bodies[0]];
        let rb2 = &bodies[self.bodies[1]];

        let pos1 = body_pose(rb1, positions);
        let pos2 = body_pose(rb2, positions);

        let p1 = pos1 * self.local_anchor1;
        let p2 = pos2 * self.local_anchor2;
        let error = p2 - p1;

        let r1 = p1 - world_com(rb1, &pos1);
        let r2 = p2 - world_com(rb2, &pos2);
        let k = k_matrix(
            rb1.effective_inv_mass(),
            rb1.effective_inv_inertia(),
            rb2.effective_inv_mass(),
            rb2.effective_inv_inertia(),
            &r1,
            &r2,
        );

        if let Some(inv) = k.try_inverse() {
            let impulse = inv * (-error);
            apply_pos_impulse(rb1, positions, &-impulse, &r1);
            apply_pos_impulse(rb2, positions, &impulse, &r2);
        }

        error.norm() < params.allowed_linear_error
    }

    fn reaction_force(&self, inv_dt: Real) -> Vector<Real> {
        self.impulse * inv_dt
    }

    fn reaction_torque(&self, _inv_dt: Real) -> Real {
        0.0
    }

    fn shift(&mut self, _shift: &Vector<Real>) {
        // Anchors are body-local: nothing to translate.
    }
}
