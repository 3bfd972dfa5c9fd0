//! A joint holding two anchor points at a fixed distance.

use crate::dynamics::joint::{
    apply_pos_impulse, apply_vel_impulse, body_pose, body_vel, world_com, Joint,
};
use crate::dynamics::solver::SolverVel;
use crate::dynamics::{IntegrationParameters, RigidBodyHandle, RigidBodySet};
use crate::math::{Isometry, Point, Real, Vector};
use crate::utils::WCross;

/// A joint constraining the distance between one anchor point on each body
/// to a fixed rest length.
pub struct DistanceJoint {
    bodies: [RigidBodyHandle; 2],
    local_anchor1: Point<Real>,
    local_anchor2: Point<Real>,
    rest_length: Real,
    collision_allowed: bool,
    impulse: Real,
    // Solve-time cache.
    u: Vector<Real>,
    r1: Vector<Real>,
    r2: Vector<Real>,
    mass: Real,
}

impl DistanceJoint {
    /// Creates a distance joint from the body-local anchor points and the
    /// rest length.
    pub fn new(
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        local_anchor1: Point<Real>,
        local_anchor2: Point<Real>,
        rest_length: Real,
    ) -> Self {
        assert!(rest_length >= 0.0, "The rest length must be non-negative.");
        Self {
            bodies: [body1, body2],
            local_anchor1,
            local_anchor2,
            rest_length,
            collision_allowed: false,
            impulse: 0.0,
            u: Vector::new(1.0, 0.0),
            r1: Vector::zeros(),
            r2: Vector::zeros(),
            mass: 0.0,
        }
    }

    /// Allows or forbids collision between the two linked bodies.
    pub fn set_collision_allowed(&mut self, allowed: bool) {
        self.collision_allowed = allowed;
    }

    /// The rest length of this joint.
    pub fn rest_length(&self) -> Real {
        self.rest_length
    }
}

impl Joint for DistanceJoint {
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

        let p1 = rb1.position() * self.local_anchor1;
        let p2 = rb2.position() * self.local_anchor2;
        self.r1 = p1 - rb1.world_com();
        self.r2 = p2 - rb2.world_com();

        let d = p2 - p1;
        let length = d.norm();
        if length > 1.0e-6 {
            self.u = d / length;
        }

        let cr1 = self.r1.gcross(self.u);
        let cr2 = self.r2.gcross(self.u);
        let k = rb1.effective_inv_mass()
            + rb2.effective_inv_mass()
            + rb1.effective_inv_inertia() * cr1 * cr1
            + rb2.effective_inv_inertia() * cr2 * cr2;
        self.mass = if k > 0.0 { 1.0 / k } else { 0.0 };

        // Warm start from the previous step's impulse.
        let impulse = self.u * self.impulse;
        apply_vel_impulse(rb1, vels, &-impulse, &self.r1);
        apply_vel_impulse(rb2, vels, &impulse, &self.r2);
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
        let u1 = v1.linear + v1.angular.gcross(self.r1);
        let u2 = v2.linear + v2.angular.gcross(self.r2);

        let cdot = self.u.dot(&(u2 - u1));
        let delta = -self.mass * cdot;
        self.impulse += delta;

        let impulse = self.u * delta;
        apply_vel_impulse(rb1, vels, &-impulse, &self.r1);
        apply_vel_impulse(rb2, vels, &impulse, &self.r2);
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
        let d = p2 - p1;
        let length = d.norm();
        if length < 1.0e-6 {
            return true;
        }
        let u = d / length;

        let error = length - self.rest_length;
        let correction = error
            .max(-params.max_linear_correction)
            .min(params.max_linear_correction);

        let r1 = p1 - world_com(rb1, &pos1);
        let r2 = p2 - world_com(rb2, &pos2);
        let cr1 = r1.gcross(u);
        let cr2 = r2.gcross(u);
        let k = rb1.effective_inv_mass()
            + rb2.effective_inv_mass()
            + rb1.effective_inv_inertia() * cr1 * cr1
            + rb2.effective_inv_inertia() * cr2 * cr2;
        if k > 0.0 {
            let impulse = u * (-correction / k);
            apply_pos_impulse(rb1, positions, &-impulse, &r1);
            apply_pos_impulse(rb2, positions, &impulse, &r2);
        }

        error.abs() < params.allowed_linear_error
    }

    fn reaction_force(&self, inv_dt: Real) -> Vector<Real> {
        self.u * (self.impulse * inv_dt)
    }

    fn reaction_torque(&self, _inv_dt: Real) -> Real {
        0.0
    }

    fn shift(&mut self, _shift: &Vector<Real>) {
        // Anchors are body-local: nothing to translate.
    }
}
