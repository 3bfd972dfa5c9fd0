//! Joints: user-defined articulation constraints between bodies.

pub use self::distance_joint::DistanceJoint;
pub use self::joint_set::{JointHandle, JointSet};
pub use self::revolute_joint::RevoluteJoint;

use crate::dynamics::solver::SolverVel;
use crate::dynamics::{IntegrationParameters, RigidBody, RigidBodyHandle, RigidBodySet};
use crate::math::{Isometry, Point, Real, Rotation, Translation, Vector};
use crate::utils::WCross;

mod distance_joint;
mod joint_set;
mod revolute_joint;

/// A constraint over one or more bodies, solved together with the contact
/// constraints of its island.
///
/// During the velocity iterations, a joint reads and writes the island's
/// working velocities (`vels`, indexed by each dynamic body's island
/// offset); during the position iterations it corrects the island's working
/// positions the same way. Non-dynamic bodies are not part of the buffers:
/// their velocity and pose are read from the bodies directly and never
/// written.
pub trait Joint: Send + Sync {
    /// The handles of the bodies constrained by this joint.
    fn bodies(&self) -> &[RigidBodyHandle];

    /// May the bodies connected by this joint collide with each other?
    ///
    /// Collision between two joined bodies is enabled if at least one of
    /// the joints connecting them allows it.
    fn is_collision_allowed(&self) -> bool;

    /// Prepares the solve: effective masses, anchors, and the warm-start
    /// application of the impulses accumulated during the previous step.
    fn initialize_constraints(
        &mut self,
        params: &IntegrationParameters,
        bodies: &RigidBodySet,
        vels: &mut [SolverVel],
    );

    /// One velocity iteration.
    fn solve_velocity_constraints(
        &mut self,
        params: &IntegrationParameters,
        bodies: &RigidBodySet,
        vels: &mut [SolverVel],
    );

    /// One position iteration. Returns `true` when the positional drift is
    /// within tolerance.
    fn solve_position_constraints(
        &mut self,
        params: &IntegrationParameters,
        bodies: &RigidBodySet,
        positions: &mut [Isometry<Real>],
    ) -> bool;

    /// The force this joint applied to the second body to enforce the
    /// constraint, given the inverse timestep.
    fn reaction_force(&self, inv_dt: Real) -> Vector<Real>;

    /// The torque this joint applied to the second body, given the inverse
    /// timestep.
    fn reaction_torque(&self, inv_dt: Real) -> Real;

    /// Translates every world-space anchor stored by this joint.
    fn shift(&mut self, shift: &Vector<Real>);
}

// The solver-side view of one joint body.
pub(crate) fn body_vel(rb: &RigidBody, vels: &[SolverVel]) -> SolverVel {
    if rb.is_dynamic() {
        vels[rb.active_set_offset]
    } else {
        SolverVel {
            linear: *rb.linvel(),
            angular: rb.angvel(),
        }
    }
}

pub(crate) fn apply_vel_impulse(
    rb: &RigidBody,
    vels: &mut [SolverVel],
    impulse: &Vector<Real>,
    dp: &Vector<Real>,
) {
    if rb.is_dynamic() {
        let vel = &mut vels[rb.active_set_offset];
        vel.linear += impulse * rb.effective_inv_mass;
        vel.angular += rb.effective_inv_inertia * dp.gcross(*impulse);
    }
}

pub(crate) fn body_pose(rb: &RigidBody, positions: &[Isometry<Real>]) -> Isometry<Real> {
    if rb.is_dynamic() {
        positions[rb.active_set_offset]
    } else {
        *rb.position()
    }
}

pub(crate) fn apply_pos_impulse(
    rb: &RigidBody,
    positions: &mut [Isometry<Real>],
    impulse: &Vector<Real>,
    dp: &Vector<Real>,
) {
    if rb.is_dynamic() {
        let pos = &mut positions[rb.active_set_offset];
        let local_com = rb.mass_properties.local_com;
        let com = *pos * local_com;
        let new_com = com + impulse * rb.effective_inv_mass;
        let new_rot =
            Rotation::new(rb.effective_inv_inertia * dp.gcross(*impulse)) * pos.rotation;
        *pos = Isometry::from_parts(
            Translation::from(new_com.coords - new_rot * local_com.coords),
            new_rot,
        );
    }
}

pub(crate) fn world_com(rb: &RigidBody, pose: &Isometry<Real>) -> Point<Real> {
    *pose * rb.mass_properties.local_com
}
