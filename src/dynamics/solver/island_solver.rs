//! The per-island constraint solver.

use crate::dynamics::solver::{AnyVelocityConstraint, PositionConstraint, SolverVel, VelocityConstraint};
use crate::dynamics::{IntegrationParameters, JointHandle, JointSet, RigidBodySet};
use crate::geometry::ContactPair;
use crate::math::{Isometry, Real, Rotation, Translation, Vector};

/// Solves the constraints of one island: velocity integration, contact and
/// joint impulses, position integration, and position correction, in that
/// order.
pub(crate) struct IslandSolver {
    contact_constraints: Vec<AnyVelocityConstraint>,
    position_constraints: Vec<PositionConstraint>,
    solver_vels: Vec<SolverVel>,
    solver_positions: Vec<Isometry<Real>>,
}

impl IslandSolver {
    pub fn new() -> Self {
        Self {
            contact_constraints: Vec::new(),
            position_constraints: Vec::new(),
            solver_vels: Vec::new(),
            solver_positions: Vec::new(),
        }
    }

    pub fn solve_island(
        &mut self,
        island_id: usize,
        params: &IntegrationParameters,
        gravity: &Vector<Real>,
        bodies: &mut RigidBodySet,
        pairs: &mut [&mut ContactPair],
        island_pairs: &[usize],
        joints: &mut JointSet,
        island_joints: &[JointHandle],
    ) {
        let num_bodies = bodies.active_island(island_id).len();
        self.solver_vels.clear();
        self.solver_vels.resize(num_bodies, SolverVel::zero());
        self.solver_positions.clear();
        self.solver_positions
            .resize(num_bodies, Isometry::identity());

        // 1. Integrate the external forces into the working velocities.
        let solver_vels = &mut self.solver_vels;
        let solver_positions = &mut self.solver_positions;
        bodies.foreach_active_island_body_mut_internal(island_id, |_, rb| {
            rb.integrate_forces(params.dt, gravity);
            rb.prev_position = rb.position;
            solver_vels[rb.active_set_offset] = SolverVel {
                linear: rb.linvel,
                angular: rb.angvel,
            };
            solver_positions[rb.active_set_offset] = rb.position;
        });

        // 2. Initialize the contact and joint constraints, then warm start
        // from the impulses left by the previous step.
        self.contact_constraints.clear();
        self.position_constraints.clear();
        for &id in island_pairs {
            let pair = &mut *pairs[id];
            pair.constraint_index = self.contact_constraints.len();
            VelocityConstraint::generate(
                id,
                pair,
                bodies,
                &self.solver_vels,
                &mut self.contact_constraints,
            );
            PositionConstraint::generate(pair, bodies, &mut self.position_constraints);
        }

        for handle in island_joints {
            if let Some(joint) = joints.get_mut(*handle) {
                joint.initialize_constraints(params, bodies, &mut self.solver_vels);
            }
        }
        for constraint in &self.contact_constraints {
            constraint.warmstart(&mut self.solver_vels);
        }

        // 3. Velocity iterations: joints, then contact friction and normal
        // impulses.
        for _ in 0..params.max_velocity_iterations {
            for handle in island_joints {
                if let Some(joint) = joints.get_mut(*handle) {
                    joint.solve_velocity_constraints(params, bodies, &mut self.solver_vels);
                }
            }
            for constraint in &mut self.contact_constraints {
                constraint.solve(&mut self.solver_vels);
            }
        }

        // Keep the end-of-step impulses on the manifold points: they are
        // the warm-start values of the next step.
        for constraint in &self.contact_constraints {
            constraint.writeback_impulses(pairs);
        }

        // 4. Integrate the positions, clamping per-step displacement.
        let solver_vels = &self.solver_vels;
        let solver_positions = &mut self.solver_positions;
        bodies.foreach_active_island_body_mut_internal(island_id, |_, rb| {
            let vels = solver_vels[rb.active_set_offset];
            rb.linvel = vels.linear;
            rb.angvel = vels.angular;

            let mut dp = rb.linvel * params.dt;
            let norm = dp.norm();
            if norm > params.max_translation {
                dp *= params.max_translation / norm;
            }
            let dangle = (rb.angvel * params.dt)
                .max(-params.max_rotation)
                .min(params.max_rotation);

            let position = Isometry::from_parts(
                Translation::from(rb.position.translation.vector + dp),
                Rotation::new(dangle) * rb.position.rotation,
            );
            solver_positions[rb.active_set_offset] = position;
        });

        // 5. Position iterations: remove the residual overlap and joint
        // drift, stopping early once everything converged.
        for _ in 0..params.max_position_iterations {
            let mut converged = true;
            for constraint in &self.position_constraints {
                converged = constraint.solve(params, &mut self.solver_positions) && converged;
            }
            for handle in island_joints {
                if let Some(joint) = joints.get_mut(*handle) {
                    converged = joint.solve_position_constraints(
                        params,
                        bodies,
                        &mut self.solver_positions,
                    ) && converged;
                }
            }
            if converged {
                break;
            }
        }

        // 6. Write the corrected positions back and update the sleep
        // bookkeeping.
        let solver_positions = &self.solver_positions;
        bodies.foreach_active_island_body_mut_internal(island_id, |_, rb| {
            rb.position = solver_positions[rb.active_set_offset];
            rb.update_idle_time(
                params.dt,
                params.sleep_linear_velocity,
                params.sleep_angular_velocity,
            );
            rb.clear_forces();
        });
    }
}
