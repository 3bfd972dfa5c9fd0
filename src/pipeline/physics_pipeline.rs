//! The physics pipeline, responsible for stepping the whole simulation.

use crate::dynamics::{
    time_of_impact, CcdSolver, IntegrationParameters, IslandSolver, JointHandle, JointSet,
    RigidBodySet,
};
use crate::geometry::{
    ColliderHandle, ColliderPair, ColliderSet, ContactPair, Gjk, NarrowPhase, Ray, RaycastHit,
    Shape,
};
use crate::math::{Isometry, Real, Rotation, Translation, Vector};
use crate::pipeline::{EventHandler, PhysicsHooks};

/// The physics pipeline, running one full timestep of the simulation:
/// narrow-phase collision detection on the broad-phase candidates, island
/// extraction, per-island constraint solving, continuous collision
/// detection for bullet bodies, and event dispatch.
///
/// This structure only contains workspace buffers, so it can be dropped and
/// replaced by a fresh copy at any time; reusing one instance avoids
/// reallocating them every step.
pub struct PhysicsPipeline {
    island_solver: IslandSolver,
    ccd_solver: CcdSolver,
    manifold_indices: Vec<Vec<usize>>,
    joint_indices: Vec<Vec<JointHandle>>,
}

impl Default for PhysicsPipeline {
    fn default() -> Self {
        PhysicsPipeline::new()
    }
}

#[allow(dead_code)]
fn check_pipeline_send_sync() {
    fn do_test<T: Sync>() {}
    do_test::<PhysicsPipeline>();
}

impl PhysicsPipeline {
    /// Initializes a new physics pipeline.
    pub fn new() -> Self {
        Self {
            island_solver: IslandSolver::new(),
            ccd_solver: CcdSolver::new(),
            manifold_indices: Vec::new(),
            joint_indices: Vec::new(),
        }
    }

    /// Advances the simulation by one timestep.
    ///
    /// `broad_phase_pairs` is the set of collider pairs whose bounds
    /// currently overlap, as reported by the external broad-phase. The step
    /// is atomic: events are dispatched to `events` only once the solver
    /// has finished mutating the world.
    pub fn step(
        &mut self,
        gravity: &Vector<Real>,
        params: &IntegrationParameters,
        broad_phase_pairs: &[ColliderPair],
        bodies: &mut RigidBodySet,
        colliders: &mut ColliderSet,
        joints: &mut JointSet,
        narrow_phase: &mut NarrowPhase,
        hooks: &dyn PhysicsHooks,
        events: &dyn EventHandler,
    ) {
        params.validate();

        // Apply the changes made by user code since the previous step.
        bodies.handle_user_changes(colliders);

        // Collision detection at the start-of-step poses.
        narrow_phase.register_pairs(broad_phase_pairs, colliders);
        narrow_phase.compute_contacts(params, bodies, colliders, joints, hooks);

        // Partition the awake bodies into islands.
        bodies.update_active_set_with_contacts(narrow_phase, joints, params);
        let num_islands = bodies.num_islands();

        // Distribute the solvable contact pairs and joints to their
        // islands.
        self.manifold_indices.clear();
        self.manifold_indices
            .resize_with(num_islands, Vec::new);
        self.joint_indices.clear();
        self.joint_indices.resize_with(num_islands, Vec::new);

        let mut island_pairs: Vec<&mut ContactPair> = narrow_phase
            .contact_pairs_mut()
            .filter(|pair| pair.solves_impulses())
            .collect();

        for (i, pair) in island_pairs.iter().enumerate() {
            if let Some(island_id) = island_of_pair(bodies, pair) {
                self.manifold_indices[island_id].push(i);
            }
        }
        for (handle, joint) in joints.iter() {
            let island = joint.bodies().iter().find_map(|b| {
                let rb = bodies.get(*b)?;
                if rb.is_dynamic() && !rb.is_sleeping() {
                    Some(rb.active_island_id)
                } else {
                    None
                }
            });
            if let Some(island_id) = island {
                self.joint_indices[island_id].push(handle);
            }
        }

        // Solve every island independently.
        for island_id in 0..num_islands {
            self.island_solver.solve_island(
                island_id,
                params,
                gravity,
                bodies,
                &mut island_pairs,
                &self.manifold_indices[island_id],
                joints,
                &self.joint_indices[island_id],
            );
        }
        drop(island_pairs);

        // Kinematic bodies follow their prescribed velocities.
        integrate_kinematic_bodies(params, bodies);

        // The solver moved bodies around: refresh the collider poses.
        update_moved_collider_positions(bodies, colliders);

        // Time-of-impact resolution for fast-moving bodies.
        self.ccd_solver
            .solve(params, bodies, colliders, joints, hooks);

        // Dispatch the buffered events now that every borrow is released.
        narrow_phase.flush_events(events);
    }

    /// Finds the closest hit of a ray on the colliders of the set.
    pub fn cast_ray(
        &self,
        colliders: &ColliderSet,
        ray: &Ray,
        max_len: Real,
    ) -> Option<(ColliderHandle, RaycastHit)> {
        self.cast_ray_all(colliders, ray, max_len).into_iter().next()
    }

    /// Finds every hit of a ray on the colliders of the set, sorted by
    /// increasing distance.
    pub fn cast_ray_all(
        &self,
        colliders: &ColliderSet,
        ray: &Ray,
        max_len: Real,
    ) -> Vec<(ColliderHandle, RaycastHit)> {
        let gjk = Gjk::default();
        let mut hits: Vec<(ColliderHandle, RaycastHit)> = colliders
            .iter()
            .filter_map(|(handle, collider)| {
                let hit = gjk.raycast(ray, max_len, collider.shape(), collider.position())?;
                Some((handle, hit))
            })
            .collect();
        hits.sort_by(|a, b| {
            a.1.distance
                .partial_cmp(&b.1.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits
    }

    /// Finds the earliest impact of a convex shape swept from `start` by
    /// the displacement `(dp, dangle)` against the colliders of the set.
    ///
    /// Returns the hit collider and the impact time in `[0, 1]` along the
    /// sweep.
    pub fn cast_shape(
        &self,
        params: &IntegrationParameters,
        colliders: &ColliderSet,
        shape: &Shape,
        start: &Isometry<Real>,
        dp: &Vector<Real>,
        dangle: Real,
    ) -> Option<(ColliderHandle, Real)> {
        let gjk = Gjk::new(params.gjk_max_iterations, params.gjk_distance_epsilon);
        let mut best: Option<(ColliderHandle, Real)> = None;

        for (handle, collider) in colliders.iter() {
            let toi = time_of_impact(
                &gjk,
                shape,
                start,
                dp,
                dangle,
                collider.shape(),
                collider.position(),
                &Vector::zeros(),
                0.0,
                params.ccd_max_iterations,
                params.ccd_distance_epsilon,
            );
            if let Some(toi) = toi {
                if best.map(|b| toi < b.1).unwrap_or(true) {
                    best = Some((handle, toi));
                }
            }
        }

        best
    }
}

/// Translates the whole world by the given shift: every body, collider,
/// joint and cached contact. Velocities, impulses and normals are
/// unchanged.
pub fn shift_world(
    shift: &Vector<Real>,
    bodies: &mut RigidBodySet,
    colliders: &mut ColliderSet,
    joints: &mut JointSet,
    narrow_phase: &mut NarrowPhase,
) {
    bodies.shift(shift);
    colliders.shift(shift);
    joints.shift(shift);
    narrow_phase.shift(shift);
}

fn island_of_pair(bodies: &RigidBodySet, pair: &ContactPair) -> Option<usize> {
    for body in &[pair.body1, pair.body2] {
        if let Some(rb) = bodies.get(*body) {
            if rb.is_dynamic() && !rb.is_sleeping() {
                return Some(rb.active_island_id);
            }
        }
    }
    None
}

fn integrate_kinematic_bodies(params: &IntegrationParameters, bodies: &mut RigidBodySet) {
    let handles: Vec<_> = bodies.iter_active_kinematic().map(|(h, _)| h).collect();
    for handle in handles {
        if let Some(rb) = bodies.get_mut_internal(handle) {
            if !rb.is_moving() {
                continue;
            }
            rb.prev_position = rb.position;
            let dp = *rb.linvel() * params.dt;
            let dangle = rb.angvel() * params.dt;
            rb.position = Isometry::from_parts(
                Translation::from(rb.position.translation.vector + dp),
                Rotation::new(dangle) * rb.position.rotation,
            );
            rb.update_world_mass_properties();
        }
    }
}

fn update_moved_collider_positions(bodies: &mut RigidBodySet, colliders: &mut ColliderSet) {
    let dynamic: Vec<_> = bodies.iter_active_dynamic().map(|(h, _)| h).collect();
    let kinematic: Vec<_> = bodies.iter_active_kinematic().map(|(h, _)| h).collect();
    for handle in dynamic.into_iter().chain(kinematic) {
        if let Some(rb) = bodies.get_mut_internal(handle) {
            rb.update_world_mass_properties();
            rb.update_colliders_positions(colliders);
        }
    }
}
