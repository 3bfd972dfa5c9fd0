//! The set owning every rigid body, and the per-step island extraction.

use crate::data::{Arena, Index};
use crate::dynamics::{IntegrationParameters, JointSet, RigidBody, RigidBodyChanges};
use crate::geometry::{ColliderSet, NarrowPhase};
use crate::math::{Real, Vector};
use crate::utils::select_other;

/// The unique handle of a rigid body added to a [`RigidBodySet`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[repr(transparent)]
pub struct RigidBodyHandle(pub(crate) Index);

impl RigidBodyHandle {
    /// Converts this handle into its (index, generation) components.
    pub fn into_raw_parts(self) -> (usize, u64) {
        self.0.into_raw_parts()
    }

    /// Reconstructs a handle from its (index, generation) components.
    pub fn from_raw_parts(id: usize, generation: u64) -> Self {
        Self(Index::from_raw_parts(id, generation))
    }

    /// An always-invalid rigid-body handle.
    pub fn invalid() -> Self {
        Self(Index::from_raw_parts(crate::INVALID_USIZE, crate::INVALID_U64))
    }
}

/// A pair of rigid body handles.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct BodyPair {
    /// The first rigid body handle.
    pub body1: RigidBodyHandle,
    /// The second rigid body handle.
    pub body2: RigidBodyHandle,
}

impl BodyPair {
    /// Builds a new pair of rigid-body handles.
    pub fn new(body1: RigidBodyHandle, body2: RigidBodyHandle) -> Self {
        BodyPair { body1, body2 }
    }
}

/// A set of rigid bodies that can be handled by the physics pipeline.
///
/// Also owns the per-step partition of the awake dynamic bodies into
/// islands: disjoint groups of bodies connected by contacts or joints,
/// solved independently.
pub struct RigidBodySet {
    pub(crate) bodies: Arena<RigidBody>,
    pub(crate) active_dynamic_set: Vec<RigidBodyHandle>,
    pub(crate) active_kinematic_set: Vec<RigidBodyHandle>,
    // Start offsets of each island inside `active_dynamic_set`, with a
    // trailing sentinel.
    pub(crate) active_islands: Vec<usize>,
    active_set_timestamp: u32,
    modified_bodies: Vec<RigidBodyHandle>,
    can_sleep: Vec<RigidBodyHandle>, // Workspace.
    stack: Vec<RigidBodyHandle>,     // Workspace.
}

impl RigidBodySet {
    /// Creates a new empty set of rigid bodies.
    pub fn new() -> Self {
        RigidBodySet {
            bodies: Arena::new(),
            active_dynamic_set: Vec::new(),
            active_kinematic_set: Vec::new(),
            active_islands: Vec::new(),
            active_set_timestamp: 0,
            modified_bodies: Vec::new(),
            can_sleep: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// The number of rigid bodies in this set.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// `true` if there are no rigid bodies in this set.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Is the given body handle valid?
    pub fn contains(&self, handle: RigidBodyHandle) -> bool {
        self.bodies.contains(handle.0)
    }

    /// Inserts a rigid body into this set and retrieves its handle.
    pub fn insert(&mut self, mut rb: RigidBody) -> RigidBodyHandle {
        // Make sure the internal links are reset: they may not be if this
        // rigid body was obtained by cloning another one.
        rb.reset_internal_references();
        rb.changes = RigidBodyChanges::all();

        let handle = RigidBodyHandle(self.bodies.insert(rb));
        self.modified_bodies.push(handle);

        let rb = &mut self.bodies[handle.0];
        if rb.is_kinematic() {
            rb.active_set_id = self.active_kinematic_set.len();
            self.active_kinematic_set.push(handle);
        } else if rb.is_dynamic() {
            rb.active_set_id = self.active_dynamic_set.len();
            self.active_dynamic_set.push(handle);
        }

        handle
    }

    /// Removes a rigid body, all its colliders, and all its joints from the
    /// sets.
    pub fn remove(
        &mut self,
        handle: RigidBodyHandle,
        colliders: &mut ColliderSet,
        joints: &mut JointSet,
    ) -> Option<RigidBody> {
        let rb = self.bodies.remove(handle.0)?;

        // Update the active sets.
        let mut active_sets = [&mut self.active_kinematic_set, &mut self.active_dynamic_set];
        for active_set in &mut active_sets {
            if active_set.get(rb.active_set_id) == Some(&handle) {
                active_set.swap_remove(rb.active_set_id);

                if let Some(replacement) = active_set.get(rb.active_set_id).copied() {
                    self.bodies[replacement.0].active_set_id = rb.active_set_id;
                }
            }
        }

        // Remove the colliders attached to this rigid body. The narrow
        // phase drops the related contact pairs at its next update.
        for collider in &rb.colliders {
            colliders.colliders.remove(collider.0);
        }

        // Remove the joints attached to this rigid body.
        joints.remove_attached_joints(handle, self);

        Some(rb)
    }

    /// The number of islands extracted during the last step.
    pub(crate) fn num_islands(&self) -> usize {
        self.active_islands.len().saturating_sub(1)
    }

    /// Forces the specified rigid body to wake up if it is dynamic.
    ///
    /// If `strong` is `true` the body is guaranteed to stay awake for
    /// multiple subsequent timesteps.
    pub fn wake_up(&mut self, handle: RigidBodyHandle, strong: bool) {
        if let Some(rb) = self.bodies.get_mut(handle.0) {
            if rb.is_dynamic() {
                rb.wake_up(strong);

                if self.active_dynamic_set.get(rb.active_set_id) != Some(&handle) {
                    rb.active_set_id = self.active_dynamic_set.len();
                    self.active_dynamic_set.push(handle);
                }
            }
        }
    }

    /// Gets the rigid body with the given handle.
    pub fn get(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle.0)
    }

    /// Gets a mutable reference to the rigid body with the given handle.
    pub fn get_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        let result = self.bodies.get_mut(handle.0)?;
        Self::mark_as_modified(handle, result, &mut self.modified_bodies);
        Some(result)
    }

    pub(crate) fn get_mut_internal(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle.0)
    }

    pub(crate) fn get2_mut_internal(
        &mut self,
        h1: RigidBodyHandle,
        h2: RigidBodyHandle,
    ) -> (Option<&mut RigidBody>, Option<&mut RigidBody>) {
        self.bodies.get2_mut(h1.0, h2.0)
    }

    fn mark_as_modified(
        handle: RigidBodyHandle,
        rb: &mut RigidBody,
        modified_bodies: &mut Vec<RigidBodyHandle>,
    ) {
        if !rb.changes.contains(RigidBodyChanges::MODIFIED) {
            rb.changes |= RigidBodyChanges::MODIFIED;
            modified_bodies.push(handle);
        }
    }

    /// Iterates through all the rigid bodies in this set.
    pub fn iter(&self) -> impl Iterator<Item = (RigidBodyHandle, &RigidBody)> {
        self.bodies.iter().map(|(h, b)| (RigidBodyHandle(h), b))
    }

    /// Iterates mutably through all the rigid bodies in this set.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (RigidBodyHandle, &mut RigidBody)> {
        let modified = &mut self.modified_bodies;
        self.bodies.iter_mut().map(move |(h, b)| {
            let handle = RigidBodyHandle(h);
            Self::mark_as_modified(handle, b, modified);
            (handle, b)
        })
    }

    /// Iterates through all the awake dynamic rigid bodies.
    pub fn iter_active_dynamic<'a>(
        &'a self,
    ) -> impl Iterator<Item = (RigidBodyHandle, &'a RigidBody)> {
        let bodies: &'a _ = &self.bodies;
        self.active_dynamic_set
            .iter()
            .filter_map(move |h| Some((*h, bodies.get(h.0)?)))
    }

    /// Iterates through all the active kinematic rigid bodies.
    pub fn iter_active_kinematic<'a>(
        &'a self,
    ) -> impl Iterator<Item = (RigidBodyHandle, &'a RigidBody)> {
        let bodies: &'a _ = &self.bodies;
        self.active_kinematic_set
            .iter()
            .filter_map(move |h| Some((*h, bodies.get(h.0)?)))
    }

    pub(crate) fn active_island_range(&self, island_id: usize) -> std::ops::Range<usize> {
        self.active_islands[island_id]..self.active_islands[island_id + 1]
    }

    pub(crate) fn active_island(&self, island_id: usize) -> &[RigidBodyHandle] {
        &self.active_dynamic_set[self.active_island_range(island_id)]
    }

    #[inline(always)]
    pub(crate) fn foreach_active_island_body_mut_internal(
        &mut self,
        island_id: usize,
        mut f: impl FnMut(RigidBodyHandle, &mut RigidBody),
    ) {
        let island_range = self.active_island_range(island_id);
        for handle in &self.active_dynamic_set[island_range] {
            if let Some(rb) = self.bodies.get_mut(handle.0) {
                f(*handle, rb)
            }
        }
    }

    pub(crate) fn recompute_mass_properties(
        &mut self,
        handle: RigidBodyHandle,
        colliders: &ColliderSet,
    ) {
        if let Some(rb) = self.bodies.get_mut(handle.0) {
            let mut props = rb.base_mass_properties;
            for collider in &rb.colliders {
                if let Some(collider) = colliders.get(*collider) {
                    props = props.sum(&collider.mass_properties());
                }
            }
            rb.mass_properties = props;
            rb.update_world_mass_properties();
        }
    }

    /// Translates every body of this set by the given shift, leaving all
    /// velocities untouched.
    pub fn shift(&mut self, shift: &Vector<Real>) {
        for (_, rb) in self.bodies.iter_mut() {
            rb.position.translation.vector += *shift;
            rb.prev_position.translation.vector += *shift;
            rb.world_com += *shift;
        }
    }

    // Applies the changes made by the user since the last step: body status
    // moves between active sets, explicit position changes update collider
    // positions, woken bodies rejoin the active set.
    pub(crate) fn handle_user_changes(&mut self, colliders: &mut ColliderSet) {
        for handle in std::mem::take(&mut self.modified_bodies) {
            let rb = match self.bodies.get_mut(handle.0) {
                Some(rb) => rb,
                None => continue,
            };

            if rb.changes.contains(RigidBodyChanges::BODY_STATUS) {
                rb.update_world_mass_properties();
            }

            if rb.changes.contains(RigidBodyChanges::POSITION)
                || rb.changes.contains(RigidBodyChanges::COLLIDERS)
            {
                rb.update_world_mass_properties();
                rb.update_colliders_positions(colliders);
            }

            // Push the body to the proper active set if it is awake and not
            // already there.
            if !rb.is_sleeping() {
                if rb.is_dynamic() {
                    if self.active_dynamic_set.get(rb.active_set_id) != Some(&handle) {
                        rb.active_set_id = self.active_dynamic_set.len();
                        self.active_dynamic_set.push(handle);
                    }
                } else if rb.is_kinematic()
                    && self.active_kinematic_set.get(rb.active_set_id) != Some(&handle)
                {
                    rb.active_set_id = self.active_kinematic_set.len();
                    self.active_kinematic_set.push(handle);
                }
            }

            rb.changes = RigidBodyChanges::empty();
        }
    }

    /// Rebuilds the set of awake bodies and partitions it into islands.
    ///
    /// The traversal floods through touching contacts and joints, starting
    /// from the bodies that do not qualify for sleep. Dynamic bodies
    /// reached by the flood are woken atomically with their island; bodies
    /// not reached and idle for longer than the sleep time are put to rest.
    /// Static and kinematic bodies never propagate the flood, so two
    /// islands can only share non-dynamic bodies.
    pub(crate) fn update_active_set_with_contacts(
        &mut self,
        narrow_phase: &NarrowPhase,
        joints: &JointSet,
        params: &IntegrationParameters,
    ) {
        assert!(
            params.min_island_size > 0,
            "The minimum island size must be at least 1."
        );

        self.active_set_timestamp += 1;
        self.stack.clear();
        self.can_sleep.clear();

        // NOTE: the `.rev()` is here so that two successive timesteps
        // preserve the order of the bodies in the `active_dynamic_set` vec.
        for h in self.active_dynamic_set.drain(..).rev() {
            let rb = match self.bodies.get_mut(h.0) {
                Some(rb) => rb,
                None => continue,
            };

            if rb.activation.can_sleep && rb.activation.idle_time >= params.sleep_time {
                // Mark as sleeping for now; the traversal clears the flag
                // for bodies connected to an awake island.
                rb.activation.sleeping = true;
                self.can_sleep.push(h);
            } else {
                self.stack.push(h);
            }
        }

        // Moving kinematic bodies wake every dynamic body they touch.
        for i in 0..self.active_kinematic_set.len() {
            let h = self.active_kinematic_set[i];
            let rb = match self.bodies.get(h.0) {
                Some(rb) => rb,
                None => continue,
            };
            if !rb.is_moving() {
                continue;
            }
            for collider in &rb.colliders {
                for pair in narrow_phase.contacts_with(*collider) {
                    if pair.solves_impulses() {
                        self.stack.push(select_other((pair.body1, pair.body2), h));
                    }
                }
            }
        }

        // Propagation of the awake state and island extraction through the
        // traversal of the interaction graph.
        self.active_islands.clear();
        self.active_islands.push(0);

        // The max avoids an underflow when the stack is empty.
        let mut island_marker = self.stack.len().max(1) - 1;

        while let Some(handle) = self.stack.pop() {
            let rb = match self.bodies.get_mut(handle.0) {
                Some(rb) => rb,
                None => continue,
            };

            if rb.active_set_timestamp == self.active_set_timestamp || !rb.is_dynamic() {
                // Already visited, or the flood stops at non-dynamic bodies.
                continue;
            }

            if self.stack.len() < island_marker {
                if self.active_dynamic_set.len() - *self.active_islands.last().unwrap()
                    >= params.min_island_size
                {
                    // We are starting a new island.
                    self.active_islands.push(self.active_dynamic_set.len());
                }

                island_marker = self.stack.len();
            }

            rb.wake_up(false);
            rb.active_island_id = self.active_islands.len() - 1;
            rb.active_set_id = self.active_dynamic_set.len();
            rb.active_set_offset = rb.active_set_id - self.active_islands[rb.active_island_id];
            rb.active_set_timestamp = self.active_set_timestamp;
            self.active_dynamic_set.push(handle);

            // Transmit the awake state to all the bodies in contact or
            // joined with this one.
            let rb = &self.bodies[handle.0];
            for collider in &rb.colliders {
                for pair in narrow_phase.contacts_with(*collider) {
                    if pair.solves_impulses() {
                        self.stack
                            .push(select_other((pair.body1, pair.body2), handle));
                    }
                }
            }
            for other in joints.attached_bodies(handle) {
                self.stack.push(other);
            }
        }

        self.active_islands.push(self.active_dynamic_set.len());

        // Actually put to sleep the bodies the traversal did not reach.
        for h in &self.can_sleep {
            let b = &mut self.bodies[h.0];
            if b.activation.sleeping {
                b.sleep();
            }
        }
    }
}

impl Default for RigidBodySet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<RigidBodyHandle> for RigidBodySet {
    type Output = RigidBody;

    fn index(&self, index: RigidBodyHandle) -> &RigidBody {
        &self.bodies[index.0]
    }
}

impl std::ops::IndexMut<RigidBodyHandle> for RigidBodySet {
    fn index_mut(&mut self, handle: RigidBodyHandle) -> &mut RigidBody {
        let rb = &mut self.bodies[handle.0];
        Self::mark_as_modified(handle, rb, &mut self.modified_bodies);
        rb
    }
}
