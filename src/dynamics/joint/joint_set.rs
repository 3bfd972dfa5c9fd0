//! The set owning every joint, and the body-to-joint adjacency.

use std::collections::HashMap;

use crate::data::{Arena, Index};
use crate::dynamics::{Joint, RigidBodyHandle, RigidBodySet};
use crate::math::{Real, Vector};

/// The unique handle of a joint added to a [`JointSet`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[repr(transparent)]
pub struct JointHandle(pub(crate) Index);

impl JointHandle {
    /// Converts this handle into its (index, generation) components.
    pub fn into_raw_parts(self) -> (usize, u64) {
        self.0.into_raw_parts()
    }

    /// Reconstructs a handle from its (index, generation) components.
    pub fn from_raw_parts(id: usize, generation: u64) -> Self {
        Self(Index::from_raw_parts(id, generation))
    }
}

/// A set of joints, maintaining edges between every joint and the bodies it
/// constrains.
///
/// Together with the contact edges of the narrow-phase, these edges form
/// the constraint graph the island extraction floods through.
pub struct JointSet {
    joints: Arena<Box<dyn Joint>>,
    attached: HashMap<RigidBodyHandle, Vec<JointHandle>>,
}

impl JointSet {
    /// Creates a new empty set of joints.
    pub fn new() -> Self {
        Self {
            joints: Arena::new(),
            attached: HashMap::new(),
        }
    }

    /// The number of joints in this set.
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// `true` if there are no joints in this set.
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Is the given joint handle valid?
    pub fn contains(&self, handle: JointHandle) -> bool {
        self.joints.contains(handle.0)
    }

    /// Inserts a joint and attaches it to every body it references, waking
    /// them up.
    ///
    /// Panics if any referenced body handle is invalid: constraining a
    /// removed body is a programmer error.
    pub fn insert(&mut self, joint: Box<dyn Joint>, bodies: &mut RigidBodySet) -> JointHandle {
        let joint_bodies: Vec<RigidBodyHandle> = joint.bodies().to_vec();
        assert!(
            !joint_bodies.is_empty(),
            "A joint must reference at least one body."
        );
        for body in &joint_bodies {
            assert!(
                bodies.contains(*body),
                "Cannot attach a joint to a removed rigid body."
            );
        }

        let handle = JointHandle(self.joints.insert(joint));
        for body in joint_bodies {
            self.attached.entry(body).or_default().push(handle);
            bodies.wake_up(body, true);
        }
        handle
    }

    /// Removes a joint, detaching it from its bodies and waking them up.
    pub fn remove(
        &mut self,
        handle: JointHandle,
        bodies: &mut RigidBodySet,
        wake_up: bool,
    ) -> Option<Box<dyn Joint>> {
        let joint = self.joints.remove(handle.0)?;

        for body in joint.bodies() {
            Self::detach(&mut self.attached, *body, handle);
            if wake_up {
                bodies.wake_up(*body, true);
            }
        }

        Some(joint)
    }

    /// Removes every joint attached to the given body, waking the other
    /// bodies they constrained.
    pub(crate) fn remove_attached_joints(
        &mut self,
        body: RigidBodyHandle,
        bodies: &mut RigidBodySet,
    ) {
        if let Some(handles) = self.attached.remove(&body) {
            for handle in handles {
                if let Some(joint) = self.joints.remove(handle.0) {
                    for other in joint.bodies() {
                        if *other != body {
                            Self::detach(&mut self.attached, *other, handle);
                            bodies.wake_up(*other, true);
                        }
                    }
                }
            }
        }
    }

    fn detach(
        attached: &mut HashMap<RigidBodyHandle, Vec<JointHandle>>,
        body: RigidBodyHandle,
        handle: JointHandle,
    ) {
        let empty = match attached.get_mut(&body) {
            Some(list) => {
                list.retain(|h| *h != handle);
                list.is_empty()
            }
            None => false,
        };
        if empty {
            attached.remove(&body);
        }
    }

    /// Gets the joint with the given handle.
    pub fn get(&self, handle: JointHandle) -> Option<&dyn Joint> {
        self.joints.get(handle.0).map(|j| &**j)
    }

    /// Gets a mutable reference to the joint with the given handle.
    pub fn get_mut(&mut self, handle: JointHandle) -> Option<&mut (dyn Joint + 'static)> {
        self.joints.get_mut(handle.0).map(|j| &mut **j)
    }

    /// Iterates through all the joints in this set.
    pub fn iter(&self) -> impl Iterator<Item = (JointHandle, &dyn Joint)> {
        self.joints.iter().map(|(h, j)| (JointHandle(h), &**j))
    }

    /// The handles of the joints attached to the given body.
    pub fn attached_joints(&self, body: RigidBodyHandle) -> &[JointHandle] {
        self.attached
            .get(&body)
            .map(|list| &list[..])
            .unwrap_or(&[])
    }

    /// Iterates through the bodies joined to the given body, with one entry
    /// per connecting joint.
    pub fn attached_bodies(
        &self,
        body: RigidBodyHandle,
    ) -> impl Iterator<Item = RigidBodyHandle> + '_ {
        self.attached_joints(body)
            .iter()
            .filter_map(move |h| self.joints.get(h.0))
            .flat_map(|j| j.bodies().iter().copied())
            .filter(move |other| *other != body)
    }

    /// Are these two bodies connected by at least one joint?
    pub fn is_joined(&self, body1: RigidBodyHandle, body2: RigidBodyHandle) -> bool {
        self.joints_between(body1, body2).next().is_some()
    }

    /// May these two bodies collide?
    ///
    /// Collision between two joined bodies is allowed only if at least one
    /// of the joints connecting them has its collision-allowed flag set.
    /// Bodies not joined at all always collide.
    pub fn joint_collision_allowed(&self, body1: RigidBodyHandle, body2: RigidBodyHandle) -> bool {
        let mut joined = false;
        for joint in self.joints_between(body1, body2) {
            if joint.is_collision_allowed() {
                return true;
            }
            joined = true;
        }
        !joined
    }

    fn joints_between(
        &self,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
    ) -> impl Iterator<Item = &dyn Joint> + '_ {
        self.attached_joints(body1)
            .iter()
            .filter_map(move |h| self.joints.get(h.0))
            .filter(move |j| j.bodies().contains(&body1) && j.bodies().contains(&body2))
            .map(|j| &**j)
    }

    /// Applies the given world-space shift to every joint.
    pub fn shift(&mut self, shift: &Vector<Real>) {
        for (_, joint) in self.joints.iter_mut() {
            joint.shift(shift);
        }
    }
}

impl Default for JointSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{DistanceJoint, RigidBodyBuilder};
    use crate::math::Point;

    fn two_bodies() -> (RigidBodySet, RigidBodyHandle, RigidBodyHandle) {
        let mut bodies = RigidBodySet::new();
        let b1 = bodies.insert(RigidBodyBuilder::new_dynamic().build());
        let b2 = bodies.insert(RigidBodyBuilder::new_dynamic().translation(1.0, 0.0).build());
        (bodies, b1, b2)
    }

    fn joint(
        b1: RigidBodyHandle,
        b2: RigidBodyHandle,
        collision_allowed: bool,
    ) -> Box<dyn Joint> {
        let mut joint = DistanceJoint::new(b1, b2, Point::origin(), Point::origin(), 1.0);
        joint.set_collision_allowed(collision_allowed);
        Box::new(joint)
    }

    #[test]
    fn add_then_remove_restores_is_joined() {
        let (mut bodies, b1, b2) = two_bodies();
        let mut joints = JointSet::new();

        assert!(!joints.is_joined(b1, b2));
        let h = joints.insert(joint(b1, b2, false), &mut bodies);
        assert!(joints.is_joined(b1, b2));
        joints.remove(h, &mut bodies, true);
        assert!(!joints.is_joined(b1, b2));
    }

    #[test]
    fn one_permissive_joint_allows_collision() {
        let (mut bodies, b1, b2) = two_bodies();
        let mut joints = JointSet::new();

        joints.insert(joint(b1, b2, false), &mut bodies);
        assert!(!joints.joint_collision_allowed(b1, b2));

        let permissive = joints.insert(joint(b1, b2, true), &mut bodies);
        assert!(joints.joint_collision_allowed(b1, b2));

        joints.remove(permissive, &mut bodies, true);
        assert!(!joints.joint_collision_allowed(b1, b2));
    }

    #[test]
    fn removing_a_body_removes_its_joints() {
        let (mut bodies, b1, b2) = two_bodies();
        let mut joints = JointSet::new();
        let mut colliders = crate::geometry::ColliderSet::new();

        joints.insert(joint(b1, b2, false), &mut bodies);
        bodies.remove(b1, &mut colliders, &mut joints);

        assert!(joints.is_empty());
        assert!(!joints.is_joined(b1, b2));
    }

    #[test]
    #[should_panic]
    fn joining_a_removed_body_is_a_programmer_error() {
        let (mut bodies, b1, b2) = two_bodies();
        let mut joints = JointSet::new();
        let mut colliders = crate::geometry::ColliderSet::new();

        bodies.remove(b2, &mut colliders, &mut joints);
        joints.insert(joint(b1, b2, false), &mut bodies);
    }
}
