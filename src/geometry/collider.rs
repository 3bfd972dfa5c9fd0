//! Colliders: a shape attached to a rigid body, with its material.

use crate::data::{Arena, Index};
use crate::dynamics::{CoefficientCombineRule, MassProperties, RigidBodyHandle, RigidBodySet};
use crate::geometry::{Shape, AABB};
use crate::math::{Isometry, Real, Vector};

/// The unique handle of a collider added to a [`ColliderSet`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[repr(transparent)]
pub struct ColliderHandle(pub(crate) Index);

impl ColliderHandle {
    /// Converts this handle into its (index, generation) components.
    pub fn into_raw_parts(self) -> (usize, u64) {
        self.0.into_raw_parts()
    }

    /// Reconstructs a handle from its (index, generation) components.
    pub fn from_raw_parts(id: usize, generation: u64) -> Self {
        Self(Index::from_raw_parts(id, generation))
    }

    /// An always-invalid collider handle.
    pub fn invalid() -> Self {
        Self(Index::from_raw_parts(crate::INVALID_USIZE, crate::INVALID_U64))
    }
}

/// Pairwise filtering using bit masks.
///
/// Two colliders interact when each one's membership intersects the other's
/// filter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct InteractionGroups {
    /// The groups this collider is part of.
    pub memberships: u32,
    /// The groups this collider can interact with.
    pub filter: u32,
}

impl InteractionGroups {
    /// Initializes the interaction groups from the given memberships and
    /// filter masks.
    pub fn new(memberships: u32, filter: u32) -> Self {
        Self {
            memberships,
            filter,
        }
    }

    /// Can colliders with the groups `self` and `rhs` interact?
    pub fn test(self, rhs: Self) -> bool {
        (self.memberships & rhs.filter) != 0 && (rhs.memberships & self.filter) != 0
    }
}

impl Default for InteractionGroups {
    fn default() -> Self {
        Self::new(u32::MAX, u32::MAX)
    }
}

/// A geometric entity attached to a rigid body and subject to collision
/// detection: the "fixture" of a body.
#[derive(Clone)]
pub struct Collider {
    shape: Shape,
    density: Real,
    /// The friction coefficient of this collider's surface.
    pub friction: Real,
    /// The rule used to mix this collider's friction with its partner's.
    pub friction_combine_rule: CoefficientCombineRule,
    /// The restitution coefficient of this collider's surface.
    pub restitution: Real,
    /// The rule used to mix this collider's restitution with its partner's.
    pub restitution_combine_rule: CoefficientCombineRule,
    /// The minimum relative normal speed for restitution to apply. The
    /// smaller threshold of the two colliders of a pair wins.
    pub restitution_velocity: Real,
    /// The collision groups of this collider.
    pub collision_groups: InteractionGroups,
    pub(crate) is_sensor: bool,
    pub(crate) parent: RigidBodyHandle,
    pub(crate) delta: Isometry<Real>,
    pub(crate) position: Isometry<Real>,
}

impl Collider {
    /// The shape of this collider.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// The density used to compute this collider's mass contribution.
    pub fn density(&self) -> Real {
        self.density
    }

    /// Is this collider a sensor? Sensors produce contact events but no
    /// impulses.
    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    /// The handle of the rigid body this collider is attached to.
    pub fn parent(&self) -> RigidBodyHandle {
        self.parent
    }

    /// The world-space position of this collider.
    pub fn position(&self) -> &Isometry<Real> {
        &self.position
    }

    /// The position of this collider relative to its parent body.
    pub fn position_wrt_parent(&self) -> &Isometry<Real> {
        &self.delta
    }

    /// The world-space axis-aligned bounding box of this collider.
    pub fn compute_aabb(&self) -> AABB {
        self.shape.compute_aabb(&self.position)
    }

    /// The mass properties this collider contributes to its parent,
    /// expressed in the parent's local frame.
    pub fn mass_properties(&self) -> MassProperties {
        MassProperties::from_shape(&self.shape, self.density).transformed(&self.delta)
    }
}

/// A builder for colliders.
#[derive(Clone)]
pub struct ColliderBuilder {
    shape: Shape,
    density: Real,
    friction: Real,
    friction_combine_rule: CoefficientCombineRule,
    restitution: Real,
    restitution_combine_rule: CoefficientCombineRule,
    restitution_velocity: Real,
    collision_groups: InteractionGroups,
    is_sensor: bool,
    delta: Isometry<Real>,
}

impl ColliderBuilder {
    /// Starts building a collider with the given shape.
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            density: 1.0,
            friction: 0.5,
            friction_combine_rule: CoefficientCombineRule::GeometricMean,
            restitution: 0.0,
            restitution_combine_rule: CoefficientCombineRule::Max,
            restitution_velocity: 1.0,
            collision_groups: InteractionGroups::default(),
            is_sensor: false,
            delta: Isometry::identity(),
        }
    }

    /// Sets the density. Must be non-negative.
    pub fn density(mut self, density: Real) -> Self {
        assert!(density >= 0.0, "The collider density must be non-negative.");
        self.density = density;
        self
    }

    /// Sets the friction coefficient. Must be non-negative.
    pub fn friction(mut self, friction: Real) -> Self {
        assert!(friction >= 0.0, "The friction coefficient must be non-negative.");
        self.friction = friction;
        self
    }

    /// Sets the restitution coefficient.
    pub fn restitution(mut self, restitution: Real) -> Self {
        assert!(
            (0.0..=1.0).contains(&restitution),
            "The restitution coefficient must be in [0, 1]."
        );
        self.restitution = restitution;
        self
    }

    /// Sets the minimum relative normal speed for restitution to apply.
    pub fn restitution_velocity(mut self, velocity: Real) -> Self {
        assert!(velocity >= 0.0, "The restitution velocity must be non-negative.");
        self.restitution_velocity = velocity;
        self
    }

    /// Sets the collision groups.
    pub fn collision_groups(mut self, groups: InteractionGroups) -> Self {
        self.collision_groups = groups;
        self
    }

    /// Marks the collider as a sensor.
    pub fn sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    /// Sets the position of the collider relative to its parent body.
    pub fn position_wrt_parent(mut self, delta: Isometry<Real>) -> Self {
        self.delta = delta;
        self
    }

    /// Sets the translation of the collider relative to its parent body.
    pub fn translation(mut self, x: Real, y: Real) -> Self {
        self.delta.translation.vector = Vector::new(x, y);
        self
    }

    /// Builds the collider.
    pub fn build(&self) -> Collider {
        Collider {
            shape: self.shape.clone(),
            density: self.density,
            friction: self.friction,
            friction_combine_rule: self.friction_combine_rule,
            restitution: self.restitution,
            restitution_combine_rule: self.restitution_combine_rule,
            restitution_velocity: self.restitution_velocity,
            collision_groups: self.collision_groups,
            is_sensor: self.is_sensor,
            parent: RigidBodyHandle::invalid(),
            delta: self.delta,
            position: self.delta,
        }
    }
}

/// A set of colliders that can be handled by the physics pipeline.
pub struct ColliderSet {
    pub(crate) colliders: Arena<Collider>,
}

impl ColliderSet {
    /// Creates a new empty set of colliders.
    pub fn new() -> Self {
        Self {
            colliders: Arena::new(),
        }
    }

    /// The number of colliders in this set.
    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    /// `true` if there are no colliders in this set.
    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    /// Is the given collider handle valid?
    pub fn contains(&self, handle: ColliderHandle) -> bool {
        self.colliders.contains(handle.0)
    }

    /// Attaches a collider to the given rigid body and inserts it in this
    /// set.
    ///
    /// Panics if the body handle is invalid: attaching a collider to a
    /// removed body is a programmer error.
    pub fn insert(
        &mut self,
        collider: Collider,
        parent: RigidBodyHandle,
        bodies: &mut RigidBodySet,
    ) -> ColliderHandle {
        let mut collider = collider;
        collider.parent = parent;

        let body = bodies
            .get_mut_internal(parent)
            .expect("Cannot attach a collider to a removed rigid body.");
        collider.position = body.position() * collider.delta;

        let handle = ColliderHandle(self.colliders.insert(collider));
        body.colliders.push(handle);
        bodies.recompute_mass_properties(parent, self);
        handle
    }

    /// Removes a collider from this set, detaching it from its parent body.
    pub fn remove(&mut self, handle: ColliderHandle, bodies: &mut RigidBodySet) -> Option<Collider> {
        let collider = self.colliders.remove(handle.0)?;

        if let Some(body) = bodies.get_mut_internal(collider.parent) {
            body.colliders.retain(|c| *c != handle);
        }
        bodies.recompute_mass_properties(collider.parent, self);

        Some(collider)
    }

    /// Gets the collider with the given handle.
    pub fn get(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.colliders.get(handle.0)
    }

    /// Gets a mutable reference to the collider with the given handle.
    pub fn get_mut(&mut self, handle: ColliderHandle) -> Option<&mut Collider> {
        self.colliders.get_mut(handle.0)
    }

    /// Iterates through all the colliders in this set.
    pub fn iter(&self) -> impl Iterator<Item = (ColliderHandle, &Collider)> {
        self.colliders.iter().map(|(h, c)| (ColliderHandle(h), c))
    }

    /// Translates every collider of this set by the given shift.
    pub(crate) fn shift(&mut self, shift: &Vector<Real>) {
        for (_, collider) in self.colliders.iter_mut() {
            collider.position.translation.vector += *shift;
        }
    }
}

impl Default for ColliderSet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<ColliderHandle> for ColliderSet {
    type Output = Collider;

    fn index(&self, index: ColliderHandle) -> &Collider {
        &self.colliders[index.0]
    }
}
