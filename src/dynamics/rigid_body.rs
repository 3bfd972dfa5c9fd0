//! Rigid bodies: the simulated objects.

use crate::dynamics::MassProperties;
use crate::geometry::{ColliderHandle, ColliderSet};
use crate::math::{AngVector, Isometry, Point, Real, Rotation, Vector};

/// The status of a body, governing the way it is affected by external
/// forces.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum BodyStatus {
    /// A body affected by external forces, contacts and joints.
    Dynamic,
    /// An immovable body with infinite mass.
    Static,
    /// A body moving at a velocity set by the user, unaffected by forces
    /// and impulses but pushing dynamic bodies around.
    Kinematic,
}

bitflags::bitflags! {
    #[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
    /// User changes pending on a rigid body, handled at the start of the
    /// next step.
    pub(crate) struct RigidBodyChanges: u32 {
        const MODIFIED    = 1 << 0;
        const POSITION    = 1 << 1;
        const SLEEP       = 1 << 2;
        const BODY_STATUS = 1 << 3;
        const COLLIDERS   = 1 << 4;
    }
}

/// The rest-detection state of a rigid body.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ActivationStatus {
    /// Can this body fall asleep at all?
    pub can_sleep: bool,
    /// The time this body has spent below the sleep velocity thresholds.
    pub(crate) idle_time: Real,
    pub(crate) sleeping: bool,
}

impl Default for ActivationStatus {
    fn default() -> Self {
        Self {
            can_sleep: true,
            idle_time: 0.0,
            sleeping: false,
        }
    }
}

/// A rigid body.
///
/// Its position and velocities are mutated only by the solver during a step
/// and by explicit user calls outside of a step.
#[derive(Clone)]
pub struct RigidBody {
    pub(crate) position: Isometry<Real>,
    /// The pose at the beginning of the current step, used by continuous
    /// collision detection to interpolate the swept motion.
    pub(crate) prev_position: Isometry<Real>,
    pub(crate) linvel: Vector<Real>,
    pub(crate) angvel: AngVector<Real>,
    pub(crate) force: Vector<Real>,
    pub(crate) torque: AngVector<Real>,
    // Mass properties given explicitly at construction, on top of the
    // collider contributions.
    pub(crate) base_mass_properties: MassProperties,
    pub(crate) mass_properties: MassProperties,
    pub(crate) effective_inv_mass: Real,
    pub(crate) effective_inv_inertia: Real,
    pub(crate) world_com: Point<Real>,
    /// The factor applied to the world gravity for this body.
    pub gravity_scale: Real,
    /// Multiplicative decay rate of the linear velocity.
    pub linear_damping: Real,
    /// Multiplicative decay rate of the angular velocity.
    pub angular_damping: Real,
    /// The rest-detection state of this body.
    pub activation: ActivationStatus,
    pub(crate) body_status: BodyStatus,
    pub(crate) is_bullet: bool,
    pub(crate) colliders: Vec<ColliderHandle>,
    pub(crate) changes: RigidBodyChanges,
    pub(crate) active_island_id: usize,
    pub(crate) active_set_id: usize,
    pub(crate) active_set_offset: usize,
    pub(crate) active_set_timestamp: u32,
}

impl RigidBody {
    fn new(body_status: BodyStatus) -> Self {
        Self {
            position: Isometry::identity(),
            prev_position: Isometry::identity(),
            linvel: Vector::zeros(),
            angvel: 0.0,
            force: Vector::zeros(),
            torque: 0.0,
            base_mass_properties: MassProperties::zero(),
            mass_properties: MassProperties::zero(),
            effective_inv_mass: 0.0,
            effective_inv_inertia: 0.0,
            world_com: Point::origin(),
            gravity_scale: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            activation: ActivationStatus::default(),
            body_status,
            is_bullet: false,
            colliders: Vec::new(),
            changes: RigidBodyChanges::all(),
            active_island_id: 0,
            active_set_id: 0,
            active_set_offset: 0,
            active_set_timestamp: 0,
        }
    }

    pub(crate) fn reset_internal_references(&mut self) {
        self.colliders = Vec::new();
        self.active_island_id = 0;
        self.active_set_id = 0;
        self.active_set_offset = 0;
        self.active_set_timestamp = 0;
    }

    /// The status of this body.
    pub fn body_status(&self) -> BodyStatus {
        self.body_status
    }

    /// Is this body dynamic?
    pub fn is_dynamic(&self) -> bool {
        self.body_status == BodyStatus::Dynamic
    }

    /// Is this body static?
    pub fn is_static(&self) -> bool {
        self.body_status == BodyStatus::Static
    }

    /// Is this body kinematic?
    pub fn is_kinematic(&self) -> bool {
        self.body_status == BodyStatus::Kinematic
    }

    /// Does this body use continuous collision detection?
    pub fn is_bullet(&self) -> bool {
        self.is_bullet
    }

    /// The world-space position of this body.
    pub fn position(&self) -> &Isometry<Real> {
        &self.position
    }

    /// The world-space center of mass of this body.
    pub fn world_com(&self) -> &Point<Real> {
        &self.world_com
    }

    /// Sets the position of this body. Wakes the body up.
    pub fn set_position(&mut self, position: Isometry<Real>) {
        self.position = position;
        self.prev_position = position;
        self.changes |= RigidBodyChanges::POSITION;
        self.wake_up(true);
    }

    /// The linear velocity of this body.
    pub fn linvel(&self) -> &Vector<Real> {
        &self.linvel
    }

    /// The angular velocity of this body.
    pub fn angvel(&self) -> AngVector<Real> {
        self.angvel
    }

    /// Sets the linear velocity of this body. Wakes the body up.
    pub fn set_linvel(&mut self, linvel: Vector<Real>) {
        self.linvel = linvel;
        if self.is_dynamic() || self.is_kinematic() {
            self.wake_up(true);
        }
    }

    /// Sets the angular velocity of this body. Wakes the body up.
    pub fn set_angvel(&mut self, angvel: AngVector<Real>) {
        self.angvel = angvel;
        if self.is_dynamic() || self.is_kinematic() {
            self.wake_up(true);
        }
    }

    /// The index of this body's entry in the per-island solver buffers.
    ///
    /// Only meaningful for awake dynamic bodies while their island is being
    /// solved; joint implementations use it to address the working velocity
    /// and position buffers.
    pub fn island_offset(&self) -> usize {
        self.active_set_offset
    }

    /// The inverse mass taking the body status into account.
    pub fn effective_inv_mass(&self) -> Real {
        self.effective_inv_mass
    }

    /// The inverse angular inertia taking the body status into account.
    pub fn effective_inv_inertia(&self) -> Real {
        self.effective_inv_inertia
    }

    /// The mass of this body, summing the collider contributions and the
    /// explicitly given mass properties.
    pub fn mass(&self) -> Real {
        self.mass_properties.mass()
    }

    /// Adds a force applied at the center of mass. Forces are accumulated
    /// and zeroed at the end of the step. Wakes the body up.
    pub fn apply_force(&mut self, force: Vector<Real>) {
        if self.is_dynamic() {
            self.force += force;
            self.wake_up(true);
        }
    }

    /// Adds a torque. Wakes the body up.
    pub fn apply_torque(&mut self, torque: AngVector<Real>) {
        if self.is_dynamic() {
            self.torque += torque;
            self.wake_up(true);
        }
    }

    /// Applies an impulse at the center of mass, changing the linear
    /// velocity immediately. Wakes the body up.
    pub fn apply_impulse(&mut self, impulse: Vector<Real>) {
        if self.is_dynamic() {
            self.linvel += impulse * self.effective_inv_mass;
            self.wake_up(true);
        }
    }

    /// Applies an impulse at the given world-space point. Wakes the body
    /// up.
    pub fn apply_impulse_at_point(&mut self, impulse: Vector<Real>, point: Point<Real>) {
        if self.is_dynamic() {
            let dp = point - self.world_com;
            self.linvel += impulse * self.effective_inv_mass;
            self.angvel += (dp.x * impulse.y - dp.y * impulse.x) * self.effective_inv_inertia;
            self.wake_up(true);
        }
    }

    /// Is this body at rest?
    pub fn is_sleeping(&self) -> bool {
        self.activation.sleeping
    }

    /// Is any of this body's velocity components non-zero?
    pub fn is_moving(&self) -> bool {
        self.linvel.norm_squared() > 1.0e-12 || self.angvel.abs() > 1.0e-6
    }

    /// Wakes this body up: it will be simulated again.
    ///
    /// If `strong` is `true`, the accumulated idle time is reset so the
    /// body remains awake for several steps even if it is at rest.
    pub fn wake_up(&mut self, strong: bool) {
        if self.activation.sleeping {
            self.activation.sleeping = false;
            self.changes |= RigidBodyChanges::SLEEP;
        }
        if strong {
            self.activation.idle_time = 0.0;
        }
    }

    /// Puts this body to sleep: zero velocities, no simulation until woken
    /// up.
    pub fn sleep(&mut self) {
        self.activation.sleeping = true;
        self.linvel = Vector::zeros();
        self.angvel = 0.0;
    }

    // Accumulates the time spent below the sleep thresholds.
    pub(crate) fn update_idle_time(
        &mut self,
        dt: Real,
        linear_threshold: Real,
        angular_threshold: Real,
    ) {
        if !self.activation.can_sleep
            || self.linvel.norm() > linear_threshold
            || self.angvel.abs() > angular_threshold
            || self.force.norm_squared() > 0.0
            || self.torque != 0.0
        {
            self.activation.idle_time = 0.0;
        } else {
            self.activation.idle_time += dt;
        }
    }

    pub(crate) fn integrate_forces(&mut self, dt: Real, gravity: &Vector<Real>) {
        if self.is_dynamic() {
            self.linvel += (gravity * self.gravity_scale
                + self.force * self.effective_inv_mass)
                * dt;
            self.angvel += self.torque * self.effective_inv_inertia * dt;

            // Multiplicative damping decay.
            self.linvel *= 1.0 / (1.0 + dt * self.linear_damping);
            self.angvel *= 1.0 / (1.0 + dt * self.angular_damping);
        }
    }

    pub(crate) fn clear_forces(&mut self) {
        self.force = Vector::zeros();
        self.torque = 0.0;
    }

    pub(crate) fn update_world_mass_properties(&mut self) {
        self.world_com = self.position * self.mass_properties.local_com;
        match self.body_status {
            BodyStatus::Dynamic => {
                self.effective_inv_mass = self.mass_properties.inv_mass;
                self.effective_inv_inertia = self.mass_properties.inv_principal_inertia;
            }
            BodyStatus::Static | BodyStatus::Kinematic => {
                self.effective_inv_mass = 0.0;
                self.effective_inv_inertia = 0.0;
            }
        }
    }

    pub(crate) fn update_colliders_positions(&self, colliders: &mut ColliderSet) {
        for handle in &self.colliders {
            if let Some(collider) = colliders.get_mut(*handle) {
                collider.position = self.position * collider.delta;
            }
        }
    }

    /// The handles of the colliders attached to this body.
    pub fn colliders(&self) -> &[ColliderHandle] {
        &self.colliders
    }
}

/// A builder for rigid bodies.
#[derive(Clone)]
pub struct RigidBodyBuilder {
    position: Isometry<Real>,
    linvel: Vector<Real>,
    angvel: AngVector<Real>,
    body_status: BodyStatus,
    gravity_scale: Real,
    linear_damping: Real,
    angular_damping: Real,
    can_sleep: bool,
    is_bullet: bool,
    mass_properties: MassProperties,
}

impl RigidBodyBuilder {
    /// Starts building a body with the given status.
    pub fn new(body_status: BodyStatus) -> Self {
        Self {
            position: Isometry::identity(),
            linvel: Vector::zeros(),
            angvel: 0.0,
            body_status,
            gravity_scale: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            can_sleep: true,
            is_bullet: false,
            mass_properties: MassProperties::zero(),
        }
    }

    /// Starts building a dynamic body.
    pub fn new_dynamic() -> Self {
        Self::new(BodyStatus::Dynamic)
    }

    /// Starts building a static body.
    pub fn new_static() -> Self {
        Self::new(BodyStatus::Static)
    }

    /// Starts building a kinematic body.
    pub fn new_kinematic() -> Self {
        Self::new(BodyStatus::Kinematic)
    }

    /// Sets the initial translation.
    pub fn translation(mut self, x: Real, y: Real) -> Self {
        self.position.translation.vector = Vector::new(x, y);
        self
    }

    /// Sets the initial orientation.
    pub fn rotation(mut self, angle: Real) -> Self {
        self.position.rotation = Rotation::new(angle);
        self
    }

    /// Sets the initial position.
    pub fn position(mut self, position: Isometry<Real>) -> Self {
        self.position = position;
        self
    }

    /// Sets the initial linear velocity.
    pub fn linvel(mut self, x: Real, y: Real) -> Self {
        self.linvel = Vector::new(x, y);
        self
    }

    /// Sets the initial angular velocity.
    pub fn angvel(mut self, angvel: AngVector<Real>) -> Self {
        self.angvel = angvel;
        self
    }

    /// Sets the gravity scale factor.
    pub fn gravity_scale(mut self, scale: Real) -> Self {
        self.gravity_scale = scale;
        self
    }

    /// Sets the linear damping.
    pub fn linear_damping(mut self, damping: Real) -> Self {
        assert!(damping >= 0.0, "The linear damping must be non-negative.");
        self.linear_damping = damping;
        self
    }

    /// Sets the angular damping.
    pub fn angular_damping(mut self, damping: Real) -> Self {
        assert!(damping >= 0.0, "The angular damping must be non-negative.");
        self.angular_damping = damping;
        self
    }

    /// Allows or forbids this body from falling asleep.
    pub fn can_sleep(mut self, can_sleep: bool) -> Self {
        self.can_sleep = can_sleep;
        self
    }

    /// Enables continuous collision detection for this body.
    pub fn bullet(mut self, is_bullet: bool) -> Self {
        self.is_bullet = is_bullet;
        self
    }

    /// Sets mass properties added on top of the collider contributions.
    pub fn additional_mass_properties(mut self, props: MassProperties) -> Self {
        self.mass_properties = props;
        self
    }

    /// Builds the rigid body.
    pub fn build(&self) -> RigidBody {
        let mut rb = RigidBody::new(self.body_status);
        rb.position = self.position;
        rb.prev_position = self.position;
        rb.linvel = self.linvel;
        rb.angvel = self.angvel;
        rb.gravity_scale = self.gravity_scale;
        rb.linear_damping = self.linear_damping;
        rb.angular_damping = self.angular_damping;
        rb.activation.can_sleep = self.can_sleep;
        rb.is_bullet = self.is_bullet;
        rb.base_mass_properties = self.mass_properties;
        rb.mass_properties = self.mass_properties;
        rb.update_world_mass_properties();
        rb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn static_bodies_have_zero_effective_mass() {
        let rb = RigidBodyBuilder::new_static()
            .additional_mass_properties(MassProperties::new(Point::origin(), 10.0, 4.0))
            .build();
        assert_eq!(rb.effective_inv_mass(), 0.0);
        assert_eq!(rb.effective_inv_inertia(), 0.0);
    }

    #[test]
    fn sleeping_bodies_have_zero_velocity() {
        let mut rb = RigidBodyBuilder::new_dynamic().linvel(1.0, 2.0).angvel(3.0).build();
        rb.sleep();
        assert!(rb.is_sleeping());
        assert_eq!(*rb.linvel(), Vector::zeros());
        assert_eq!(rb.angvel(), 0.0);
    }

    #[test]
    fn impulse_at_point_spins_the_body() {
        let mut rb = RigidBodyBuilder::new_dynamic()
            .additional_mass_properties(MassProperties::new(Point::origin(), 2.0, 1.0))
            .build();
        rb.apply_impulse_at_point(Vector::new(0.0, 1.0), Point::new(1.0, 0.0));
        assert_relative_eq!(rb.linvel().y, 0.5);
        assert_relative_eq!(rb.angvel(), 1.0);
    }
}
