//! Per-pair persistent contact state.

use crate::dynamics::RigidBodyHandle;
use crate::geometry::{ColliderHandle, ContactManifold};
use crate::math::Real;

bitflags::bitflags! {
    #[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
    /// Flags affecting the behavior of the constraints solver for a given
    /// contact pair.
    pub struct SolverFlags: u32 {
        /// The constraint solver will take this contact pair into account
        /// for impulse computation.
        const COMPUTE_IMPULSES = 0b01;
    }
}

/// The solver state carried by one contact point across timesteps.
///
/// These are the warm-start values: the impulses left at the end of step N
/// are exactly the initial guesses of step N + 1.
#[derive(Copy, Clone, Debug, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ContactData {
    /// The accumulated impulse along the contact normal, applied to the
    /// first body. Never negative: contacts push, they do not pull.
    pub impulse: Real,
    /// The accumulated friction impulse along the contact tangent.
    pub tangent_impulse: Real,
}

/// An unordered pair of colliders, normalized so the smaller handle comes
/// first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ColliderPair {
    /// The first collider of the pair.
    pub collider1: ColliderHandle,
    /// The second collider of the pair.
    pub collider2: ColliderHandle,
}

impl ColliderPair {
    /// Builds a normalized pair of collider handles.
    pub fn new(a: ColliderHandle, b: ColliderHandle) -> Self {
        if a <= b {
            Self {
                collider1: a,
                collider2: b,
            }
        } else {
            Self {
                collider1: b,
                collider2: a,
            }
        }
    }
}

/// The whole description of a contact between two colliders: the manifold
/// computed by the narrow-phase, the mixed material coefficients, and the
/// solver bookkeeping.
#[derive(Clone, Debug)]
pub struct ContactPair {
    /// The pair of colliders involved.
    pub pair: ColliderPair,
    /// The body owning the first collider.
    pub body1: RigidBodyHandle,
    /// The body owning the second collider.
    pub body2: RigidBodyHandle,
    /// The contact manifold. Empty when the colliders do not touch.
    pub manifold: ContactManifold,
    /// The mixed friction coefficient.
    pub friction: Real,
    /// The mixed restitution coefficient.
    pub restitution: Real,
    /// The mixed minimum relative normal speed for restitution to apply.
    pub restitution_velocity: Real,
    /// Did the narrow-phase find touching manifold points this step?
    pub is_touching: bool,
    /// `true` when either collider is a sensor: events fire but no impulse
    /// is applied.
    pub is_sensor: bool,
    /// `false` when a hook disabled this contact for the current step.
    pub enabled: bool,
    /// Flags set by the contact-pair filter hook.
    pub solver_flags: SolverFlags,
    pub(crate) constraint_index: usize,
}

impl ContactPair {
    pub(crate) fn new(pair: ColliderPair, body1: RigidBodyHandle, body2: RigidBodyHandle) -> Self {
        Self {
            pair,
            body1,
            body2,
            manifold: ContactManifold::default(),
            friction: 0.0,
            restitution: 0.0,
            restitution_velocity: 0.0,
            is_touching: false,
            is_sensor: false,
            enabled: true,
            solver_flags: SolverFlags::COMPUTE_IMPULSES,
            constraint_index: 0,
        }
    }

    /// Is this pair eligible for impulse computation this step?
    pub fn solves_impulses(&self) -> bool {
        self.is_touching
            && self.enabled
            && !self.is_sensor
            && self.solver_flags.contains(SolverFlags::COMPUTE_IMPULSES)
    }
}
