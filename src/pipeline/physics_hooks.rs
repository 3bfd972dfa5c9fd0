//! User-defined hooks called during a step to customize its behavior.

use crate::dynamics::{RigidBody, RigidBodyHandle};
use crate::geometry::{Collider, ColliderHandle, SolverFlags};
use crate::math::Real;

/// Context given to custom collision filters to filter-out collisions.
pub struct PairFilterContext<'a> {
    /// The first rigid body involved in the potential collision.
    pub rigid_body1: &'a RigidBody,
    /// The second rigid body involved in the potential collision.
    pub rigid_body2: &'a RigidBody,
    /// The handle of the first collider involved in the potential collision.
    pub collider_handle1: ColliderHandle,
    /// The handle of the second collider involved in the potential collision.
    pub collider_handle2: ColliderHandle,
    /// The first collider involved in the potential collision.
    pub collider1: &'a Collider,
    /// The second collider involved in the potential collision.
    pub collider2: &'a Collider,
}

/// Context given to time-of-impact filters to veto an impact.
pub struct ToiFilterContext {
    /// The collider of the fast-moving body.
    pub collider1: ColliderHandle,
    /// The collider it is about to hit.
    pub collider2: ColliderHandle,
    /// The fast-moving body.
    pub body1: RigidBodyHandle,
    /// The body about to be hit.
    pub body2: RigidBodyHandle,
    /// The computed time of impact, in `[0, 1)` within the current step.
    pub toi: Real,
}

bitflags::bitflags! {
    #[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
    /// Flags telling the pipeline which hooks of a `PhysicsHooks`
    /// implementation must be called.
    pub struct PhysicsHooksFlags: u32 {
        /// If set, `PhysicsHooks::filter_contact_pair` is called whenever
        /// relevant.
        const FILTER_CONTACT_PAIR = 0b0001;
        /// If set, `PhysicsHooks::filter_time_of_impact` is called whenever
        /// relevant.
        const FILTER_TOI = 0b0010;
    }
}

/// User-defined functions called by the physics engine during one timestep
/// in order to customize its behavior.
pub trait PhysicsHooks: Send + Sync {
    /// The set of hooks that must be taken into account.
    fn active_hooks(&self) -> PhysicsHooksFlags;

    /// Applies the contact pair filter.
    ///
    /// Called for each contact pair surviving the broad-phase when
    /// `active_hooks` contains `FILTER_CONTACT_PAIR`.
    ///
    /// Returning `None` vetoes the pair: the narrow-phase skips every
    /// downstream stage for it this step. Returning `Some(flags)` lets the
    /// pair proceed with the given solver flags; in particular
    /// `Some(SolverFlags::empty())` keeps the contact events flowing while
    /// the solver ignores the pair.
    fn filter_contact_pair(&self, _context: &PairFilterContext) -> Option<SolverFlags> {
        Some(SolverFlags::COMPUTE_IMPULSES)
    }

    /// Applies the time-of-impact filter.
    ///
    /// Called for each impact found by the continuous collision detection
    /// pass when `active_hooks` contains `FILTER_TOI`. Returning `false`
    /// vetoes the impact: the involved bodies keep their integrated motion.
    fn filter_time_of_impact(&self, _context: &ToiFilterContext) -> bool {
        true
    }
}

impl PhysicsHooks for () {
    fn active_hooks(&self) -> PhysicsHooksFlags {
        PhysicsHooksFlags::empty()
    }
}
