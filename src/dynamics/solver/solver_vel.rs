//! The per-body working velocity used by the island solver.

use crate::math::{AngVector, Real, Vector};
use std::ops::AddAssign;

/// The working copy of one body's velocity during an island solve, indexed
/// by the body's offset inside its island.
///
/// Contacts and joints both read and write these; the result is written
/// back to the bodies once the velocity iterations are done.
#[derive(Copy, Clone, Debug)]
pub struct SolverVel {
    /// The linear velocity.
    pub linear: Vector<Real>,
    /// The angular velocity.
    pub angular: AngVector<Real>,
}

impl SolverVel {
    /// A zero velocity.
    pub fn zero() -> Self {
        Self {
            linear: Vector::zeros(),
            angular: 0.0,
        }
    }
}

impl Default for SolverVel {
    fn default() -> Self {
        Self::zero()
    }
}

impl AddAssign for SolverVel {
    fn add_assign(&mut self, rhs: Self) {
        self.linear += rhs.linear;
        self.angular += rhs.angular;
    }
}
