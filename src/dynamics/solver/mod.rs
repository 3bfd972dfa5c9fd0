//! Constraint solver internals.

pub use self::solver_vel::SolverVel;
pub(crate) use self::island_solver::IslandSolver;
pub(crate) use self::position_constraint::PositionConstraint;
pub(crate) use self::velocity_constraint::{AnyVelocityConstraint, VelocityConstraint};
pub(crate) use self::velocity_ground_constraint::VelocityGroundConstraint;

mod island_solver;
mod position_constraint;
mod solver_vel;
mod velocity_constraint;
mod velocity_ground_constraint;
