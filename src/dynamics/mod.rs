//! Structures related to the simulation dynamics: rigid bodies, joints,
//! islands, the impulse solver, and continuous collision detection.

pub use self::ccd_solver::time_of_impact;
pub(crate) use self::ccd_solver::CcdSolver;
pub use self::coefficient_combine_rule::CoefficientCombineRule;
pub use self::integration_parameters::{IntegrationParameters, MIN_CCD_ITERATIONS};
pub use self::joint::{DistanceJoint, Joint, JointHandle, JointSet, RevoluteJoint};
pub use self::mass_properties::MassProperties;
pub use self::rigid_body::{ActivationStatus, BodyStatus, RigidBody, RigidBodyBuilder};
pub(crate) use self::rigid_body::RigidBodyChanges;
pub use self::rigid_body_set::{BodyPair, RigidBodyHandle, RigidBodySet};
pub use self::solver::SolverVel;
pub(crate) use self::solver::IslandSolver;

mod ccd_solver;
mod coefficient_combine_rule;
mod integration_parameters;
mod joint;
mod mass_properties;
mod rigid_body;
mod rigid_body_set;
pub(crate) mod solver;
