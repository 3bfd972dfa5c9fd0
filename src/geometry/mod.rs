//! Structures related to the generation of collision geometry: shapes,
//! narrow-phase algorithms, contact manifolds, and colliders.

pub use self::aabb::AABB;
pub use self::collider::{
    Collider, ColliderBuilder, ColliderHandle, ColliderSet, InteractionGroups,
};
pub use self::contact_manifold::{build_manifold, ContactId, ContactManifold, ManifoldPoint};
pub use self::contact_pair::{ColliderPair, ContactData, ContactPair, SolverFlags};
pub use self::epa::{Epa, Penetration, DEFAULT_EPA_DISTANCE_EPSILON, DEFAULT_EPA_MAX_ITERATIONS, MIN_EPA_ITERATIONS};
pub use self::gjk::{
    Gjk, Ray, RaycastHit, Separation, DEFAULT_GJK_DISTANCE_EPSILON, DEFAULT_GJK_MAX_ITERATIONS,
};
pub use self::link_filter::filter_link_contact;
pub use self::minkowski::{initial_direction, support, SupportPoint};
pub use self::narrow_phase::{ContactEvent, NarrowPhase};
pub use self::shape::{Capsule, Circle, Ellipse, Feature, Link, Polygon, Segment, Shape};
pub use self::simplex::Simplex;

mod aabb;
mod collider;
mod contact_manifold;
pub(crate) mod contact_pair;
mod epa;
mod gjk;
mod link_filter;
mod minkowski;
mod narrow_phase;
mod shape;
mod simplex;
