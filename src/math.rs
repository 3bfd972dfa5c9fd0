//! Compilation flags and type aliases for the math primitives.

/// The scalar type used throughout the engine.
pub type Real = f32;

/// The dimension of the simulated space.
pub const DIM: usize = 2;

/// The maximum number of points a contact manifold can hold.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// The vector type.
pub type Vector<N> = na::Vector2<N>;

/// The point type.
pub type Point<N> = na::Point2<N>;

/// The transformation type: a rotation followed by a translation.
pub type Isometry<N> = na::Isometry2<N>;

/// The rotation type.
pub type Rotation<N> = na::UnitComplex<N>;

/// The translation type.
pub type Translation<N> = na::Translation2<N>;

/// The angular-velocity type: a single scalar in 2D.
pub type AngVector<N> = N;

/// The principal angular inertia: a single scalar in 2D.
pub type AngularInertia<N> = N;
