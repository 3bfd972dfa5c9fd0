//! Data structures used by the physics engine.

pub mod arena;

pub use self::arena::{Arena, Index};
