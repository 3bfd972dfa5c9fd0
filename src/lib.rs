//! # impetus2d
//!
//! 2-dimensional rigid-body physics engine.
//!
//! The engine advances a set of rigid bodies through time, detects and
//! resolves collisions between convex shapes, and enforces user-defined
//! articulation through joints. Its main building blocks are:
//!
//! - A narrow-phase built on the GJK and EPA algorithms operating on the
//!   Minkowski difference of two convex shapes, followed by feature clipping
//!   to extract contact manifolds with stable identifiers.
//! - A persistent contact cache that matches manifold points across
//!   timesteps to warm-start the solver, and emits begin/persist/end
//!   contact events.
//! - An island-based sequential-impulse constraint solver handling contacts
//!   and joints, with a non-linear position-correction pass.
//! - Conservative-advancement continuous collision detection for
//!   fast-moving "bullet" bodies.
//!
//! The broad-phase is an external collaborator: each step, the caller feeds
//! the candidate collider pairs to the [`geometry::NarrowPhase`] through the
//! [`pipeline::PhysicsPipeline`].

#![deny(bare_trait_objects)]
#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]

#[cfg(feature = "serde-serialize")]
#[macro_use]
extern crate serde;

#[macro_use]
extern crate bitflags;

extern crate nalgebra as na;

pub mod data;
pub mod dynamics;
pub mod geometry;
pub mod math;
pub mod pipeline;
pub(crate) mod utils;

pub use crate::math::Real;

pub(crate) const INVALID_U32: u32 = u32::MAX;
pub(crate) const INVALID_U64: u64 = u64::MAX;
pub(crate) const INVALID_USIZE: usize = INVALID_U32 as usize;
