//! # helm_math
//!
//! Spatial types for the flight simulation. Re-exports the double precision
//! [`glam`] types used for vector maths and defines the serialisable shapes
//! that components store.
//!
//! All distances are kilometres and all linear velocities are kilometres per
//! second, both in components and in the physics engine. See [`units`].

pub mod coordinates;
pub mod units;

pub use glam::{DQuat, DVec3};

pub use coordinates::{Coordinates, Orientation};
