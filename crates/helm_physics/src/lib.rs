//! # helm_physics
//!
//! Maps physics-bearing entities into native rigid-body worlds.
//!
//! - [`PhysicsBackend`]: one native world; [`RapierBackend`] and
//!   [`PointMassBackend`] implement it.
//! - [`PhysicsBridge`]: per-flight owner of every native world, keeping the
//!   `physicsWorld` / `physicsHandles` tables and native state in step.

pub mod backend;
pub mod bridge;
pub mod error;
pub mod point_mass;
pub mod rapier;

pub use backend::{BackendKind, BodyDesc, BodyHandle, BodyState, PhysicsBackend};
pub use bridge::{BridgeStats, PhysicsBridge, TeardownReport};
pub use error::PhysicsError;
pub use point_mass::PointMassBackend;
pub use rapier::RapierBackend;
