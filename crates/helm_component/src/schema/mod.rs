//! Component schemas.
//!
//! Each struct is the declarative schema of one component type: its fields,
//! defaults (`Default` + `#[serde(default)]`) and range rules ([`Validate`]).
//! Shared sub-structures live in [`shared`] and are composed into several
//! components rather than registered on their own.
//!
//! [`Validate`]: crate::Validate

pub mod automation;
pub mod lifecycle;
pub mod navigation;
pub mod physics;
pub mod shared;
pub mod ship;
pub mod spatial;
pub mod weapons;

pub use automation::{IsTimeline, IsTimelineStep, IsTrigger};
pub use lifecycle::IsDestroyed;
pub use navigation::{Autopilot, IsWaypoint};
pub use physics::{PhysicsHandles, PhysicsWorld};
pub use shared::{DamageType, NodeFlags, TimelineAction, TriggerCondition};
pub use ship::{
    Hull, Identity, IsImpulseEngines, IsShip, IsShipSystem, ShieldState, Shields, Tags,
};
pub use spatial::{Position, PositionFrame, Rotation, RotationVelocity, Velocity};
pub use weapons::{IsTorpedo, IsTorpedoLauncher, LauncherStatus};
