//! # helm_system
//!
//! Per-entity simulation logic and the scheduler that runs it.
//!
//! - [`System`]: a query plus an update applied to each matching entity.
//! - [`Scheduler`]: ordered, deterministic, fault-isolating tick runner.
//! - [`systems`]: the built-in ship, weapon, physics and automation systems.

pub mod context;
pub mod error;
pub mod scheduler;
pub mod system;
pub mod systems;

pub use context::SystemContext;
pub use error::SystemError;
pub use scheduler::{Scheduler, SystemFault, TickReport};
pub use system::System;
pub use systems::default_systems;
