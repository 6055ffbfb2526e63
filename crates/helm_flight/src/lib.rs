//! # helm_flight
//!
//! A flight is one isolated simulation session.
//!
//! - [`Flight`]: store, scheduler, physics bridge and notification hub,
//!   with the query, mutation, subscription and snapshot interfaces.
//! - [`FlightDriver`]: advances a flight on a tokio task at its tick rate.
//! - [`FlightManager`]: runs many flights keyed by [`FlightId`].
//! - [`FlightConfig`] / [`TickConfig`]: how a flight is built and driven.

pub mod config;
pub mod driver;
pub mod error;
pub mod flight;
pub mod manager;

pub use config::{FlightConfig, TickConfig, TickMode};
pub use driver::{FlightDriver, FlightHandle, FlightStatus};
pub use error::FlightError;
pub use flight::{Flight, FlightId, FlightSnapshot};
pub use manager::FlightManager;
