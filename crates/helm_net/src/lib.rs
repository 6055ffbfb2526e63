//! # helm_net
//!
//! NATS transport for driven flights.
//!
//! - [`subjects`]: the subject hierarchy under a configurable prefix.
//! - [`messages`]: request, reply and event payloads.
//! - [`codec`]: JSON and MessagePack encoding.
//! - [`connection`]: NATS connection management.
//! - [`error`]: network-layer errors.

pub mod codec;
pub mod connection;
pub mod error;
pub mod messages;
pub mod subjects;

pub use codec::{Codec, decode, encode};
pub use connection::NatsConnection;
pub use error::NetError;
pub use messages::{ApiError, ApiResponse, ChangeEvent};
pub use subjects::{Operation, Subjects};
