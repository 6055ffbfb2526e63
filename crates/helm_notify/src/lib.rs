//! # helm_notify
//!
//! Change notification for one flight.
//!
//! After each tick the flight captures a [`ChangeSet`] from the store and
//! hands it to a [`NotificationHub`], which narrows it with each
//! subscriber's [`Filter`] and delivers the result. Delivery only reads the
//! captured set, never the live store, so it can overlap the next tick.

pub mod change_set;
pub mod error;
pub mod filter;
pub mod hub;

pub use change_set::{ChangeRecord, ChangeSet, Topic};
pub use error::NotifyError;
pub use filter::Filter;
pub use hub::{DispatchReport, NotificationHub, Subscription, SubscriptionId};
