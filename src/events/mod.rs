//! # Ownership events and the broadcast bus.
//!
//! Every externally observable decision of the supervisor — owner assigned,
//! owner cleared, candidate diff applied, datacenter activation, cleanup —
//! is published as an [`Event`] on the [`Bus`]. Subscribers (see
//! [`crate::subscribers`]) consume the bus for logging, metrics, or
//! higher-level ownership-change listeners.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
