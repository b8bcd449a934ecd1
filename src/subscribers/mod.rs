//! # Subscriber plumbing: fan-out of ownership events.
//!
//! [`Subscribe`] is the extension point for plugging custom event handlers
//! (ownership-change listeners, metrics, audit) into the runtime, and
//! [`SubscriberSet`] fans each published [`Event`](crate::events::Event) out
//! to all of them without awaiting their processing.

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
