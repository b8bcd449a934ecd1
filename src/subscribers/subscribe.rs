//! # Event subscriber trait.
//!
//! Provides [`Subscribe`], an extension point for plugging custom event
//! handlers into the runtime — typically ownership-change listeners that
//! react to `OwnerAssigned` / `OwnerCleared`.
//!
//! Each subscriber gets:
//! - **Dedicated worker task** (runs independently)
//! - **Per-subscriber bounded queue** (capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics are caught and reported, not propagated)
//!
//! ## Rules
//! - A slow subscriber only affects its own queue.
//! - Queue overflow drops the event **for this subscriber only**; other
//!   subscribers are unaffected.
//! - Events are processed sequentially (FIFO) per subscriber.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use ownervisor::{Event, EventKind, Subscribe};
//!
//! struct OwnershipListener;
//!
//! #[async_trait]
//! impl Subscribe for OwnershipListener {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::OwnerAssigned) {
//!             // notify the application, export a metric, etc.
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "ownership-listener" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for ownership observability.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
/// - Slow processing affects only this subscriber's queue.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from a dedicated worker task, not in the publisher context.
    /// Events are delivered in FIFO order per subscriber.
    async fn on_event(&self, event: &Event);

    /// Returns the subscriber name used in overflow/panic reports.
    ///
    /// Prefer short, descriptive names (e.g. "metrics", "audit").
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this subscriber.
    ///
    /// On overflow the new event is dropped for this subscriber only.
    /// The runtime clamps capacity to a minimum of 1. Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
