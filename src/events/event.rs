//! # Runtime events emitted by the ownership supervisor.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Ownership events**: owner assigned / cleared for an entity
//! - **Candidate events**: per-entity candidate diffs observed from the store
//! - **Lifecycle events**: datacenter activation, sync completion, cleanup
//! - **Anomaly events**: ignored foreign-datacenter traffic, failed writes
//!
//! The [`Event`] struct carries additional metadata such as timestamps, the
//! affected entity and member, and free-form reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.
//!
//! ## Example
//! ```rust
//! use ownervisor::{Entity, Event, EventKind, MemberId};
//!
//! let ev = Event::new(EventKind::OwnerAssigned)
//!     .with_entity(Entity::new("topology", "node-1"))
//!     .with_member(MemberId::from("member-2"));
//!
//! assert_eq!(ev.kind, EventKind::OwnerAssigned);
//! assert_eq!(ev.member.as_ref().map(|m| m.as_str()), Some("member-2"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::entity::{Entity, MemberId};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of ownership runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Ownership events ===
    /// An entity received a new owner.
    ///
    /// Sets: `entity`, `member` (the new owner), `at`, `seq`.
    OwnerAssigned,

    /// An entity's owner was cleared (empty sentinel written).
    ///
    /// Sets: `entity`, `member` (the previous owner), `at`, `seq`.
    OwnerCleared,

    // === Candidate events ===
    /// A member was added to an entity's candidate set.
    ///
    /// Sets: `entity`, `member`, `at`, `seq`.
    CandidateAdded,

    /// A member was removed from an entity's candidate set.
    ///
    /// Sets: `entity`, `member`, `at`, `seq`.
    CandidateRemoved,

    // === Lifecycle events ===
    /// Initial synchronization finished; the supervisor is now active.
    ///
    /// Sets: `reason` (entity count summary), `at`, `seq`.
    SyncCompleted,

    /// Ownership management activated for the local datacenter.
    ///
    /// Sets: `at`, `seq`.
    DataCenterActivated,

    /// Ownership management deactivated; supervisor returned to idle.
    ///
    /// Sets: `at`, `seq`.
    DataCenterDeactivated,

    /// A candidate cleanup started for a departing member.
    ///
    /// Sets: `member`, `reason` (entity count), `at`, `seq`.
    CleanupStarted,

    /// A candidate cleanup finished and the requester was answered.
    ///
    /// Sets: `member`, `reason` (entity count), `at`, `seq`.
    CleanupCompleted,

    // === Anomaly events ===
    /// A membership event from a foreign datacenter was ignored.
    ///
    /// Sets: `member`, `reason` (role set), `at`, `seq`.
    ForeignDataCenterEvent,

    /// A replicated owner-register write failed or timed out.
    ///
    /// The write is not retried here; the next corrective pass re-issues it.
    /// Sets: `entity`, `reason`, `at`, `seq`.
    StoreWriteFailed,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// The affected entity, if applicable.
    pub entity: Option<Entity>,
    /// The affected member, if applicable.
    pub member: Option<MemberId>,
    /// Human-readable detail (role sets, counts, error text).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            entity: None,
            member: None,
            reason: None,
        }
    }

    /// Attaches the affected entity.
    #[inline]
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Attaches the affected member.
    #[inline]
    pub fn with_member(mut self, member: MemberId) -> Self {
        self.member = Some(member);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
