//! Error types used by the ownership supervisor and its collaborators.
//!
//! This module defines three error enums:
//!
//! - [`SupervisorError`] — failures surfaced to external callers of the
//!   supervisor facade (inactive state, unknown entity, closed mailbox).
//! - [`StoreError`] — transient failures of the replicated-storage substrate.
//! - [`EntityPathError`] — malformed external entity paths.
//!
//! No error here is fatal to the process. Transient store failures are
//! recovered locally (reads treated as "no data", writes fire-and-forget);
//! protocol errors are explicit values the caller can retry on.

use thiserror::Error;

use crate::entity::Entity;
use crate::store::Consistency;

/// # Errors surfaced by the ownership supervisor facade.
///
/// Queries against a supervisor that is not yet (or no longer) active fail
/// fast with [`SupervisorError::Inactive`] rather than blocking or returning
/// stale data — callers are expected to retry later.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// The supervisor is transiently unavailable (idle or synchronizing).
    #[error("ownership supervisor is not active (state: {state}); retry later")]
    Inactive {
        /// The state the supervisor was in: `"idle"` or `"synchronizing"`.
        state: &'static str,
    },

    /// No candidate was ever registered for the requested entity.
    #[error("no candidate record for entity {entity}")]
    UnknownEntity {
        /// The entity that was queried.
        entity: Entity,
    },

    /// The supervisor task has terminated and its mailbox is closed.
    #[error("supervisor mailbox is closed")]
    MailboxClosed,

    /// The supervisor dropped the reply channel without answering.
    #[error("supervisor dropped the reply channel")]
    ReplyDropped,

    /// The local member's role set carries no datacenter marker role.
    #[error("local member has no datacenter role (expected a role prefixed with \"dc-\")")]
    MissingDatacenterRole,

    /// An external entity path could not be decoded.
    #[error(transparent)]
    InvalidPath(#[from] EntityPathError),
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::Inactive { .. } => "supervisor_inactive",
            SupervisorError::UnknownEntity { .. } => "unknown_entity",
            SupervisorError::MailboxClosed => "mailbox_closed",
            SupervisorError::ReplyDropped => "reply_dropped",
            SupervisorError::MissingDatacenterRole => "missing_datacenter_role",
            SupervisorError::InvalidPath(_) => "invalid_path",
        }
    }
}

/// # Transient failures of the replicated-storage substrate.
///
/// The core never propagates these to callers: a failed read counts as
/// "no data" and a failed owner write is retried implicitly by the next
/// corrective pass.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested read/write quorum could not be reached in time.
    #[error("no quorum for {consistency:?} request")]
    NoQuorum {
        /// The consistency level that was requested.
        consistency: Consistency,
    },

    /// The substrate is unavailable for another reason.
    #[error("replication substrate unavailable: {reason}")]
    Unavailable {
        /// Human-readable description.
        reason: String,
    },
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::NoQuorum { .. } => "store_no_quorum",
            StoreError::Unavailable { .. } => "store_unavailable",
        }
    }
}

/// An external entity path that does not decode to `kind/id`.
#[derive(Error, Debug)]
#[error("malformed entity path {path:?}: expected \"kind/id\"")]
pub struct EntityPathError {
    /// The offending path.
    pub path: String,
}
