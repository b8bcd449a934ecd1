//! # Replicated-storage collaborator boundary.
//!
//! All durable state of the ownership core lives in an external replicated
//! store, consumed through [`ReplicatedStore`]:
//!
//! - a CRDT **candidate map** — entity → add-wins set of member ids, read as
//!   a whole and watched for full-map change notifications;
//! - one **owner register** per entity — a last-writer-wins register whose
//!   writes carry a strictly increasing logical clock, so the single
//!   writer's updates always supersede prior values (the empty string is the
//!   "no owner" sentinel on the wire).
//!
//! The supervisor holds only a process-local cache rebuildable at any time;
//! it never owns persisted state. Consistency per request is [`Consistency`];
//! timeouts are enforced by the caller around each operation.
//!
//! [`MemoryStore`] is the process-local implementation used by tests and
//! single-process deployments; a real deployment adapts its replication
//! substrate (gossip, quorum RPC, …) to the trait.

mod crdt;
mod memory;

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::entity::{Entity, MemberId};
use crate::error::StoreError;

pub use crdt::{merge_candidate_sets, LwwRegister};
pub use memory::MemoryStore;

/// Read/write quorum requirement for one store request.
///
/// `Majority` requires acknowledgement from more than half of the replicas;
/// `Local` requires none and completes against local replica state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    /// No quorum; local replica only.
    Local,
    /// More than half of the replicas.
    Majority,
}

/// The full replicated candidate map: entity → registered member ids.
///
/// A key whose set became empty stays present until explicitly pruned by an
/// external administrator; this crate never deletes replicated keys.
pub type CandidateMap = HashMap<Entity, BTreeSet<MemberId>>;

/// One entity's owner-register state as read from the store.
///
/// `owner: None` is the empty "no owner" sentinel; the register itself (and
/// its clock) survives it. New writes must carry a clock strictly above the
/// highest one ever observed for the writer's registers, or the merge drops
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRegister {
    /// The recorded owner, or `None` for the sentinel.
    pub owner: Option<MemberId>,
    /// The register's current logical clock.
    pub clock: u64,
}

/// Key-value CRDT store interface required by the ownership core.
#[async_trait]
pub trait ReplicatedStore: Send + Sync + 'static {
    /// Reads the full candidate map. `Ok(None)` means the key does not exist
    /// anywhere yet (no candidate was ever registered).
    async fn read_candidates(
        &self,
        consistency: Consistency,
    ) -> Result<Option<CandidateMap>, StoreError>;

    /// Reads one entity's owner register with its clock. `Ok(None)` means
    /// the register does not exist; the sentinel reads as
    /// `Some(OwnerRegister { owner: None, .. })`.
    async fn read_owner(
        &self,
        entity: &Entity,
        consistency: Consistency,
    ) -> Result<Option<OwnerRegister>, StoreError>;

    /// Writes one entity's owner register as a last-writer-wins update with
    /// the caller's logical clock. `None` writes the empty sentinel — the
    /// register is never deleted, which would block later writes to the key.
    async fn write_owner(
        &self,
        entity: &Entity,
        owner: Option<&MemberId>,
        clock: u64,
        consistency: Consistency,
    ) -> Result<(), StoreError>;

    /// Removes one member from one entity's candidate set (remove-wins for
    /// the targeted element; the key itself is kept, possibly empty).
    async fn remove_candidate(
        &self,
        entity: &Entity,
        member: &MemberId,
        consistency: Consistency,
    ) -> Result<(), StoreError>;

    /// Stream of candidate-map change notifications. Each notification
    /// carries the full current map, so a lagged receiver heals on the next
    /// delivery.
    fn watch_candidates(&self) -> broadcast::Receiver<CandidateMap>;
}
