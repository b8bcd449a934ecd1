//! # Typed mailbox commands and reply values.
//!
//! Every interaction with a supervisor instance — external requests,
//! collaborator notifications, and the continuations of its own
//! asynchronous store reads — arrives as one [`Command`] in the single
//! per-instance mailbox. Handlers are synchronous; anything that touches
//! the replicated store is spawned and re-enters the mailbox later, which
//! is what keeps the single-writer discipline intact.

use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::entity::{Entity, MemberId};
use crate::error::SupervisorError;
use crate::membership::MemberEvent;
use crate::store::{CandidateMap, OwnerRegister};

/// Reply channel carrying a `Result` back to the requester.
pub(crate) type Reply<T> = oneshot::Sender<Result<T, SupervisorError>>;

/// One entity's current ownership view.
#[derive(Debug, Clone)]
pub struct EntityView {
    /// The assigned owner, or `None` while unowned.
    pub owner: Option<MemberId>,
    /// The registered candidates (possibly empty).
    pub candidates: std::collections::BTreeSet<MemberId>,
}

/// The full in-memory ownership view.
#[derive(Debug, Clone)]
pub struct OwnershipView {
    /// Current owner per entity (unowned entities are absent).
    pub owners: HashMap<Entity, MemberId>,
    /// Current candidate sets per entity.
    pub candidates: CandidateMap,
}

/// Completion report of a candidate cleanup.
#[derive(Debug, Clone)]
pub struct CandidatesCleared {
    /// The member whose candidacies were stripped.
    pub member: MemberId,
    /// The entities it was removed from (empty when it was no candidate).
    pub entities: Vec<Entity>,
}

/// Mailbox commands of one supervisor instance.
pub(crate) enum Command {
    // === External requests ===
    /// Activate ownership management for the local datacenter.
    Activate { reply: Option<Reply<()>> },
    /// Deactivate and return to idle, discarding in-memory state.
    Deactivate { reply: Reply<()> },
    /// One entity's owner and candidates.
    GetEntity { entity: Entity, reply: Reply<EntityView> },
    /// The full owner/candidate view.
    GetEntities { reply: Reply<OwnershipView> },
    /// One entity's owner only.
    GetEntityOwner {
        entity: Entity,
        reply: Reply<Option<MemberId>>,
    },
    /// Strip a departing member's candidacy from every entity.
    ClearCandidates {
        member: MemberId,
        reply: Reply<CandidatesCleared>,
    },

    // === Collaborator notifications ===
    /// Candidate-store change: the full current candidate map.
    CandidatesChanged(CandidateMap),
    /// Membership/reachability change.
    Member(MemberEvent),

    // === Internal continuations of asynchronous reads ===
    /// Result of the initial candidate-map read (`None` = absent/failed).
    ///
    /// `generation` ties the result to the sync attempt that issued it, so
    /// reads left over from an abandoned bootstrap are dropped.
    SyncCandidates {
        generation: u64,
        map: Option<CandidateMap>,
    },
    /// Result of one per-entity owner read during synchronization. The
    /// register carries its clock so the write clock can be seeded above
    /// every value already persisted.
    SyncOwner {
        generation: u64,
        entity: Entity,
        register: Option<OwnerRegister>,
    },
    /// A fire-and-forget owner write failed; re-issue it with the current
    /// in-memory decision and a fresh clock.
    RetryOwnerWrite { entity: Entity },
}
