//! # ownervisor — clustered entity-ownership supervision
//!
//! `ownervisor` elects exactly one **owner** per named [`Entity`] among the
//! cluster members that registered as **candidates** for it, and keeps that
//! assignment correct as members join, crash, partition, and recover. All
//! durable state lives in an external replicated store behind
//! [`ReplicatedStore`]; each process holds only a rebuildable cache.
//!
//! ## State machine
//!
//! ```text
//!            Activate                    reads done
//!   Idle ───────────────▶ Synchronizing ───────────▶ Active
//!    ▲                         │                        │
//!    └─────────────────────────┴────── Deactivate ──────┘
//! ```
//!
//! A member of the default datacenter (`dc-default`) self-activates on
//! start: it reads the replicated candidate map and owner registers, runs
//! corrective passes, then processes changes incrementally. Members of
//! other datacenters stay idle until an explicit activation (datacenter
//! failover) and answer every query with a fail-fast error meanwhile.
//!
//! ## Core rules
//!
//! - The owner of an entity is the smallest registered candidate that is
//!   currently Up and Reachable in the local datacenter.
//! - A valid owner is never disturbed: new candidates do not steal
//!   ownership, and re-running the policy issues no redundant write.
//! - An unreachable member that is still the *only* candidate of an entity
//!   keeps its ownership.
//! - With no active candidate the entity is unowned (empty sentinel in the
//!   replicated register).
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use ownervisor::{
//!     roles, ClusterView, Config, Entity, MemberId, Membership, MemoryStore,
//!     OwnershipSupervisor, ReplicatedStore,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new(64));
//! let view = Arc::new(ClusterView::new(64));
//! view.member_up(MemberId::from("member-1"), roles(["member-1", "dc-default"]));
//!
//! let supervisor = Arc::new(OwnershipSupervisor::new(
//!     Config::default(),
//!     Arc::clone(&store) as Arc<dyn ReplicatedStore>,
//!     Arc::clone(&view) as Arc<dyn Membership>,
//!     &roles(["member-1", "dc-default"]),
//!     Vec::new(),
//! )?);
//!
//! let handle = supervisor.handle();
//! let token = CancellationToken::new();
//! let runner = Arc::clone(&supervisor);
//! let run_token = token.clone();
//! tokio::spawn(async move { runner.run(run_token).await });
//!
//! store.add_candidate(&Entity::new("topology", "node-1"), MemberId::from("member-1"));
//! let owner = handle.get_entity_owner(Entity::new("topology", "node-1")).await?;
//! # let _ = owner;
//! token.cancel();
//! # Ok(())
//! # }
//! ```

mod config;
mod entity;
mod error;
mod events;
mod membership;
mod store;
mod subscribers;
mod supervisor;

pub use config::Config;
pub use entity::{Entity, MemberId};
pub use error::{EntityPathError, StoreError, SupervisorError};
pub use events::{Bus, Event, EventKind};
pub use membership::{
    active_members, datacenter_role, roles, ClusterView, MemberEvent, MemberEventKind, Membership,
    MembershipSnapshot, RoleSet, DATACENTER_PREFIX, DEFAULT_DATACENTER,
};
pub use store::{
    merge_candidate_sets, CandidateMap, Consistency, LwwRegister, MemoryStore, OwnerRegister,
    ReplicatedStore,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use supervisor::{
    CandidatesCleared, EntityView, OwnershipSupervisor, OwnershipView, SupervisorHandle,
};

#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
