//! # Synchronizing supervisor.
//!
//! Bootstraps in-memory candidate and owner state from the replicated
//! stores before the instance becomes authoritative:
//!
//! 1. one local (non-majority) read of the full candidate map — absent or
//!    failed means "no candidates anywhere yet", go active empty;
//! 2. one local read of each discovered entity's owner register, all issued
//!    without waiting on one another;
//! 3. an outstanding-read counter; at zero the accumulated maps are handed
//!    to the active supervisor.
//!
//! Every read result re-enters the mailbox as an ordinary command, so the
//! instance stays responsive while reads are in flight. Queries received
//! meanwhile fail fast with an explicit "synchronizing" error. Candidate
//! change notifications observed mid-sync are buffered (latest wins, each
//! carries the full map) and replayed once active.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::entity::{Entity, MemberId};
use crate::error::SupervisorError;
use crate::events::{Event, EventKind};
use crate::store::{CandidateMap, Consistency};

use super::active::Active;
use super::command::{Command, Reply};
use super::idle::Idle;
use super::{fail_inactive, Shared, State};

/// Synchronizing state: bootstrap reads are in flight.
pub(crate) struct Syncer {
    /// Identifies this sync attempt; stale read results are dropped.
    generation: u64,
    candidates: CandidateMap,
    owners: HashMap<Entity, MemberId>,
    /// Outstanding per-entity owner reads.
    pending: usize,
    /// Highest register clock observed; the write clock starts above it so
    /// new decisions always supersede the previous activation's writes.
    clock_floor: u64,
    /// Latest candidate snapshot observed while syncing, replayed on entry.
    buffered: Option<CandidateMap>,
    /// Activation requesters to answer once active.
    waiters: Vec<Reply<()>>,
}

impl Syncer {
    /// Issues the initial candidate-map read and enters the syncing state.
    pub(crate) fn start(shared: &Arc<Shared>, waiters: Vec<Reply<()>>) -> State {
        let generation = shared.sync_generation.fetch_add(1, Ordering::Relaxed) + 1;

        let ctx = Arc::clone(shared);
        tokio::spawn(async move {
            let read = tokio::time::timeout(
                ctx.cfg.sync_read_timeout,
                ctx.store.read_candidates(Consistency::Local),
            )
            .await;
            // A timed-out or failed read is "no data", not a fatal error.
            let map = match read {
                Ok(Ok(map)) => map,
                _ => None,
            };
            let _ = ctx.tx.send(Command::SyncCandidates { generation, map }).await;
        });

        State::Syncing(Syncer {
            generation,
            candidates: CandidateMap::new(),
            owners: HashMap::new(),
            pending: 0,
            clock_floor: 0,
            buffered: None,
            waiters,
        })
    }

    pub(crate) fn handle(mut self, shared: &Arc<Shared>, cmd: Command) -> State {
        match cmd {
            Command::SyncCandidates { generation, .. } if generation != self.generation => {
                State::Syncing(self)
            }
            Command::SyncOwner { generation, .. } if generation != self.generation => {
                State::Syncing(self)
            }
            Command::SyncCandidates { map: None, .. } => self.finish(shared),
            Command::SyncCandidates { map: Some(map), .. } => {
                self.pending = map.len();
                self.candidates = map;
                if self.pending == 0 {
                    return self.finish(shared);
                }
                for entity in self.candidates.keys().cloned() {
                    let ctx = Arc::clone(shared);
                    let generation = self.generation;
                    tokio::spawn(async move {
                        let read = tokio::time::timeout(
                            ctx.cfg.sync_read_timeout,
                            ctx.store.read_owner(&entity, Consistency::Local),
                        )
                        .await;
                        let register = match read {
                            Ok(Ok(register)) => register,
                            _ => None,
                        };
                        let _ = ctx
                            .tx
                            .send(Command::SyncOwner {
                                generation,
                                entity,
                                register,
                            })
                            .await;
                    });
                }
                State::Syncing(self)
            }
            Command::SyncOwner { entity, register, .. } => {
                // Sentinel registers still carry a clock; count them too.
                if let Some(register) = register {
                    self.clock_floor = self.clock_floor.max(register.clock);
                    if let Some(owner) = register.owner {
                        self.owners.insert(entity, owner);
                    }
                }
                self.pending -= 1;
                if self.pending == 0 {
                    self.finish(shared)
                } else {
                    State::Syncing(self)
                }
            }
            Command::Activate { reply } => {
                self.waiters.extend(reply);
                State::Syncing(self)
            }
            Command::Deactivate { reply } => {
                // Abandon the bootstrap; late read results carry a stale
                // generation and are dropped wherever they land.
                for waiter in self.waiters {
                    let _ = waiter.send(Err(SupervisorError::Inactive { state: "idle" }));
                }
                let _ = reply.send(Ok(()));
                State::Idle(Idle)
            }
            Command::CandidatesChanged(map) => {
                self.buffered = Some(map);
                State::Syncing(self)
            }
            // Active-entry recomputes active members from a fresh snapshot.
            Command::Member(_) => State::Syncing(self),
            cmd => {
                fail_inactive(cmd, "synchronizing");
                State::Syncing(self)
            }
        }
    }

    fn finish(self, shared: &Arc<Shared>) -> State {
        shared.bus.publish(
            Event::new(EventKind::SyncCompleted)
                .with_reason(format!("entities={}", self.candidates.len())),
        );
        shared.bus.publish(Event::new(EventKind::DataCenterActivated));

        let active = Active::enter(
            shared,
            self.candidates,
            self.owners,
            self.clock_floor,
            self.buffered,
        );
        for waiter in self.waiters {
            let _ = waiter.send(Ok(()));
        }
        State::Active(Box::new(active))
    }
}
