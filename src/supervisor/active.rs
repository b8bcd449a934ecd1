//! # Active ownership supervisor.
//!
//! The steady-state engine. It owns the canonical in-memory view of
//! candidates and owners, reacts to candidate-store notifications and
//! membership events, and computes/publishes new owner assignments.
//!
//! ## State
//! - `candidates`: entity → registered member ids (mirrors the CRDT map)
//! - `owners`: entity → assigned owner (mirrors the LWW registers)
//! - `owned_by`: owner → entities, the reverse index for O(1) "which
//!   entities does member X own" lookups when X disappears
//! - `active_members`: candidates currently Up and Reachable in the local
//!   datacenter, maintained purely from membership events
//!
//! ## Assignment policy
//! The owner of an entity is the lexicographically smallest candidate that
//! is currently active (`BTreeSet` iteration order, a deterministic
//! tie-break). With no active candidate the empty sentinel is written, but
//! only when an owner was previously recorded. Re-running the policy on an
//! already-correct entity changes nothing and issues no replicated write.
//!
//! ## Reassignment
//! Entity E is reassigned away from old owner M only if M is not active OR
//! M is no longer a candidate for E — never merely because another
//! candidate changed. Exception: when M is inactive but still E's *only*
//! candidate, E stays with M; flipping it to unowned would be strictly
//! worse since nobody else can take over.
//!
//! All replicated writes are asynchronous and fire-and-forget: the handler
//! records the decision locally, spawns the write (local consistency,
//! strictly increasing logical clock), and stays responsive. A failed or
//! timed-out write publishes [`EventKind::StoreWriteFailed`] and re-enters
//! the mailbox as a retry, which writes the entity's newest in-memory
//! decision with a fresh clock.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::entity::{Entity, MemberId};
use crate::error::SupervisorError;
use crate::events::{Event, EventKind};
use crate::membership::{active_members, MemberEvent};
use crate::store::{CandidateMap, Consistency};

use super::cleaner::CandidateCleaner;
use super::command::{CandidatesCleared, Command, EntityView, OwnershipView, Reply};
use super::idle::Idle;
use super::{Shared, State};

/// Active state: this instance is authoritative for its datacenter.
pub(crate) struct Active {
    shared: Arc<Shared>,
    candidates: CandidateMap,
    owners: HashMap<Entity, MemberId>,
    owned_by: HashMap<MemberId, BTreeSet<Entity>>,
    active_members: BTreeSet<MemberId>,
    /// Logical clock for owner-register writes; strictly increasing so the
    /// single writer's updates always supersede prior values on merge.
    write_clock: u64,
}

impl Active {
    /// Builds the active state from synchronized maps and runs the two
    /// corrective passes before any new message is accepted: reassign
    /// entities whose recorded owner is gone, then assign owners to
    /// entities that have none. A candidate snapshot buffered during
    /// synchronization is applied last.
    ///
    /// `clock_floor` is the highest register clock observed during
    /// synchronization; writes start above it so they supersede everything
    /// a previous activation (or a previous process) persisted.
    pub(crate) fn enter(
        shared: &Arc<Shared>,
        candidates: CandidateMap,
        owners: HashMap<Entity, MemberId>,
        clock_floor: u64,
        buffered: Option<CandidateMap>,
    ) -> Self {
        let members = active_members(&shared.membership.snapshot(), &shared.datacenter);

        let mut owned_by: HashMap<MemberId, BTreeSet<Entity>> = HashMap::new();
        for (entity, owner) in &owners {
            owned_by
                .entry(owner.clone())
                .or_default()
                .insert(entity.clone());
        }

        let mut this = Self {
            shared: Arc::clone(shared),
            candidates,
            owners,
            owned_by,
            active_members: members,
            write_clock: clock_floor,
        };

        this.reassign_unreachable_owners();
        this.assign_missing_owners();
        if let Some(snapshot) = buffered {
            this.apply_candidate_snapshot(snapshot);
        }
        this
    }

    pub(crate) fn handle(mut self: Box<Self>, cmd: Command) -> State {
        match cmd {
            Command::CandidatesChanged(map) => {
                self.apply_candidate_snapshot(map);
                State::Active(self)
            }
            Command::Member(event) => {
                self.on_member_event(event);
                State::Active(self)
            }
            Command::GetEntity { entity, reply } => {
                self.reply_entity(entity, reply);
                State::Active(self)
            }
            Command::GetEntities { reply } => {
                let _ = reply.send(Ok(OwnershipView {
                    owners: self.owners.clone(),
                    candidates: self.candidates.clone(),
                }));
                State::Active(self)
            }
            Command::GetEntityOwner { entity, reply } => {
                let result = if self.candidates.contains_key(&entity) {
                    Ok(self.owners.get(&entity).cloned())
                } else {
                    Err(SupervisorError::UnknownEntity { entity })
                };
                let _ = reply.send(result);
                State::Active(self)
            }
            Command::ClearCandidates { member, reply } => {
                self.start_cleanup(member, reply);
                State::Active(self)
            }
            // A previous write for this entity failed; write the current
            // in-memory decision again with a fresh clock. Going through the
            // mailbox means the retry never races a newer decision.
            Command::RetryOwnerWrite { entity } => {
                let owner = self.owners.get(&entity).cloned();
                self.write_owner(&entity, owner);
                State::Active(self)
            }
            // Already active; activation is idempotent.
            Command::Activate { reply } => {
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(()));
                }
                State::Active(self)
            }
            Command::Deactivate { reply } => {
                self.shared
                    .bus
                    .publish(Event::new(EventKind::DataCenterDeactivated));
                let _ = reply.send(Ok(()));
                // All in-memory state is discarded; a future synchronization
                // run rebuilds it from the replicated stores.
                State::Idle(Idle)
            }
            // Stale continuations of an earlier bootstrap.
            Command::SyncCandidates { .. } | Command::SyncOwner { .. } => State::Active(self),
        }
    }

    // === Candidate-store notifications ===

    /// Applies one full-map change notification, entity by entity.
    fn apply_candidate_snapshot(&mut self, snapshot: CandidateMap) {
        for (entity, received) in snapshot {
            self.process_candidates_for(entity, received);
        }
    }

    /// Diffs one entity's received candidate set against the known one.
    fn process_candidates_for(&mut self, entity: Entity, received: BTreeSet<MemberId>) {
        // First sighting: adopt the set wholesale and assign. Empty first
        // sightings are not recorded — that would only produce a pointless
        // no-owner notification.
        if !self.candidates.contains_key(&entity) {
            if !received.is_empty() {
                self.candidates.insert(entity.clone(), received);
                self.assign_owner_for(&entity);
            }
            return;
        }

        let present = self.candidates.get(&entity).cloned().unwrap_or_default();
        let added: Vec<MemberId> = received.difference(&present).cloned().collect();
        let removed: Vec<MemberId> = present.difference(&received).cloned().collect();

        let mut owners_to_reassign: Vec<MemberId> = Vec::new();

        for member in added {
            self.candidates
                .entry(entity.clone())
                .or_default()
                .insert(member.clone());
            self.shared.bus.publish(
                Event::new(EventKind::CandidateAdded)
                    .with_entity(entity.clone())
                    .with_member(member),
            );
            // Assign right away when the entity has no owner or its owner is
            // unreachable; a valid owner is never disturbed by an arrival.
            let owner_invalid = match self.owners.get(&entity) {
                None => true,
                Some(owner) => !self.active_members.contains(owner),
            };
            if owner_invalid {
                self.assign_owner_for(&entity);
            }
        }

        for member in removed {
            if let Some(set) = self.candidates.get_mut(&entity) {
                set.remove(&member);
            }
            self.shared.bus.publish(
                Event::new(EventKind::CandidateRemoved)
                    .with_entity(entity.clone())
                    .with_member(member.clone()),
            );
            if self.owned_by.contains_key(&member) {
                owners_to_reassign.push(member);
            }
        }

        for member in owners_to_reassign {
            self.reassign_owned_by(&member);
        }
    }

    // === Membership events ===

    fn on_member_event(&mut self, event: MemberEvent) {
        if !event.roles.iter().any(|r| r == &self.shared.datacenter) {
            let roles = event.roles.iter().cloned().collect::<Vec<_>>().join(",");
            self.shared.bus.publish(
                Event::new(EventKind::ForeignDataCenterEvent)
                    .with_member(event.member)
                    .with_reason(roles),
            );
            return;
        }

        if event.makes_reachable() {
            self.active_members.insert(event.member);
            // Cheap: only unowned entities are touched.
            self.assign_missing_owners();
        } else {
            self.active_members.remove(&event.member);
            self.reassign_owned_by(&event.member);
        }
    }

    // === Corrective passes ===

    /// Reassigns every entity whose recorded owner is not active.
    fn reassign_unreachable_owners(&mut self) {
        let stale: Vec<MemberId> = self
            .owned_by
            .keys()
            .filter(|owner| !self.active_members.contains(*owner))
            .cloned()
            .collect();
        for owner in stale {
            self.reassign_owned_by(&owner);
        }
    }

    /// Assigns an owner to every entity that has candidates but no owner.
    fn assign_missing_owners(&mut self) {
        let missing: Vec<Entity> = self
            .candidates
            .keys()
            .filter(|entity| !self.owners.contains_key(*entity))
            .cloned()
            .collect();
        for entity in missing {
            self.assign_owner_for(&entity);
        }
    }

    // === Reassignment ===

    /// Attempts reassignment of each entity currently owned by `old_owner`.
    ///
    /// Entity-scoped predicate: reassign only if the old owner is not
    /// active, or stopped being a candidate for that entity. The sole
    /// unreachable candidate of an entity keeps its ownership.
    fn reassign_owned_by(&mut self, old_owner: &MemberId) {
        let entities: Vec<Entity> = self
            .owned_by
            .get(old_owner)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();

        for entity in entities {
            let reassign = !self.is_active(old_owner) || !self.is_candidate_for(&entity, old_owner);
            if !reassign {
                continue;
            }
            if !self.is_active(old_owner)
                && self.is_candidate_for(&entity, old_owner)
                && self.has_single_candidate(&entity)
            {
                continue;
            }
            self.assign_owner_for(&entity);
        }
    }

    fn is_active(&self, member: &MemberId) -> bool {
        self.active_members.contains(member)
    }

    fn is_candidate_for(&self, entity: &Entity, member: &MemberId) -> bool {
        self.candidates
            .get(entity)
            .is_some_and(|set| set.contains(member))
    }

    fn has_single_candidate(&self, entity: &Entity) -> bool {
        self.candidates.get(entity).is_some_and(|set| set.len() == 1)
    }

    // === Assignment ===

    /// Applies the assignment policy to one entity.
    ///
    /// Idempotent: when the picked owner equals the recorded one, nothing
    /// changes and no replicated write is issued.
    fn assign_owner_for(&mut self, entity: &Entity) {
        let picked = self
            .candidates
            .get(entity)
            .and_then(|set| set.iter().find(|m| self.active_members.contains(*m)))
            .cloned();

        let Some(new_owner) = picked else {
            // No candidate at all, or none reachable.
            self.clear_owner(entity);
            return;
        };

        if self.owners.get(entity) == Some(&new_owner) {
            return;
        }

        if let Some(previous) = self.owners.insert(entity.clone(), new_owner.clone()) {
            self.unlink(&previous, entity);
        }
        self.owned_by
            .entry(new_owner.clone())
            .or_default()
            .insert(entity.clone());

        self.shared.bus.publish(
            Event::new(EventKind::OwnerAssigned)
                .with_entity(entity.clone())
                .with_member(new_owner.clone()),
        );
        self.write_owner(entity, Some(new_owner));
    }

    /// Clears an entity's owner, if one was recorded. The register is
    /// written with the empty sentinel rather than deleted — deleting a
    /// replicated key would prevent later writes for it.
    fn clear_owner(&mut self, entity: &Entity) {
        if let Some(previous) = self.owners.remove(entity) {
            self.unlink(&previous, entity);
            self.shared.bus.publish(
                Event::new(EventKind::OwnerCleared)
                    .with_entity(entity.clone())
                    .with_member(previous),
            );
            self.write_owner(entity, None);
        }
    }

    fn unlink(&mut self, owner: &MemberId, entity: &Entity) {
        if let Some(set) = self.owned_by.get_mut(owner) {
            set.remove(entity);
            if set.is_empty() {
                self.owned_by.remove(owner);
            }
        }
    }

    /// Issues the asynchronous owner-register write (fire-and-forget).
    fn write_owner(&mut self, entity: &Entity, owner: Option<MemberId>) {
        self.write_clock += 1;
        let clock = self.write_clock;
        let ctx = Arc::clone(&self.shared);
        let entity = entity.clone();

        tokio::spawn(async move {
            let write = tokio::time::timeout(
                ctx.cfg.owner_write_timeout,
                ctx.store
                    .write_owner(&entity, owner.as_ref(), clock, Consistency::Local),
            )
            .await;
            let reason = match write {
                Ok(Ok(())) => return,
                Ok(Err(err)) => err.to_string(),
                Err(_) => "write timed out".to_string(),
            };
            ctx.bus.publish(
                Event::new(EventKind::StoreWriteFailed)
                    .with_entity(entity.clone())
                    .with_reason(reason),
            );
            // Each attempt is bounded by the timeout above, so retries are
            // naturally paced while the substrate is down.
            let _ = ctx.tx.send(Command::RetryOwnerWrite { entity }).await;
        });
    }

    // === Queries and cleanup ===

    fn reply_entity(&self, entity: Entity, reply: Reply<EntityView>) {
        let result = match self.candidates.get(&entity) {
            Some(candidates) => Ok(EntityView {
                owner: self.owners.get(&entity).cloned(),
                candidates: candidates.clone(),
            }),
            None => Err(SupervisorError::UnknownEntity { entity }),
        };
        let _ = reply.send(result);
    }

    /// Reads the candidate map at majority consistency, then hands the
    /// result to a short-lived cleaner; the requester is answered only when
    /// the cleaner completes. A failed majority read cleans nothing and
    /// completes immediately.
    fn start_cleanup(&self, member: MemberId, reply: Reply<CandidatesCleared>) {
        let ctx = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let read = tokio::time::timeout(
                ctx.cfg.clear_read_timeout,
                ctx.store.read_candidates(Consistency::Majority),
            )
            .await;
            let map = match read {
                Ok(Ok(Some(map))) => map,
                _ => CandidateMap::new(),
            };
            CandidateCleaner::new(ctx).run(member, map, reply).await;
        });
    }

    #[cfg(test)]
    pub(crate) fn testing_parts(
        &self,
    ) -> (
        &CandidateMap,
        &HashMap<Entity, MemberId>,
        &HashMap<MemberId, BTreeSet<Entity>>,
        u64,
    ) {
        (&self.candidates, &self.owners, &self.owned_by, self.write_clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::entity::MemberId;
    use crate::events::Bus;
    use crate::membership::{roles, ClusterView};
    use crate::store::MemoryStore;
    use crate::supervisor::command::Command;
    use tokio::sync::mpsc;

    fn member(name: &str) -> MemberId {
        MemberId::from(name)
    }

    fn entity(id: &str) -> Entity {
        Entity::new("test", id)
    }

    fn shared_with(view: &Arc<ClusterView>) -> Arc<Shared> {
        shared_with_store(view, Arc::new(MemoryStore::new(64)))
    }

    fn shared_with_store(view: &Arc<ClusterView>, store: Arc<MemoryStore>) -> Arc<Shared> {
        let (tx, _rx) = mpsc::channel::<Command>(64);
        Arc::new(Shared {
            cfg: Config::default(),
            store,
            membership: Arc::clone(view) as Arc<dyn crate::membership::Membership>,
            bus: Bus::new(64),
            tx,
            datacenter: "dc-default".to_string(),
            sync_generation: std::sync::atomic::AtomicU64::new(0),
        })
    }

    fn cluster(members: &[&str]) -> Arc<ClusterView> {
        let view = Arc::new(ClusterView::new(64));
        for m in members {
            view.member_up(member(m), roles([*m, "dc-default"]));
        }
        view
    }

    fn candidates(pairs: &[(&str, &[&str])]) -> CandidateMap {
        pairs
            .iter()
            .map(|(e, ms)| (entity(e), ms.iter().map(|m| member(m)).collect()))
            .collect()
    }

    #[tokio::test]
    async fn test_entry_assigns_missing_owners() {
        let view = cluster(&["a", "b"]);
        let shared = shared_with(&view);
        let active = Active::enter(
            &shared,
            candidates(&[("e1", &["a", "b"]), ("e2", &["a"])]),
            HashMap::new(),
            0,
            None,
        );

        let (_, owners, owned_by, _) = active.testing_parts();
        // deterministic pick: smallest active candidate
        assert_eq!(owners[&entity("e1")], member("a"));
        assert_eq!(owners[&entity("e2")], member("a"));
        assert!(owned_by[&member("a")].contains(&entity("e1")));
        assert!(owned_by[&member("a")].contains(&entity("e2")));
    }

    #[tokio::test]
    async fn test_entry_reassigns_unreachable_owner() {
        let view = cluster(&["b"]);
        let shared = shared_with(&view);
        let mut owners = HashMap::new();
        owners.insert(entity("e1"), member("dead"));

        let active = Active::enter(
            &shared,
            candidates(&[("e1", &["b", "dead"])]),
            owners,
            0,
            None,
        );

        let (_, owners, owned_by, _) = active.testing_parts();
        assert_eq!(owners[&entity("e1")], member("b"));
        assert!(!owned_by.contains_key(&member("dead")));
    }

    #[tokio::test]
    async fn test_no_active_candidate_leaves_entity_unowned() {
        let view = cluster(&[]);
        let shared = shared_with(&view);
        let active = Active::enter(
            &shared,
            candidates(&[("e1", &["a", "b"])]),
            HashMap::new(),
            0,
            None,
        );

        let (_, owners, _, clock) = active.testing_parts();
        assert!(owners.is_empty());
        assert_eq!(clock, 0, "clearing a never-owned entity must not write");
    }

    #[tokio::test]
    async fn test_assignment_is_idempotent_and_writes_once() {
        let view = cluster(&["a"]);
        let shared = shared_with(&view);
        let mut active = Active::enter(
            &shared,
            candidates(&[("e1", &["a"])]),
            HashMap::new(),
            0,
            None,
        );
        let clock_after_entry = active.testing_parts().3;
        assert_eq!(clock_after_entry, 1);

        active.assign_owner_for(&entity("e1"));
        active.assign_missing_owners();

        let (_, owners, _, clock) = active.testing_parts();
        assert_eq!(owners[&entity("e1")], member("a"));
        assert_eq!(clock, 1, "re-running assignment must not issue a write");
    }

    #[tokio::test]
    async fn test_new_candidate_does_not_steal_valid_owner() {
        let view = cluster(&["b"]);
        let shared = shared_with(&view);
        let mut active = Active::enter(
            &shared,
            candidates(&[("e1", &["b"])]),
            HashMap::new(),
            0,
            None,
        );
        assert_eq!(active.testing_parts().1[&entity("e1")], member("b"));

        // "a" sorts before "b" but must not take over on arrival
        view.member_up(member("a"), roles(["a", "dc-default"]));
        active.active_members.insert(member("a"));
        active.process_candidates_for(entity("e1"), [member("a"), member("b")].into());

        let (cands, owners, _, _) = active.testing_parts();
        assert_eq!(owners[&entity("e1")], member("b"));
        assert_eq!(cands[&entity("e1")].len(), 2);
    }

    #[tokio::test]
    async fn test_candidate_removal_reassigns_owned_entities() {
        let view = cluster(&["a", "b"]);
        let shared = shared_with(&view);
        let mut active = Active::enter(
            &shared,
            candidates(&[("e1", &["a", "b"])]),
            HashMap::new(),
            0,
            None,
        );
        assert_eq!(active.testing_parts().1[&entity("e1")], member("a"));

        // "a" deregisters from e1
        active.process_candidates_for(entity("e1"), [member("b")].into());

        let (cands, owners, owned_by, _) = active.testing_parts();
        assert_eq!(owners[&entity("e1")], member("b"));
        assert!(!cands[&entity("e1")].contains(&member("a")));
        assert!(!owned_by.contains_key(&member("a")));
        assert!(owned_by[&member("b")].contains(&entity("e1")));
    }

    #[tokio::test]
    async fn test_member_unreachable_moves_ownership() {
        let view = cluster(&["a", "b"]);
        let shared = shared_with(&view);
        let mut active = Active::enter(
            &shared,
            candidates(&[("e1", &["a", "b"]), ("e2", &["a"])]),
            HashMap::new(),
            0,
            None,
        );

        view.member_unreachable(&member("a"));
        active.on_member_event(MemberEvent {
            member: member("a"),
            roles: roles(["a", "dc-default"]),
            kind: crate::membership::MemberEventKind::Unreachable,
        });

        let (_, owners, _, _) = active.testing_parts();
        assert_eq!(owners[&entity("e1")], member("b"));
        // sole-candidate retention: e2 stays with its only candidate
        assert_eq!(owners[&entity("e2")], member("a"));
    }

    #[tokio::test]
    async fn test_two_candidate_entity_goes_unowned_when_both_drop() {
        // after a and b both drop, e1 (two candidates) ends unowned while
        // e2 (sole candidate a) stays with a
        let view = cluster(&["a", "b"]);
        let shared = shared_with(&view);
        let mut active = Active::enter(
            &shared,
            candidates(&[("e1", &["a", "b"]), ("e2", &["a"])]),
            HashMap::new(),
            0,
            None,
        );

        for name in ["a", "b"] {
            view.member_unreachable(&member(name));
            active.on_member_event(MemberEvent {
                member: member(name),
                roles: roles([name, "dc-default"]),
                kind: crate::membership::MemberEventKind::Unreachable,
            });
        }

        let (_, owners, _, _) = active.testing_parts();
        assert!(
            !owners.contains_key(&entity("e1")),
            "two-candidate entity must go unowned when no candidate is active"
        );
        assert_eq!(owners[&entity("e2")], member("a"), "sole candidate retained");
    }

    #[tokio::test]
    async fn test_member_reachable_again_assigns_unowned_entities() {
        let view = cluster(&["a"]);
        let shared = shared_with(&view);
        let mut active = Active::enter(
            &shared,
            candidates(&[("e1", &["a", "b"])]),
            HashMap::new(),
            0,
            None,
        );

        view.member_unreachable(&member("a"));
        active.on_member_event(MemberEvent {
            member: member("a"),
            roles: roles(["a", "dc-default"]),
            kind: crate::membership::MemberEventKind::Unreachable,
        });
        assert!(active.testing_parts().1.is_empty());

        view.member_reachable(&member("a"));
        active.on_member_event(MemberEvent {
            member: member("a"),
            roles: roles(["a", "dc-default"]),
            kind: crate::membership::MemberEventKind::Reachable,
        });
        assert_eq!(active.testing_parts().1[&entity("e1")], member("a"));
    }

    #[tokio::test]
    async fn test_foreign_datacenter_event_is_ignored() {
        let view = cluster(&["a"]);
        let shared = shared_with(&view);
        let mut active = Active::enter(
            &shared,
            candidates(&[("e1", &["a"])]),
            HashMap::new(),
            0,
            None,
        );

        active.on_member_event(MemberEvent {
            member: member("x"),
            roles: roles(["x", "dc-backup"]),
            kind: crate::membership::MemberEventKind::Up,
        });

        assert!(
            !active.active_members.contains(&member("x")),
            "foreign members never enter the active set"
        );
        assert_eq!(active.testing_parts().1[&entity("e1")], member("a"));
    }

    #[tokio::test]
    async fn test_reverse_index_matches_owner_map() {
        let view = cluster(&["a", "b", "c"]);
        let shared = shared_with(&view);
        let mut active = Active::enter(
            &shared,
            candidates(&[
                ("e1", &["a", "b"]),
                ("e2", &["b", "c"]),
                ("e3", &["c"]),
            ]),
            HashMap::new(),
            0,
            None,
        );

        // churn: c drops, a loses e1 candidacy, d arrives on e2
        view.member_unreachable(&member("c"));
        active.on_member_event(MemberEvent {
            member: member("c"),
            roles: roles(["c", "dc-default"]),
            kind: crate::membership::MemberEventKind::Unreachable,
        });
        active.process_candidates_for(entity("e1"), [member("b")].into());
        active.process_candidates_for(entity("e2"), [member("b"), member("c"), member("d")].into());

        let (_, owners, owned_by, _) = active.testing_parts();
        for (entity, owner) in owners {
            assert!(
                owned_by[owner].contains(entity),
                "owner map entry {entity} -> {owner} missing from reverse index"
            );
        }
        let indexed: usize = owned_by.values().map(|s| s.len()).sum();
        assert_eq!(indexed, owners.len(), "reverse index has no extra entries");
    }

    #[tokio::test]
    async fn test_empty_received_set_for_unknown_entity_not_recorded() {
        let view = cluster(&["a"]);
        let shared = shared_with(&view);
        let mut active = Active::enter(&shared, CandidateMap::new(), HashMap::new(), 0, None);

        active.process_candidates_for(entity("ghost"), BTreeSet::new());
        assert!(active.testing_parts().0.is_empty());
    }

    #[tokio::test]
    async fn test_last_candidate_removed_keeps_empty_entry_and_clears_owner() {
        let view = cluster(&["a"]);
        let shared = shared_with(&view);
        let mut active = Active::enter(
            &shared,
            candidates(&[("e1", &["a"])]),
            HashMap::new(),
            0,
            None,
        );
        assert_eq!(active.testing_parts().1[&entity("e1")], member("a"));

        // deregistration (not a reachability change): a is still active but
        // no longer a candidate, so sole-candidate retention does not apply
        active.process_candidates_for(entity("e1"), BTreeSet::new());

        let (cands, owners, owned_by, _) = active.testing_parts();
        assert!(cands[&entity("e1")].is_empty(), "key stays with empty set");
        assert!(!owners.contains_key(&entity("e1")));
        assert!(owned_by.is_empty());
    }

    async fn await_register(store: &MemoryStore, id: &str, want: (Option<MemberId>, u64)) {
        for _ in 0..200 {
            if store.owner_register(&entity(id)) == Some(want.clone()) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!(
            "register for {id} never reached {want:?}, got {:?}",
            store.owner_register(&entity(id))
        );
    }

    #[tokio::test]
    async fn test_entry_write_clock_supersedes_synced_registers() {
        use crate::store::ReplicatedStore;

        let view = cluster(&["b"]);
        let store = Arc::new(MemoryStore::new(64));
        // registers persisted by a previous activation
        store
            .write_owner(&entity("e1"), Some(&member("a")), 3, Consistency::Local)
            .await
            .unwrap();
        let shared = shared_with_store(&view, Arc::clone(&store));

        let mut owners = HashMap::new();
        owners.insert(entity("e1"), member("a"));
        let active = Active::enter(
            &shared,
            candidates(&[("e1", &["a", "b"])]),
            owners,
            3,
            None,
        );

        // "a" is gone; the corrective pass hands e1 to "b" with a clock
        // above the floor, so the merge cannot drop it
        assert_eq!(active.testing_parts().3, 4);
        await_register(&store, "e1", (Some(member("b")), 4)).await;
    }

    struct FlakyStore {
        inner: MemoryStore,
        write_failures: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl crate::store::ReplicatedStore for FlakyStore {
        async fn read_candidates(
            &self,
            consistency: Consistency,
        ) -> Result<Option<CandidateMap>, crate::error::StoreError> {
            self.inner.read_candidates(consistency).await
        }

        async fn read_owner(
            &self,
            entity: &Entity,
            consistency: Consistency,
        ) -> Result<Option<crate::store::OwnerRegister>, crate::error::StoreError> {
            self.inner.read_owner(entity, consistency).await
        }

        async fn write_owner(
            &self,
            entity: &Entity,
            owner: Option<&MemberId>,
            clock: u64,
            consistency: Consistency,
        ) -> Result<(), crate::error::StoreError> {
            use std::sync::atomic::Ordering;
            if self.write_failures.load(Ordering::SeqCst) > 0 {
                self.write_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(crate::error::StoreError::Unavailable {
                    reason: "injected write failure".to_string(),
                });
            }
            self.inner.write_owner(entity, owner, clock, consistency).await
        }

        async fn remove_candidate(
            &self,
            entity: &Entity,
            member: &MemberId,
            consistency: Consistency,
        ) -> Result<(), crate::error::StoreError> {
            self.inner.remove_candidate(entity, member, consistency).await
        }

        fn watch_candidates(&self) -> tokio::sync::broadcast::Receiver<CandidateMap> {
            self.inner.watch_candidates()
        }
    }

    #[tokio::test]
    async fn test_failed_owner_write_is_reissued() {
        let view = cluster(&["a"]);
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(64),
            write_failures: std::sync::atomic::AtomicUsize::new(1),
        });
        let (tx, mut rx) = mpsc::channel::<Command>(64);
        let shared = Arc::new(Shared {
            cfg: Config::default(),
            store: Arc::clone(&store) as Arc<dyn crate::store::ReplicatedStore>,
            membership: Arc::clone(&view) as Arc<dyn crate::membership::Membership>,
            bus: Bus::new(64),
            tx,
            datacenter: "dc-default".to_string(),
            sync_generation: std::sync::atomic::AtomicU64::new(0),
        });

        let active = Active::enter(
            &shared,
            candidates(&[("e1", &["a"])]),
            HashMap::new(),
            0,
            None,
        );

        // the failed write re-enters the mailbox as a retry for that entity
        let retry = rx.recv().await.unwrap();
        match &retry {
            Command::RetryOwnerWrite { entity: e } => assert_eq!(*e, entity("e1")),
            _ => panic!("expected a retry command after the failed write"),
        }

        // handling the retry re-issues the current decision; the second
        // attempt succeeds and lands with the fresh clock
        let state = Box::new(active).handle(retry);
        assert!(matches!(state, State::Active(_)));
        await_register(&store.inner, "e1", (Some(member("a")), 2)).await;
    }
}
