//! # Candidate cleaner.
//!
//! Short-lived worker that strips a departing member's candidacy from
//! every entity listing it. Spawned by the active supervisor with a
//! majority-consistency snapshot of the candidate map; issues one
//! majority-consistency removal per affected entity, counts completions
//! (success and failure alike), and answers the original requester when
//! every removal has resolved. One cleaner per request, then it is gone.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};

use crate::entity::{Entity, MemberId};
use crate::events::{Event, EventKind};
use crate::store::{CandidateMap, Consistency};

use super::command::{CandidatesCleared, Reply};
use super::Shared;

pub(crate) struct CandidateCleaner {
    shared: Arc<Shared>,
}

impl CandidateCleaner {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Removes `member` from every candidate set in `map` that lists it,
    /// then reports the affected entities back to the requester.
    pub(crate) async fn run(
        self,
        member: MemberId,
        map: CandidateMap,
        reply: Reply<CandidatesCleared>,
    ) {
        let targets: Vec<Entity> = map
            .iter()
            .filter(|(_, candidates)| candidates.contains(&member))
            .map(|(entity, _)| entity.clone())
            .collect();

        self.shared.bus.publish(
            Event::new(EventKind::CleanupStarted)
                .with_member(member.clone())
                .with_reason(format!("entities={}", targets.len())),
        );

        let mut removals: FuturesUnordered<_> = targets
            .iter()
            .map(|entity| {
                let ctx = Arc::clone(&self.shared);
                let entity = entity.clone();
                let member = member.clone();
                async move {
                    let removal = tokio::time::timeout(
                        ctx.cfg.clear_remove_timeout,
                        ctx.store
                            .remove_candidate(&entity, &member, Consistency::Majority),
                    )
                    .await;
                    // A failed or timed-out removal still counts as resolved;
                    // the requester is told which entities were targeted, not
                    // guaranteed durability of each write.
                    if let Ok(Err(err)) = &removal {
                        ctx.bus.publish(
                            Event::new(EventKind::StoreWriteFailed)
                                .with_entity(entity)
                                .with_reason(err.to_string()),
                        );
                    }
                }
            })
            .collect();

        while removals.next().await.is_some() {}

        self.shared.bus.publish(
            Event::new(EventKind::CleanupCompleted)
                .with_member(member.clone())
                .with_reason(format!("entities={}", targets.len())),
        );
        let _ = reply.send(Ok(CandidatesCleared {
            member,
            entities: targets,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::entity::Entity;
    use crate::events::Bus;
    use crate::membership::ClusterView;
    use crate::store::{MemoryStore, ReplicatedStore};
    use crate::supervisor::command::Command;
    use std::sync::atomic::AtomicU64;
    use tokio::sync::{mpsc, oneshot};

    fn shared(store: Arc<MemoryStore>) -> Arc<Shared> {
        let (tx, _rx) = mpsc::channel::<Command>(16);
        Arc::new(Shared {
            cfg: Config::default(),
            store,
            membership: Arc::new(ClusterView::new(16)),
            bus: Bus::new(16),
            tx,
            datacenter: "dc-default".to_string(),
            sync_generation: AtomicU64::new(0),
        })
    }

    #[tokio::test]
    async fn test_cleanup_removes_member_from_every_entity() {
        let store = Arc::new(MemoryStore::new(16));
        let e1 = Entity::new("test", "e1");
        let e2 = Entity::new("test", "e2");
        let e3 = Entity::new("test", "e3");
        store.add_candidate(&e1, MemberId::from("a"));
        store.add_candidate(&e1, MemberId::from("b"));
        store.add_candidate(&e2, MemberId::from("a"));
        store.add_candidate(&e3, MemberId::from("b"));

        let map = store
            .read_candidates(Consistency::Majority)
            .await
            .unwrap()
            .unwrap();
        let (reply, rx) = oneshot::channel();
        CandidateCleaner::new(shared(Arc::clone(&store)))
            .run(MemberId::from("a"), map, reply)
            .await;

        let cleared = rx.await.unwrap().unwrap();
        assert_eq!(cleared.member, MemberId::from("a"));
        let mut entities = cleared.entities;
        entities.sort();
        assert_eq!(entities, vec![e1.clone(), e2.clone()]);

        let after = store
            .read_candidates(Consistency::Majority)
            .await
            .unwrap()
            .unwrap();
        assert!(!after[&e1].contains(&MemberId::from("a")));
        assert!(after[&e2].is_empty());
        assert!(after[&e3].contains(&MemberId::from("b")));
    }

    #[tokio::test]
    async fn test_cleanup_with_no_candidacies_resolves_immediately() {
        let store = Arc::new(MemoryStore::new(16));
        store.add_candidate(&Entity::new("test", "e1"), MemberId::from("b"));

        let map = store
            .read_candidates(Consistency::Majority)
            .await
            .unwrap()
            .unwrap();
        let (reply, rx) = oneshot::channel();
        CandidateCleaner::new(shared(store))
            .run(MemberId::from("ghost"), map, reply)
            .await;

        let cleared = rx.await.unwrap().unwrap();
        assert!(cleared.entities.is_empty());
    }
}
