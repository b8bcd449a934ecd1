//! Process-local replicated store.
//!
//! [`MemoryStore`] implements [`ReplicatedStore`] with the merge rules from
//! [`crate::store::crdt`] against plain in-process maps. It backs the test
//! suite and single-process deployments; both consistency levels behave
//! identically since there is exactly one replica.
//!
//! Candidate registration happens outside the ownership core, so this store
//! also exposes the producer-side [`MemoryStore::add_candidate`] used by
//! tests and embedding applications.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::entity::{Entity, MemberId};
use crate::error::StoreError;

use super::crdt::LwwRegister;
use super::{CandidateMap, Consistency, OwnerRegister, ReplicatedStore};

/// In-memory implementation of the replicated-store boundary.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    watch: broadcast::Sender<CandidateMap>,
}

#[derive(Default)]
struct Inner {
    candidates: Option<CandidateMap>,
    owners: HashMap<Entity, LwwRegister<String>>,
}

impl MemoryStore {
    /// Creates an empty store with the given watch-channel capacity.
    pub fn new(watch_capacity: usize) -> Self {
        let (watch, _rx) = broadcast::channel(watch_capacity.max(1));
        Self {
            inner: RwLock::new(Inner::default()),
            watch,
        }
    }

    /// Registers `member` as a candidate for `entity` and notifies watchers.
    ///
    /// This is the external registration path; the ownership core itself
    /// never adds candidates.
    pub fn add_candidate(&self, entity: &Entity, member: MemberId) {
        {
            let mut inner = self.inner.write().expect("store lock poisoned");
            inner
                .candidates
                .get_or_insert_with(CandidateMap::new)
                .entry(entity.clone())
                .or_default()
                .insert(member);
        }
        self.publish_candidates();
    }

    /// Returns one entity's raw owner register for inspection in tests:
    /// `(owner, clock)`, with `None` for the empty sentinel.
    pub fn owner_register(&self, entity: &Entity) -> Option<(Option<MemberId>, u64)> {
        let inner = self.inner.read().expect("store lock poisoned");
        inner.owners.get(entity).map(|reg| {
            let owner = match reg.value().as_str() {
                "" => None,
                name => Some(MemberId::new(name.to_string())),
            };
            (owner, reg.clock())
        })
    }

    fn publish_candidates(&self) {
        let snapshot = {
            let inner = self.inner.read().expect("store lock poisoned");
            inner.candidates.clone().unwrap_or_default()
        };
        let _ = self.watch.send(snapshot);
    }
}

#[async_trait]
impl ReplicatedStore for MemoryStore {
    async fn read_candidates(
        &self,
        _consistency: Consistency,
    ) -> Result<Option<CandidateMap>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.candidates.clone())
    }

    async fn read_owner(
        &self,
        entity: &Entity,
        _consistency: Consistency,
    ) -> Result<Option<OwnerRegister>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.owners.get(entity).map(|reg| OwnerRegister {
            owner: match reg.value().as_str() {
                "" => None,
                name => Some(MemberId::new(name.to_string())),
            },
            clock: reg.clock(),
        }))
    }

    async fn write_owner(
        &self,
        entity: &Entity,
        owner: Option<&MemberId>,
        clock: u64,
        _consistency: Consistency,
    ) -> Result<(), StoreError> {
        let value = owner.map(|m| m.as_str().to_string()).unwrap_or_default();
        let mut inner = self.inner.write().expect("store lock poisoned");
        match inner.owners.get_mut(entity) {
            Some(reg) => reg.merge(LwwRegister::new(value, clock)),
            None => {
                inner
                    .owners
                    .insert(entity.clone(), LwwRegister::new(value, clock));
            }
        }
        Ok(())
    }

    async fn remove_candidate(
        &self,
        entity: &Entity,
        member: &MemberId,
        _consistency: Consistency,
    ) -> Result<(), StoreError> {
        {
            let mut inner = self.inner.write().expect("store lock poisoned");
            // The key stays present even when its set drains; pruning
            // replicated keys is an external administrative action.
            if let Some(set) = inner
                .candidates
                .as_mut()
                .and_then(|map| map.get_mut(entity))
            {
                set.remove(member);
            }
        }
        self.publish_candidates();
        Ok(())
    }

    fn watch_candidates(&self) -> broadcast::Receiver<CandidateMap> {
        self.watch.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity() -> Entity {
        Entity::new("t", "e1")
    }

    #[tokio::test]
    async fn test_candidates_absent_until_first_registration() {
        let store = MemoryStore::new(16);
        assert!(store
            .read_candidates(Consistency::Local)
            .await
            .unwrap()
            .is_none());

        store.add_candidate(&entity(), MemberId::from("a"));
        let map = store
            .read_candidates(Consistency::Local)
            .await
            .unwrap()
            .unwrap();
        assert!(map[&entity()].contains(&MemberId::from("a")));
    }

    #[tokio::test]
    async fn test_owner_write_lww_semantics() {
        let store = MemoryStore::new(16);
        let e = entity();

        store
            .write_owner(&e, Some(&MemberId::from("a")), 1, Consistency::Local)
            .await
            .unwrap();
        store
            .write_owner(&e, Some(&MemberId::from("b")), 2, Consistency::Local)
            .await
            .unwrap();
        // stale clock must not supersede
        store
            .write_owner(&e, Some(&MemberId::from("c")), 1, Consistency::Local)
            .await
            .unwrap();

        assert_eq!(
            store.read_owner(&e, Consistency::Local).await.unwrap(),
            Some(OwnerRegister {
                owner: Some(MemberId::from("b")),
                clock: 2,
            })
        );
    }

    #[tokio::test]
    async fn test_empty_sentinel_reads_as_no_owner() {
        let store = MemoryStore::new(16);
        let e = entity();
        store
            .write_owner(&e, Some(&MemberId::from("a")), 1, Consistency::Local)
            .await
            .unwrap();
        store
            .write_owner(&e, None, 2, Consistency::Local)
            .await
            .unwrap();

        // the register itself survives the sentinel, clock included
        assert_eq!(
            store.read_owner(&e, Consistency::Local).await.unwrap(),
            Some(OwnerRegister {
                owner: None,
                clock: 2,
            })
        );
        assert_eq!(store.owner_register(&e), Some((None, 2)));
    }

    #[tokio::test]
    async fn test_remove_candidate_keeps_empty_key() {
        let store = MemoryStore::new(16);
        let e = entity();
        store.add_candidate(&e, MemberId::from("a"));
        store
            .remove_candidate(&e, &MemberId::from("a"), Consistency::Majority)
            .await
            .unwrap();

        let map = store
            .read_candidates(Consistency::Local)
            .await
            .unwrap()
            .unwrap();
        assert!(map.contains_key(&e), "drained key must remain until pruned");
        assert!(map[&e].is_empty());
    }

    #[tokio::test]
    async fn test_watch_delivers_full_snapshots() {
        let store = MemoryStore::new(16);
        let mut rx = store.watch_candidates();

        store.add_candidate(&entity(), MemberId::from("a"));
        store.add_candidate(&entity(), MemberId::from("b"));

        let first = rx.recv().await.unwrap();
        assert_eq!(first[&entity()].len(), 1);
        let second = rx.recv().await.unwrap();
        assert_eq!(second[&entity()].len(), 2, "each delivery is the full map");
    }
}
