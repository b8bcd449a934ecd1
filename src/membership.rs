//! # Cluster membership collaborator boundary.
//!
//! The supervisor consumes membership strictly through the [`Membership`]
//! trait: a point-in-time [`MembershipSnapshot`] plus a stream of
//! [`MemberEvent`]s (up / down / reachable / unreachable), each tagged with
//! the member's role set.
//!
//! ## Datacenter roles
//! Every member carries exactly one datacenter marker role, prefixed with
//! [`DATACENTER_PREFIX`] (e.g. `dc-default`, `dc-backup`). The supervisor
//! manages ownership only for members of its own datacenter; events from
//! foreign datacenters are published as anomalies and otherwise ignored.
//!
//! ## Active members
//! The "active members" set — candidates that are Up and Reachable in the
//! local datacenter — is a derived, process-local cache computed with
//! [`active_members`] and maintained incrementally from events. Membership
//! in a candidate set does not imply reachability.

use std::collections::BTreeSet;
use std::sync::RwLock;

use tokio::sync::broadcast;

use crate::entity::MemberId;

/// Prefix of datacenter marker roles.
pub const DATACENTER_PREFIX: &str = "dc-";

/// The primary datacenter: a member carrying this role self-activates
/// ownership management on start.
pub const DEFAULT_DATACENTER: &str = "dc-default";

/// A member's role set (includes exactly one `dc-` marker role).
pub type RoleSet = BTreeSet<String>;

/// Returns the first datacenter marker role in the set, if any.
pub fn datacenter_role(roles: &RoleSet) -> Option<&str> {
    roles
        .iter()
        .map(String::as_str)
        .find(|r| r.starts_with(DATACENTER_PREFIX))
}

/// Membership/reachability change kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberEventKind {
    /// Member joined the cluster.
    Up,
    /// Member left the cluster.
    Down,
    /// Previously unreachable member is reachable again.
    Reachable,
    /// Member is partitioned away.
    Unreachable,
}

/// One membership change, tagged with the member's role set.
#[derive(Debug, Clone)]
pub struct MemberEvent {
    /// The affected member.
    pub member: MemberId,
    /// The member's role set (includes its datacenter marker).
    pub roles: RoleSet,
    /// What happened.
    pub kind: MemberEventKind,
}

impl MemberEvent {
    /// True for events that make the member eligible for ownership
    /// (`Up` / `Reachable`).
    pub fn makes_reachable(&self) -> bool {
        matches!(self.kind, MemberEventKind::Up | MemberEventKind::Reachable)
    }
}

/// Point-in-time view of cluster membership.
#[derive(Debug, Clone, Default)]
pub struct MembershipSnapshot {
    /// All known members with their role sets.
    pub members: Vec<(MemberId, RoleSet)>,
    /// Members the reachability detector currently reports unreachable.
    pub unreachable: BTreeSet<MemberId>,
}

/// Computes the active-members set for one datacenter: members whose role
/// set contains `datacenter`, minus currently-unreachable ones.
pub fn active_members(snapshot: &MembershipSnapshot, datacenter: &str) -> BTreeSet<MemberId> {
    snapshot
        .members
        .iter()
        .filter(|(_, roles)| roles.iter().any(|r| r == datacenter))
        .map(|(member, _)| member.clone())
        .filter(|member| !snapshot.unreachable.contains(member))
        .collect()
}

/// Membership/reachability notifier consumed by the supervisor.
pub trait Membership: Send + Sync + 'static {
    /// Current membership state.
    fn snapshot(&self) -> MembershipSnapshot;

    /// Stream of subsequent membership events.
    fn subscribe(&self) -> broadcast::Receiver<MemberEvent>;
}

/// In-memory membership notifier.
///
/// Backs tests and single-process deployments; a real deployment adapts its
/// cluster library (gossip, k8s watches, …) to [`Membership`] instead.
pub struct ClusterView {
    inner: RwLock<Inner>,
    tx: broadcast::Sender<MemberEvent>,
}

#[derive(Default)]
struct Inner {
    members: Vec<(MemberId, RoleSet)>,
    unreachable: BTreeSet<MemberId>,
}

impl ClusterView {
    /// Creates an empty view with the given event channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            inner: RwLock::new(Inner::default()),
            tx,
        }
    }

    /// Registers a member as Up and publishes the event.
    pub fn member_up(&self, member: MemberId, roles: RoleSet) {
        {
            let mut inner = self.inner.write().expect("membership lock poisoned");
            inner.members.retain(|(m, _)| *m != member);
            inner.members.push((member.clone(), roles.clone()));
            inner.unreachable.remove(&member);
        }
        let _ = self.tx.send(MemberEvent {
            member,
            roles,
            kind: MemberEventKind::Up,
        });
    }

    /// Removes a member and publishes the Down event.
    pub fn member_down(&self, member: &MemberId) {
        let Some(roles) = self.remove_member(member) else {
            return;
        };
        let _ = self.tx.send(MemberEvent {
            member: member.clone(),
            roles,
            kind: MemberEventKind::Down,
        });
    }

    /// Marks a member unreachable and publishes the event.
    pub fn member_unreachable(&self, member: &MemberId) {
        let Some(roles) = self.roles_of(member) else {
            return;
        };
        self.inner
            .write()
            .expect("membership lock poisoned")
            .unreachable
            .insert(member.clone());
        let _ = self.tx.send(MemberEvent {
            member: member.clone(),
            roles,
            kind: MemberEventKind::Unreachable,
        });
    }

    /// Marks a member reachable again and publishes the event.
    pub fn member_reachable(&self, member: &MemberId) {
        let Some(roles) = self.roles_of(member) else {
            return;
        };
        self.inner
            .write()
            .expect("membership lock poisoned")
            .unreachable
            .remove(member);
        let _ = self.tx.send(MemberEvent {
            member: member.clone(),
            roles,
            kind: MemberEventKind::Reachable,
        });
    }

    fn roles_of(&self, member: &MemberId) -> Option<RoleSet> {
        let inner = self.inner.read().expect("membership lock poisoned");
        inner
            .members
            .iter()
            .find(|(m, _)| m == member)
            .map(|(_, roles)| roles.clone())
    }

    fn remove_member(&self, member: &MemberId) -> Option<RoleSet> {
        let mut inner = self.inner.write().expect("membership lock poisoned");
        let roles = inner
            .members
            .iter()
            .find(|(m, _)| m == member)
            .map(|(_, roles)| roles.clone())?;
        inner.members.retain(|(m, _)| m != member);
        inner.unreachable.remove(member);
        Some(roles)
    }
}

impl Membership for ClusterView {
    fn snapshot(&self) -> MembershipSnapshot {
        let inner = self.inner.read().expect("membership lock poisoned");
        MembershipSnapshot {
            members: inner.members.clone(),
            unreachable: inner.unreachable.clone(),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<MemberEvent> {
        self.tx.subscribe()
    }
}

/// Builds a role set from string slices.
pub fn roles<const N: usize>(parts: [&str; N]) -> RoleSet {
    parts.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datacenter_role_extraction() {
        let r = roles(["member-1", "dc-default"]);
        assert_eq!(datacenter_role(&r), Some("dc-default"));
        assert_eq!(datacenter_role(&roles(["member-1"])), None);
    }

    #[test]
    fn test_active_members_filters_datacenter_and_unreachable() {
        let view = ClusterView::new(16);
        view.member_up(MemberId::from("a"), roles(["a", "dc-default"]));
        view.member_up(MemberId::from("b"), roles(["b", "dc-default"]));
        view.member_up(MemberId::from("c"), roles(["c", "dc-backup"]));
        view.member_unreachable(&MemberId::from("b"));

        let active = active_members(&view.snapshot(), "dc-default");
        assert!(active.contains(&MemberId::from("a")));
        assert!(!active.contains(&MemberId::from("b")), "unreachable is not active");
        assert!(!active.contains(&MemberId::from("c")), "foreign datacenter is not active");
    }

    #[tokio::test]
    async fn test_view_publishes_events() {
        let view = ClusterView::new(16);
        let mut rx = view.subscribe();

        view.member_up(MemberId::from("a"), roles(["a", "dc-default"]));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, MemberEventKind::Up);
        assert!(ev.makes_reachable());

        view.member_down(&MemberId::from("a"));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, MemberEventKind::Down);
        assert!(!ev.makes_reachable());
    }

    #[test]
    fn test_down_for_unknown_member_is_noop() {
        let view = ClusterView::new(16);
        view.member_down(&MemberId::from("ghost"));
        assert!(view.snapshot().members.is_empty());
    }
}
