//! # Ownership supervisor core.
//!
//! One supervisor instance runs per process. It is a three-state machine
//! driven by a single mailbox:
//!
//! ```text
//!            Activate                    reads done
//!   Idle ───────────────▶ Synchronizing ───────────▶ Active
//!    ▲                         │                        │
//!    └─────────────────────────┴────── Deactivate ──────┘
//! ```
//!
//! - [`idle::Idle`]: ownership management not running; queries fail fast.
//! - [`sync::Syncer`]: bootstrap reads in flight; queries fail fast.
//! - [`active::Active`]: authoritative; processes candidate and membership
//!   changes and publishes owner decisions.
//!
//! Members of the default datacenter self-activate on start; members of
//! other datacenters stay idle until an explicit activation (datacenter
//! failover).
//!
//! All state transitions happen on the single driver task in [`run`];
//! handlers never await. Store I/O is spawned with a bounded timeout and
//! either re-enters the mailbox as a command or is fire-and-forget.
//!
//! [`run`]: OwnershipSupervisor::run

mod active;
mod cleaner;
mod command;
mod handle;
mod idle;
mod sync;

pub use command::{CandidatesCleared, EntityView, OwnershipView};
pub use handle::SupervisorHandle;

use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::SupervisorError;
use crate::events::Bus;
use crate::membership::{datacenter_role, Membership, RoleSet, DEFAULT_DATACENTER};
use crate::store::ReplicatedStore;
use crate::subscribers::{Subscribe, SubscriberSet};

use active::Active;
use command::Command;
use idle::Idle;
use sync::Syncer;

/// Context shared between the driver task and its spawned store I/O.
pub(crate) struct Shared {
    pub(crate) cfg: Config,
    pub(crate) store: Arc<dyn ReplicatedStore>,
    pub(crate) membership: Arc<dyn Membership>,
    pub(crate) bus: Bus,
    /// Mailbox sender for re-entering spawned read results.
    pub(crate) tx: mpsc::Sender<Command>,
    /// The local datacenter marker role (e.g. `dc-default`).
    pub(crate) datacenter: String,
    /// Bumped per sync attempt; stale read results are dropped by it.
    pub(crate) sync_generation: AtomicU64,
}

/// The supervisor state machine. States consume themselves on every
/// command and return the successor, so a transition can never be
/// half-applied.
pub(crate) enum State {
    Idle(Idle),
    Syncing(Syncer),
    Active(Box<Active>),
}

impl State {
    fn handle(self, shared: &Arc<Shared>, cmd: Command) -> State {
        match self {
            State::Idle(state) => state.handle(shared, cmd),
            State::Syncing(state) => state.handle(shared, cmd),
            State::Active(state) => state.handle(cmd),
        }
    }
}

/// Answers a request-bearing command with an "inactive" error; commands
/// without a reply channel are dropped silently.
pub(crate) fn fail_inactive(cmd: Command, state: &'static str) {
    match cmd {
        Command::GetEntity { reply, .. } => {
            let _ = reply.send(Err(SupervisorError::Inactive { state }));
        }
        Command::GetEntities { reply } => {
            let _ = reply.send(Err(SupervisorError::Inactive { state }));
        }
        Command::GetEntityOwner { reply, .. } => {
            let _ = reply.send(Err(SupervisorError::Inactive { state }));
        }
        Command::ClearCandidates { reply, .. } => {
            let _ = reply.send(Err(SupervisorError::Inactive { state }));
        }
        Command::Activate { .. }
        | Command::Deactivate { .. }
        | Command::CandidatesChanged(_)
        | Command::Member(_)
        | Command::SyncCandidates { .. }
        | Command::SyncOwner { .. }
        | Command::RetryOwnerWrite { .. } => {}
    }
}

/// The per-process ownership supervisor.
///
/// Construct with [`OwnershipSupervisor::new`], submit requests through
/// [`OwnershipSupervisor::handle`], observe decisions through
/// [`OwnershipSupervisor::bus`] or registered [`Subscribe`]rs, and drive it
/// with [`OwnershipSupervisor::run`] until the token is cancelled.
pub struct OwnershipSupervisor {
    shared: Arc<Shared>,
    rx: Mutex<Option<mpsc::Receiver<Command>>>,
    subscribers: Mutex<Vec<Arc<dyn Subscribe>>>,
}

impl OwnershipSupervisor {
    /// Creates a supervisor for a member carrying `local_roles`.
    ///
    /// Fails with [`SupervisorError::MissingDatacenterRole`] when the role
    /// set carries no `dc-` marker; a member without a datacenter cannot
    /// participate in ownership.
    pub fn new(
        cfg: Config,
        store: Arc<dyn ReplicatedStore>,
        membership: Arc<dyn Membership>,
        local_roles: &RoleSet,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Result<Self, SupervisorError> {
        let datacenter = datacenter_role(local_roles)
            .ok_or(SupervisorError::MissingDatacenterRole)?
            .to_string();

        let bus = Bus::new(cfg.bus_capacity);
        let (tx, rx) = mpsc::channel(cfg.mailbox_capacity.max(1));

        let shared = Arc::new(Shared {
            cfg,
            store,
            membership,
            bus,
            tx,
            datacenter,
            sync_generation: AtomicU64::new(0),
        });

        Ok(Self {
            shared,
            rx: Mutex::new(Some(rx)),
            subscribers: Mutex::new(subscribers),
        })
    }

    /// Returns a cloneable request handle.
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            tx: self.shared.tx.clone(),
        }
    }

    /// Returns the ownership event bus.
    pub fn bus(&self) -> &Bus {
        &self.shared.bus
    }

    /// Drives the supervisor until `token` is cancelled.
    ///
    /// Subscribes to candidate-store notifications and membership events,
    /// starts the subscriber fan-out, self-activates when the local member
    /// belongs to the default datacenter, then processes the mailbox.
    /// Calling `run` a second time returns immediately.
    pub async fn run(&self, token: CancellationToken) {
        let Some(mut rx) = self.rx.lock().expect("supervisor lock poisoned").take() else {
            return;
        };

        // Subscribe before the first command is processed so no change
        // notification can fall between bootstrap and steady state.
        let mut candidates_rx = self.shared.store.watch_candidates();
        let mut member_rx = self.shared.membership.subscribe();

        let fanout = self.spawn_fanout(token.clone());

        let mut state = if self.shared.datacenter == DEFAULT_DATACENTER {
            Syncer::start(&self.shared, Vec::new())
        } else {
            State::Idle(Idle)
        };

        let mut candidates_open = true;
        let mut members_open = true;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,

                cmd = rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    state = state.handle(&self.shared, cmd);
                }

                changed = candidates_rx.recv(), if candidates_open => {
                    match changed {
                        Ok(map) => {
                            state = state.handle(&self.shared, Command::CandidatesChanged(map));
                        }
                        // Skipped deliveries are harmless: the next one
                        // carries the full map again.
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => candidates_open = false,
                    }
                }

                event = member_rx.recv(), if members_open => {
                    match event {
                        Ok(event) => {
                            state = state.handle(&self.shared, Command::Member(event));
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => members_open = false,
                    }
                }
            }
        }

        if let Some(fanout) = fanout {
            let _ = fanout.await;
        }
    }

    /// Spawns the bus-to-subscriber forwarder, if any subscribers were
    /// registered. The forwarder drains until cancellation, then shuts the
    /// set down gracefully.
    fn spawn_fanout(&self, token: CancellationToken) -> Option<tokio::task::JoinHandle<()>> {
        let subs = std::mem::take(&mut *self.subscribers.lock().expect("supervisor lock poisoned"));
        if subs.is_empty() {
            return None;
        }
        let set = SubscriberSet::new(subs);
        let mut bus_rx = self.shared.bus.subscribe();

        Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = bus_rx.recv() => match event {
                        Ok(event) => set.emit(&event),
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            set.shutdown().await;
        }))
    }
}
