//! # Idle supervisor.
//!
//! The initial per-process state. A member of the default datacenter never
//! sits here — the driver self-activates it on start; members of other
//! datacenters wait for an explicit `ActivateDataCenter` (datacenter
//! failover) and otherwise answer every read with an explicit
//! "inactive" error.

use std::sync::Arc;

use super::command::Command;
use super::{fail_inactive, Shared, State};
use crate::supervisor::sync::Syncer;

/// Idle state: ownership management is not running locally.
pub(crate) struct Idle;

impl Idle {
    pub(crate) fn handle(self, shared: &Arc<Shared>, cmd: Command) -> State {
        match cmd {
            Command::Activate { reply } => {
                let waiters = reply.into_iter().collect();
                Syncer::start(shared, waiters)
            }
            // Already idle; deactivation is idempotent.
            Command::Deactivate { reply } => {
                let _ = reply.send(Ok(()));
                State::Idle(self)
            }
            cmd => {
                // Queries fail fast; collaborator notifications and stale
                // sync continuations are not actionable while idle.
                fail_inactive(cmd, "idle");
                State::Idle(self)
            }
        }
    }
}
