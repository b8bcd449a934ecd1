//! # Request facade for external callers.
//!
//! [`SupervisorHandle`] is the inbound interface of the ownership core:
//! cloneable, cheap, and safe to use from any task. Every method sends one
//! typed command into the supervisor mailbox and awaits the reply on a
//! oneshot channel.
//!
//! Read requests issued while the supervisor is idle or synchronizing fail
//! fast with [`SupervisorError::Inactive`]; callers retry later.

use tokio::sync::{mpsc, oneshot};

use crate::entity::{Entity, MemberId};
use crate::error::SupervisorError;

use super::command::{CandidatesCleared, Command, EntityView, OwnershipView};

/// Handle for submitting requests to a supervisor instance.
#[derive(Clone)]
pub struct SupervisorHandle {
    pub(crate) tx: mpsc::Sender<Command>,
}

impl SupervisorHandle {
    /// Returns one entity's owner and candidate set.
    pub async fn get_entity(&self, entity: Entity) -> Result<EntityView, SupervisorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::GetEntity { entity, reply }).await?;
        Self::recv(rx).await
    }

    /// Decodes an external `kind/id` path and returns that entity's view.
    pub async fn get_entity_by_path(&self, path: &str) -> Result<EntityView, SupervisorError> {
        self.get_entity(Entity::parse(path)?).await
    }

    /// Returns the full owner and candidate maps.
    pub async fn get_entities(&self) -> Result<OwnershipView, SupervisorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::GetEntities { reply }).await?;
        Self::recv(rx).await
    }

    /// Returns one entity's owner (`None` while unowned).
    pub async fn get_entity_owner(
        &self,
        entity: Entity,
    ) -> Result<Option<MemberId>, SupervisorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::GetEntityOwner { entity, reply }).await?;
        Self::recv(rx).await
    }

    /// Strips `member`'s candidacy from every entity that lists it.
    ///
    /// Resolves only after the spawned cleaner has issued every removal
    /// (immediately when the member is no candidate anywhere).
    pub async fn clear_candidates_for(
        &self,
        member: MemberId,
    ) -> Result<CandidatesCleared, SupervisorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ClearCandidates { member, reply }).await?;
        Self::recv(rx).await
    }

    /// Activates ownership management for the local datacenter
    /// (datacenter failover). Resolves once synchronization completed and
    /// the supervisor is active. Idempotent when already active.
    pub async fn activate_datacenter(&self) -> Result<(), SupervisorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Activate { reply: Some(reply) }).await?;
        Self::recv(rx).await
    }

    /// Deactivates ownership management, discarding in-memory state.
    /// Idempotent when already idle.
    pub async fn deactivate_datacenter(&self) -> Result<(), SupervisorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Deactivate { reply }).await?;
        Self::recv(rx).await
    }

    async fn send(&self, cmd: Command) -> Result<(), SupervisorError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| SupervisorError::MailboxClosed)
    }

    async fn recv<T>(
        rx: oneshot::Receiver<Result<T, SupervisorError>>,
    ) -> Result<T, SupervisorError> {
        rx.await.map_err(|_| SupervisorError::ReplyDropped)?
    }
}
