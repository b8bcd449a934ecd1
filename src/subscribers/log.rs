//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints ownership events to stdout in a human-readable
//! format. This is primarily useful for development, debugging, and examples.
//!
//! ## Output format
//! ```text
//! [owner-assigned] entity=topology/node-1 owner=member-2
//! [owner-cleared] entity=topology/node-1 previous=member-2
//! [candidate-added] entity=topology/node-1 member=member-3
//! [sync-completed] entities=4
//! [datacenter-activated]
//! [cleanup-completed] member=member-2 entities=3
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Not intended for production use —
/// implement a custom [`Subscribe`] for structured logging or metrics.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::OwnerAssigned => {
                if let (Some(entity), Some(member)) = (&e.entity, &e.member) {
                    println!("[owner-assigned] entity={entity} owner={member}");
                }
            }
            EventKind::OwnerCleared => {
                if let Some(entity) = &e.entity {
                    println!("[owner-cleared] entity={entity} previous={:?}", e.member);
                }
            }
            EventKind::CandidateAdded => {
                println!("[candidate-added] entity={:?} member={:?}", e.entity, e.member);
            }
            EventKind::CandidateRemoved => {
                println!("[candidate-removed] entity={:?} member={:?}", e.entity, e.member);
            }
            EventKind::SyncCompleted => {
                println!("[sync-completed] {}", e.reason.as_deref().unwrap_or(""));
            }
            EventKind::DataCenterActivated => {
                println!("[datacenter-activated]");
            }
            EventKind::DataCenterDeactivated => {
                println!("[datacenter-deactivated]");
            }
            EventKind::CleanupStarted => {
                println!(
                    "[cleanup-started] member={:?} {}",
                    e.member,
                    e.reason.as_deref().unwrap_or("")
                );
            }
            EventKind::CleanupCompleted => {
                println!(
                    "[cleanup-completed] member={:?} {}",
                    e.member,
                    e.reason.as_deref().unwrap_or("")
                );
            }
            EventKind::ForeignDataCenterEvent => {
                println!(
                    "[foreign-datacenter] member={:?} roles={}",
                    e.member,
                    e.reason.as_deref().unwrap_or("")
                );
            }
            EventKind::StoreWriteFailed => {
                println!(
                    "[store-write-failed] entity={:?} reason={}",
                    e.entity,
                    e.reason.as_deref().unwrap_or("")
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
