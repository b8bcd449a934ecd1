//! Merge rules the replication substrate must provide.
//!
//! Two replicated types back the ownership core:
//!
//! - **Owner register**: [`LwwRegister`] — last-writer-wins on a logical
//!   clock. The supervisor is the only writer for its datacenter and bumps
//!   the clock on every write, so merges always converge on its most recent
//!   decision without relying on synchronized wall clocks.
//! - **Candidate sets**: add-wins union via [`merge_candidate_sets`].
//!   Concurrent add/remove of the same member resolves to "present";
//!   removals win only over the adds they causally observed, which the
//!   substrate encodes by shipping full per-replica states.
//!
//! All merges are commutative, associative, and idempotent.

use std::collections::BTreeSet;

use crate::entity::MemberId;

/// Last-writer-wins register cell.
///
/// Ties on `clock` keep the current value, which is safe under the
/// single-writer discipline (a writer never reuses a clock value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LwwRegister<T> {
    value: T,
    clock: u64,
}

impl<T> LwwRegister<T> {
    /// Creates a register holding `value` at logical time `clock`.
    pub fn new(value: T, clock: u64) -> Self {
        Self { value, clock }
    }

    /// Current value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Logical clock of the current value.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Merges an incoming replica state into this one: higher clock wins.
    pub fn merge(&mut self, incoming: LwwRegister<T>) {
        if incoming.clock > self.clock {
            *self = incoming;
        }
    }
}

/// Add-wins merge of two candidate-set replicas: the union survives.
pub fn merge_candidate_sets(a: &BTreeSet<MemberId>, b: &BTreeSet<MemberId>) -> BTreeSet<MemberId> {
    a.union(b).cloned().collect()
}
