//! Push-replication strategy: authoritative sequence, passive replicas.
//!
//! Only the host mutates. The transport watches the host's sequence and
//! ships the whole thing to every replica whenever its contents change; a
//! replica's only job is to install the new sequence and re-derive its
//! lookup index before anyone reads through it.

use std::collections::HashMap;

use tracing::{debug, warn};

use stocklink_core::{InventoryId, ItemCode};
use stocklink_ledger::{
    AddStatus, ChangeStatus, Entry, GroupStatus, IndexedLedger, RemovalStatus,
};

use crate::channel::{ChannelError, InMemorySink};
use crate::{debug_warn_non_positive, debug_warn_zero_quantities};

/// Outbound half of the whole-collection replication channel.
///
/// The in-memory implementation is [`InMemorySink<Vec<Entry>>`]; a real
/// transport would fan the sequence out to every connected replica.
pub trait SequenceSink: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn replicate(&self, sequence: Vec<Entry>) -> Result<(), Self::Error>;
}

impl SequenceSink for InMemorySink<Vec<Entry>> {
    type Error = ChannelError;

    fn replicate(&self, sequence: Vec<Entry>) -> Result<(), Self::Error> {
        self.push(sequence)
    }
}

/// The authoritative owner of a sequence-backed inventory.
///
/// Every mutating entry point ends by comparing the sequence against the
/// last replicated copy and publishing it if the contents changed, so
/// replicas converge without any per-entry messaging.
#[derive(Debug)]
pub struct ReplicatedInventoryHost<S: SequenceSink> {
    inventory_id: InventoryId,
    ledger: IndexedLedger,
    sink: S,
    last_replicated: Vec<Entry>,
}

impl<S: SequenceSink> ReplicatedInventoryHost<S> {
    pub fn new(inventory_id: InventoryId, ledger: IndexedLedger, sink: S) -> Self {
        let last_replicated = ledger.sequence().to_vec();
        Self {
            inventory_id,
            ledger,
            sink,
            last_replicated,
        }
    }

    pub fn inventory_id(&self) -> InventoryId {
        self.inventory_id
    }

    pub fn ledger(&self) -> &IndexedLedger {
        &self.ledger
    }

    pub fn apply_delta(&mut self, code: &ItemCode, delta: i64) -> ChangeStatus {
        let status = self.ledger.apply_delta(code, delta);
        self.replicate_if_changed();
        status
    }

    pub fn modify(&mut self, changes: &[Entry]) -> (GroupStatus, Vec<ChangeStatus>) {
        debug_warn_zero_quantities(changes);
        let result = self.ledger.apply_delta_group(changes);
        self.replicate_if_changed();
        result
    }

    /// Map-keyed variant of [`Self::modify`]; callers pre-sum duplicate
    /// codes.
    pub fn modify_map(
        &mut self,
        changes: &HashMap<ItemCode, i64>,
    ) -> (GroupStatus, Vec<ChangeStatus>) {
        let result = self.ledger.apply_delta_group_map(changes);
        self.replicate_if_changed();
        result
    }

    pub fn add_items(&mut self, items: &[Entry]) -> (GroupStatus, Vec<ChangeStatus>) {
        debug_warn_non_positive(items, "adding");
        self.modify(items)
    }

    pub fn remove_items(&mut self, items: &[Entry]) -> (GroupStatus, Vec<ChangeStatus>) {
        debug_warn_non_positive(items, "removing");
        let flipped: Vec<Entry> = items.iter().map(Entry::negated).collect();
        self.modify(&flipped)
    }

    pub fn add_new(&mut self, entry: Entry) -> AddStatus {
        let status = self.ledger.add_new(entry);
        self.replicate_if_changed();
        status
    }

    pub fn remove(&mut self, code: &ItemCode) -> RemovalStatus {
        let status = self.ledger.remove(code);
        self.replicate_if_changed();
        status
    }

    pub fn remove_group(&mut self, codes: &[ItemCode]) -> Vec<RemovalStatus> {
        let statuses = self.ledger.remove_group(codes);
        self.replicate_if_changed();
        statuses
    }

    fn replicate_if_changed(&mut self) {
        if self.ledger.sequence() == self.last_replicated.as_slice() {
            return;
        }

        self.last_replicated = self.ledger.sequence().to_vec();
        debug!(entries = self.last_replicated.len(), "replicating updated sequence");
        if let Err(error) = self.sink.replicate(self.last_replicated.clone()) {
            warn!(?error, "failed to replicate sequence");
        }
    }
}

impl<S: SequenceSink> core::fmt::Display for ReplicatedInventoryHost<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.ledger, f)
    }
}

/// A passive mirror of a replicated inventory.
///
/// No local mutation path exists, so there is nothing to reconcile: the only
/// obligation is that [`Self::on_sequence_replicated`] runs before any query
/// against the new sequence, which it guarantees by rebuilding the index
/// before returning.
#[derive(Debug, Default)]
pub struct ReplicaInventory {
    ledger: IndexedLedger,
}

impl ReplicaInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly replicated sequence.
    ///
    /// The index never survives the replacement; it is re-derived here,
    /// synchronously, so readers cannot observe a stale mapping.
    pub fn on_sequence_replicated(&mut self, sequence: Vec<Entry>) {
        debug!(entries = sequence.len(), "received new sequence, rebuilding index");
        self.ledger.replace_sequence(sequence);
    }

    pub fn quantity_of(&self, code: &ItemCode) -> i64 {
        self.ledger.quantity_of(code)
    }

    pub fn contains(&self, code: &ItemCode) -> bool {
        self.ledger.contains(code)
    }

    pub fn len(&self) -> usize {
        self.ledger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty()
    }

    pub fn sequence(&self) -> &[Entry] {
        self.ledger.sequence()
    }
}

impl core::fmt::Display for ReplicaInventory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.ledger, f)
    }
}
