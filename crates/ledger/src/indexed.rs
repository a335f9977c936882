//! Sequence-backed inventory ledger with a derived position index.

use std::collections::HashMap;

use tracing::{debug, error};

use stocklink_core::ItemCode;

use crate::entry::Entry;
use crate::status::{AddStatus, ChangeStatus, GroupStatus, RemovalStatus};

/// Ordered sequence of entries plus a derived code-to-position index.
///
/// This is the representation used where the whole collection is pushed to
/// dependents as one unit: only the sequence travels, and the index is
/// re-derived on the receiving side.
///
/// Invariants: the index is a bijection between present codes and valid
/// positions, `sequence[index[code]].code == code` for every indexed code,
/// and the index and sequence have equal length. The index is derived state —
/// it never survives a wholesale sequence replacement; see
/// [`IndexedLedger::replace_sequence`].
#[derive(Debug, Clone, Default)]
pub struct IndexedLedger {
    sequence: Vec<Entry>,
    index: HashMap<ItemCode, usize>,
}

impl PartialEq for IndexedLedger {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for IndexedLedger {}

impl IndexedLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger seeded from an initial sequence. The index is derived
    /// immediately; duplicate codes in the input are a caller-contract
    /// violation.
    pub fn from_sequence(sequence: Vec<Entry>) -> Self {
        let mut ledger = Self {
            sequence,
            index: HashMap::new(),
        };
        ledger.rebuild_index();
        ledger
    }

    /// Same contract as [`crate::Ledger::apply_delta`], over the
    /// sequence-plus-index representation.
    ///
    /// A delta on an absent code appends a zero-quantity entry first, so
    /// every code touched gets a stable position at the end of the sequence.
    pub fn apply_delta(&mut self, code: &ItemCode, delta: i64) -> ChangeStatus {
        if !self.contains(code) {
            self.sequence.push(Entry::new(code.clone(), 0));
            self.index.insert(code.clone(), self.sequence.len() - 1);
        }

        let Some(&position) = self.index.get(code) else {
            error!(code = %code, "index lookup failed for a just-inserted code");
            debug_assert!(false, "index diverged from sequence");
            return ChangeStatus::CouldNotMakeChange;
        };

        self.sequence[position].quantity += delta;
        let quantity = self.sequence[position].quantity;

        if quantity <= 0 {
            debug!(code = %code, quantity, "non-positive quantity, removing entry");

            if self.remove(code) != RemovalStatus::Success {
                error!(code = %code, "removal of a just-present entry failed");
                debug_assert!(false, "entry vanished between insert and removal");
                return ChangeStatus::CouldNotMakeChange;
            }
        }

        ChangeStatus::Success
    }

    /// Apply each delta in input order, collecting one status per entry.
    /// Same contract as [`crate::Ledger::apply_delta_group`].
    pub fn apply_delta_group(&mut self, changes: &[Entry]) -> (GroupStatus, Vec<ChangeStatus>) {
        let mut statuses = Vec::with_capacity(changes.len());
        let mut group_status = GroupStatus::AllSuccessful;

        for entry in changes {
            let status = self.apply_delta(&entry.code, entry.quantity);
            if status != ChangeStatus::Success {
                group_status = GroupStatus::SomeChangesLost;
            }
            statuses.push(status);
        }

        (group_status, statuses)
    }

    /// Map-keyed variant of [`IndexedLedger::apply_delta_group`]; callers
    /// pre-sum duplicate codes, as with the map-backed ledger.
    pub fn apply_delta_group_map(
        &mut self,
        changes: &HashMap<ItemCode, i64>,
    ) -> (GroupStatus, Vec<ChangeStatus>) {
        let mut statuses = Vec::with_capacity(changes.len());
        let mut group_status = GroupStatus::AllSuccessful;

        for (code, delta) in changes {
            let status = self.apply_delta(code, *delta);
            if status != ChangeStatus::Success {
                group_status = GroupStatus::SomeChangesLost;
            }
            statuses.push(status);
        }

        (group_status, statuses)
    }

    /// Append a brand-new entry, failing if the code is already present.
    pub fn add_new(&mut self, entry: Entry) -> AddStatus {
        if self.contains(&entry.code) {
            return AddStatus::ItemAlreadyInInventory;
        }

        self.index.insert(entry.code.clone(), self.sequence.len());
        self.sequence.push(entry);
        AddStatus::Success
    }

    /// Delete the entry for `code` and rebuild the whole index.
    ///
    /// Removal from the middle shifts every later position, so the index is
    /// re-derived rather than patched in place. O(n) per removal.
    pub fn remove(&mut self, code: &ItemCode) -> RemovalStatus {
        let Some(&position) = self.index.get(code) else {
            return RemovalStatus::ItemNotInInventory;
        };

        self.sequence.remove(position);
        self.rebuild_index();
        RemovalStatus::Success
    }

    /// Remove each code independently, one status per input code, order
    /// preserved.
    pub fn remove_group(&mut self, codes: &[ItemCode]) -> Vec<RemovalStatus> {
        codes.iter().map(|code| self.remove(code)).collect()
    }

    /// Clear the index and re-derive it from the sequence.
    ///
    /// Must be called whenever the sequence has been overwritten from an
    /// external source; the index never survives a bulk replacement.
    pub fn rebuild_index(&mut self) {
        self.index.clear();
        for (position, entry) in self.sequence.iter().enumerate() {
            self.index.insert(entry.code.clone(), position);
        }

        if self.index.len() != self.sequence.len() {
            error!(
                indexed = self.index.len(),
                stored = self.sequence.len(),
                "sequence contains duplicate codes"
            );
            debug_assert!(false, "index/sequence length mismatch after rebuild");
        }
    }

    /// Overwrite the sequence wholesale and re-derive the index before
    /// anything can observe the new contents.
    pub fn replace_sequence(&mut self, sequence: Vec<Entry>) {
        self.sequence = sequence;
        self.rebuild_index();
    }

    /// Quantity stored for `code`; zero when absent.
    pub fn quantity_of(&self, code: &ItemCode) -> i64 {
        match self.index.get(code) {
            Some(&position) => self.sequence[position].quantity,
            None => 0,
        }
    }

    pub fn contains(&self, code: &ItemCode) -> bool {
        self.index.contains_key(code)
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.sequence.len(), self.index.len());
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// The ordered sequence, as replicated to dependents.
    pub fn sequence(&self) -> &[Entry] {
        &self.sequence
    }
}

impl core::fmt::Display for IndexedLedger {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "{{")?;
        for entry in &self.sequence {
            writeln!(f, "\t{entry}")?;
        }
        writeln!(f, "}}")
    }
}
