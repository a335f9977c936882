//! Map-backed inventory ledger.

use std::collections::HashMap;

use tracing::{debug, error};

use stocklink_core::ItemCode;

use crate::entry::Entry;
use crate::status::{AddStatus, ChangeStatus, GroupStatus, RemovalStatus, SetStatus};

/// Quantity-indexed item ledger.
///
/// Invariant: every stored quantity is strictly positive; absence of a code
/// means zero. The single mutating primitive is [`Ledger::apply_delta`] —
/// adds and removals are signed deltas, and any delta that drives a quantity
/// to zero or below deletes the entry.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: HashMap<ItemCode, i64>,

    /// Codes whose removal is forced to report failure. Test-only seam: the
    /// removal step inside `apply_delta` cannot fail otherwise.
    #[cfg(feature = "fault-injection")]
    poisoned_removals: std::collections::HashSet<ItemCode>,
}

impl PartialEq for Ledger {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for Ledger {}

impl Ledger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger seeded from initial entries.
    ///
    /// Quantities are stored as-is; seeding with non-positive quantities is a
    /// caller-contract violation, same as [`Ledger::add_new`].
    pub fn from_entries(entries: impl IntoIterator<Item = (ItemCode, i64)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            #[cfg(feature = "fault-injection")]
            poisoned_removals: Default::default(),
        }
    }

    /// Add `delta` to the quantity stored for `code`, creating the entry at
    /// zero first if absent. A resulting quantity of zero or below removes
    /// the entry.
    ///
    /// Returns [`ChangeStatus::CouldNotMakeChange`] only if that removal step
    /// reports the item missing — which the preceding insert has just ruled
    /// out, so the branch is asserted unreachable in debug builds and kept as
    /// a non-corrupting status in release.
    pub fn apply_delta(&mut self, code: &ItemCode, delta: i64) -> ChangeStatus {
        let quantity = self.entries.entry(code.clone()).or_insert(0);
        *quantity += delta;
        let quantity = *quantity;

        if quantity <= 0 {
            debug!(code = %code, quantity, "non-positive quantity, removing entry");

            if self.remove(code) != RemovalStatus::Success {
                error!(code = %code, "removal of a just-present entry failed");
                #[cfg(not(feature = "fault-injection"))]
                debug_assert!(false, "entry vanished between insert and removal");
                return ChangeStatus::CouldNotMakeChange;
            }
        }

        ChangeStatus::Success
    }

    /// Apply each delta in input order, collecting one status per entry.
    ///
    /// A failing entry never aborts the rest of the group. Later deltas see
    /// the effect of earlier ones, so duplicate codes within a group are
    /// order-dependent by design.
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

    /// Map-keyed variant of [`Ledger::apply_delta_group`].
    ///
    /// Same contract, but a map cannot carry two deltas for the same code —
    /// callers pre-sum instead. Iteration order over distinct codes is
    /// unspecified, which is fine because distinct codes are independent.
    /// This asymmetry with the slice variant is intentional.
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

    /// Insert a brand-new entry, failing if the code is already present.
    ///
    /// The quantity is stored as-is: positivity is a caller contract at this
    /// entry point, not enforced here.
    pub fn add_new(&mut self, entry: Entry) -> AddStatus {
        if self.contains(&entry.code) {
            return AddStatus::ItemAlreadyInInventory;
        }

        self.entries.insert(entry.code, entry.quantity);
        AddStatus::Success
    }

    /// Delete the entry for `code` regardless of quantity.
    pub fn remove(&mut self, code: &ItemCode) -> RemovalStatus {
        #[cfg(feature = "fault-injection")]
        if self.poisoned_removals.contains(code) {
            self.entries.remove(code);
            return RemovalStatus::ItemNotInInventory;
        }

        if self.entries.remove(code).is_some() {
            RemovalStatus::Success
        } else {
            RemovalStatus::ItemNotInInventory
        }
    }

    /// Remove each code independently, one status per input code, order
    /// preserved. Individual failures do not stop the rest.
    pub fn remove_group(&mut self, codes: &[ItemCode]) -> Vec<RemovalStatus> {
        codes.iter().map(|code| self.remove(code)).collect()
    }

    /// Replace the whole ledger with a snapshot.
    ///
    /// The snapshot must satisfy the stored-entry invariant (unique codes,
    /// strictly positive quantities); otherwise nothing is changed and
    /// [`SetStatus::CouldNotSetInventory`] is returned so the sender can
    /// retry.
    pub fn replace_all(&mut self, snapshot: &[Entry]) -> SetStatus {
        let mut incoming = HashMap::with_capacity(snapshot.len());
        for entry in snapshot {
            if entry.quantity <= 0 {
                error!(code = %entry.code, quantity = entry.quantity, "rejecting snapshot with non-positive quantity");
                return SetStatus::CouldNotSetInventory;
            }
            if incoming.insert(entry.code.clone(), entry.quantity).is_some() {
                error!(code = %entry.code, "rejecting snapshot with duplicate code");
                return SetStatus::CouldNotSetInventory;
            }
        }

        self.entries = incoming;
        SetStatus::Success
    }

    /// Quantity stored for `code`; zero when absent. Never fails.
    pub fn quantity_of(&self, code: &ItemCode) -> i64 {
        self.entries.get(code).copied().unwrap_or(0)
    }

    pub fn contains(&self, code: &ItemCode) -> bool {
        self.entries.contains_key(code)
    }

    /// Count of present entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read-only view of all entries.
    pub fn snapshot(&self) -> &HashMap<ItemCode, i64> {
        &self.entries
    }

    /// The ledger's contents as entries, sorted by code for determinism.
    ///
    /// This is the form shipped over the wire in full-resync snapshots.
    pub fn to_entries(&self) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self
            .entries
            .iter()
            .map(|(code, quantity)| Entry::new(code.clone(), *quantity))
            .collect();
        entries.sort_by(|a, b| a.code.cmp(&b.code));
        entries
    }

    /// Force removals of `code` to report failure.
    #[cfg(feature = "fault-injection")]
    pub fn poison_removal(&mut self, code: ItemCode) {
        self.poisoned_removals.insert(code);
    }

    /// Clear all injected removal faults.
    #[cfg(feature = "fault-injection")]
    pub fn clear_removal_faults(&mut self) {
        self.poisoned_removals.clear();
    }
}

impl core::fmt::Display for Ledger {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "{{")?;
        for entry in self.to_entries() {
            writeln!(f, "\t{entry}")?;
        }
        writeln!(f, "}}")
    }
}
