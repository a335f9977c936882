//! Synchronization strategies for networked inventories.
//!
//! Two strategies keep a dependent process's inventory consistent with the
//! authoritative one, each suited to a different ownership model:
//!
//! - **Optimistic apply-then-confirm** ([`DependentLedgerService`] /
//!   [`AuthoritativeLedgerService`]): both sides own a [`stocklink_ledger::Ledger`];
//!   the dependent applies changes locally first and proposes them up, and
//!   any divergence is repaired with a full-state resync rather than
//!   per-entry patching.
//! - **Push replication** ([`ReplicatedInventoryHost`] / [`ReplicaInventory`]):
//!   only the host mutates its [`stocklink_ledger::IndexedLedger`]; the transport
//!   ships the whole sequence to replicas, which rebuild their derived index
//!   on every receipt.
//!
//! Both sides are single-threaded with respect to their own ledger: the host
//! transport delivers inbound messages one at a time, in order, and no
//! operation blocks on a remote reply.

pub mod authoritative;
pub mod channel;
pub mod dependent;
pub mod message;
pub mod pickup;
pub mod replication;

pub use authoritative::AuthoritativeLedgerService;
pub use channel::{ChannelError, InMemorySink, Inbox, MessageSink, in_memory};
pub use dependent::{DependentLedgerService, ProposeOutcome, SyncState};
pub use message::{MessageEnvelope, SyncMessage};
pub use pickup::PickupPolicy;
pub use replication::{ReplicaInventory, ReplicatedInventoryHost, SequenceSink};

use stocklink_ledger::Entry;

/// Debug-build warning for zero-quantity deltas in a proposed group; a zero
/// delta is legal but almost always a caller bug.
pub(crate) fn debug_warn_zero_quantities(changes: &[Entry]) {
    if cfg!(debug_assertions) {
        for entry in changes {
            if entry.quantity == 0 {
                tracing::warn!(code = %entry.code, "zero-quantity delta in group");
            }
        }
    }
}

/// Debug-build warning for non-positive quantities in an add/remove batch,
/// where the sign is applied by the operation itself.
pub(crate) fn debug_warn_non_positive(items: &[Entry], action: &'static str) {
    if cfg!(debug_assertions) {
        for entry in items {
            if entry.quantity <= 0 {
                tracing::warn!(
                    code = %entry.code,
                    quantity = entry.quantity,
                    action = action,
                    "non-positive quantity in batch"
                );
            }
        }
    }
}
