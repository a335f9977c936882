//! Inventory ledger data structures.
//!
//! This crate contains the quantity-indexed item ledger in two
//! representations, implemented purely as deterministic domain logic
//! (no IO, no transport):
//!
//! - [`Ledger`]: a map from item code to quantity. The workhorse for the
//!   RPC-style optimistic sync strategy, where each side owns its own copy.
//! - [`IndexedLedger`]: an ordered sequence of entries plus a derived
//!   code-to-position index, for the push-replication strategy where the
//!   whole sequence is shipped to dependents as one unit.
//!
//! All outcomes that callers are expected to branch on ("item not present",
//! "item already present", "some changes lost") are status enums returned by
//! value, never errors.

pub mod entry;
pub mod indexed;
pub mod ledger;
pub mod status;

pub use entry::Entry;
pub use indexed::IndexedLedger;
pub use ledger::Ledger;
pub use status::{AddStatus, ChangeStatus, GroupStatus, RemovalStatus, SetStatus};
