//! Status codes returned by ledger and sync operations.
//!
//! These are expected-outcome codes, not errors: "item not present" and
//! "some changes lost" are steady-state conditions the caller must branch
//! on. Nothing in this module is ever raised through `Result::Err`.

use serde::{Deserialize, Serialize};

/// Outcome of applying a single quantity delta.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeStatus {
    Success,
    /// The removal step for a non-positive quantity reported the item
    /// missing. Only reachable through an internal-consistency fault; see
    /// `Ledger::apply_delta`.
    CouldNotMakeChange,
}

/// Aggregate outcome of applying a delta group.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupStatus {
    AllSuccessful,
    SomeChangesLost,
}

/// Outcome of inserting a brand-new entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddStatus {
    Success,
    ItemAlreadyInInventory,
}

/// Outcome of removing an entry outright.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalStatus {
    Success,
    ItemNotInInventory,
}

/// Outcome of replacing a whole ledger with a snapshot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetStatus {
    Success,
    CouldNotSetInventory,
}
