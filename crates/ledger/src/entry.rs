//! Ledger entry: one (item code, quantity) pair.

use serde::{Deserialize, Serialize};

use stocklink_core::ItemCode;

/// One item-quantity pair.
///
/// Equality is structural. As a *delta* the quantity may be any integer
/// (negative deltas remove quantity); a *stored* entry's quantity is always
/// strictly positive — the ledgers enforce that on every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub code: ItemCode,
    pub quantity: i64,
}

impl Entry {
    pub fn new(code: ItemCode, quantity: i64) -> Self {
        Self { code, quantity }
    }

    /// The same entry with its quantity negated.
    ///
    /// Turns an "add these items" batch into a "remove these items" batch.
    pub fn negated(&self) -> Self {
        Self {
            code: self.code.clone(),
            quantity: -self.quantity,
        }
    }
}

impl core::fmt::Display for Entry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.code, self.quantity)
    }
}
