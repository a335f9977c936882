//! Item code: the key every ledger entry is indexed by.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of an item kind (e.g. `"sword"`, `"potion"`).
///
/// Codes are opaque, case-sensitive strings. Uniqueness within a ledger is
/// what makes quantities mergeable: two entries with the same code are the
/// same item kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemCode(String);

impl ItemCode {
    /// Create an item code from a raw string.
    ///
    /// Rejects empty or whitespace-only input; leading/trailing whitespace is
    /// not trimmed (a code with interior spaces is the caller's choice).
    pub fn new(code: impl Into<String>) -> Result<Self, DomainError> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("item code cannot be empty"));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ItemCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ItemCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ItemCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_codes() {
        let code = ItemCode::new("sword").unwrap();
        assert_eq!(code.as_str(), "sword");
        assert_eq!(code.to_string(), "sword");
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert!(ItemCode::new("").is_err());
        assert!(ItemCode::new("   ").is_err());
        assert!(ItemCode::new("\t\n").is_err());
    }

    #[test]
    fn parses_via_from_str() {
        let code: ItemCode = "potion".parse().unwrap();
        assert_eq!(code.as_str(), "potion");
    }
}
