//! Routing policy for pickup events.
//!
//! The actor layer that detects pickups lives outside this crate; what it
//! needs from here is the per-item decision of which side of the connection
//! is allowed to run the pickup handler at all.

use serde::{Deserialize, Serialize};

/// Which side(s) a pickup event may run on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickupPolicy {
    OnlyOnClient,
    OnlyOnServer,
    OnClientAndServer,
}

impl PickupPolicy {
    /// Whether a pickup handler may run on this side, given the host-supplied
    /// authority role.
    pub fn allows(self, is_authoritative: bool) -> bool {
        match self {
            PickupPolicy::OnlyOnClient => !is_authoritative,
            PickupPolicy::OnlyOnServer => is_authoritative,
            PickupPolicy::OnClientAndServer => true,
        }
    }
}

impl Default for PickupPolicy {
    fn default() -> Self {
        PickupPolicy::OnClientAndServer
    }
}
