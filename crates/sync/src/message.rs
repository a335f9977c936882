//! Wire messages for the optimistic sync channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stocklink_core::InventoryId;
use stocklink_ledger::{Entry, GroupStatus, SetStatus};

/// RPC-style messages exchanged between the authoritative and dependent
/// roles.
///
/// Direction is by convention, enforced by the receiving role (a message
/// addressed to the other role is a logged no-op, not an error):
///
/// - dependent → authority: [`ProposeDeltaGroup`](Self::ProposeDeltaGroup),
///   [`RequestFullSet`](Self::RequestFullSet),
///   [`ConfirmSetStatus`](Self::ConfirmSetStatus)
/// - authority → dependent: [`ConfirmGroupStatus`](Self::ConfirmGroupStatus),
///   [`PushFullSnapshot`](Self::PushFullSnapshot), and
///   [`ProposeDeltaGroup`](Self::ProposeDeltaGroup) again when the authority
///   propagates an accepted group down to its other observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMessage {
    /// An ordered batch of quantity deltas to apply as one logical unit.
    ProposeDeltaGroup { changes: Vec<Entry> },
    /// Coarse-grained acknowledgement of a proposed group: the aggregate
    /// status only, never the per-entry statuses.
    ConfirmGroupStatus { status: GroupStatus },
    /// Divergence recovery: ask the authority for its complete ledger.
    RequestFullSet,
    /// The authority's complete ledger, replacing the receiver's wholesale.
    PushFullSnapshot { entries: Vec<Entry> },
    /// Whether the receiver managed to install the pushed snapshot.
    ConfirmSetStatus { status: SetStatus },
}

impl SyncMessage {
    /// Stable message name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncMessage::ProposeDeltaGroup { .. } => "propose_delta_group",
            SyncMessage::ConfirmGroupStatus { .. } => "confirm_group_status",
            SyncMessage::RequestFullSet => "request_full_set",
            SyncMessage::PushFullSnapshot { .. } => "push_full_snapshot",
            SyncMessage::ConfirmSetStatus { .. } => "confirm_set_status",
        }
    }
}

/// Envelope carrying one [`SyncMessage`] across the channel.
///
/// The channel is ordered but at-least-once, so every envelope carries a
/// per-sender monotonic `sequence`: receivers drop anything at or below the
/// last sequence they have seen. The `inventory_id` scopes the message to one
/// logical inventory; envelopes for a different inventory are logged and
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    message_id: Uuid,
    inventory_id: InventoryId,

    /// Monotonically increasing position in this sender's outbound stream.
    sequence: u64,

    sent_at: DateTime<Utc>,

    payload: SyncMessage,
}

impl MessageEnvelope {
    pub fn new(inventory_id: InventoryId, sequence: u64, payload: SyncMessage) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            inventory_id,
            sequence,
            sent_at: Utc::now(),
            payload,
        }
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn inventory_id(&self) -> InventoryId {
        self.inventory_id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn sent_at(&self) -> DateTime<Utc> {
        self.sent_at
    }

    pub fn payload(&self) -> &SyncMessage {
        &self.payload
    }

    pub fn into_payload(self) -> SyncMessage {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stocklink_core::ItemCode;

    #[test]
    fn message_wire_shape_is_stable() {
        let message = SyncMessage::ProposeDeltaGroup {
            changes: vec![Entry::new(ItemCode::new("sword").unwrap(), 1)],
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "ProposeDeltaGroup": { "changes": [{ "code": "sword", "quantity": 1 }] }
            })
        );
    }

    #[test]
    fn envelopes_survive_the_wire_format() {
        let envelope =
            MessageEnvelope::new(InventoryId::new(), 3, SyncMessage::RequestFullSet);

        let json = serde_json::to_string(&envelope).unwrap();
        let decoded: MessageEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, envelope);
    }
}
