//! Authoritative side of the optimistic sync protocol.

use std::collections::HashMap;

use tracing::{debug, error, warn};

use stocklink_core::{InventoryId, ItemCode, PeerId};
use stocklink_ledger::{ChangeStatus, Entry, GroupStatus, Ledger, SetStatus};

use crate::channel::MessageSink;
use crate::message::{MessageEnvelope, SyncMessage};
use crate::{debug_warn_non_positive, debug_warn_zero_quantities};

/// Per-peer channel bookkeeping.
#[derive(Debug)]
struct PeerChannel<S> {
    sink: S,
    /// Sequence of the next envelope sent to this peer.
    next_outbound: u64,
    /// Highest sequence accepted from this peer; anything at or below is a
    /// duplicate delivery and gets dropped.
    last_inbound: Option<u64>,
}

/// The side whose ledger is ground truth.
///
/// Every inbound proposal is handled synchronously to completion before the
/// confirmation goes out; there is no pending state on this side. Accepted
/// groups are propagated to every registered peer except the proposer (the
/// proposer already applied optimistically and gets only the coarse
/// [`SyncMessage::ConfirmGroupStatus`] acknowledgement).
#[derive(Debug)]
pub struct AuthoritativeLedgerService<S: MessageSink> {
    inventory_id: InventoryId,
    ledger: Ledger,
    peers: HashMap<PeerId, PeerChannel<S>>,
}

impl<S: MessageSink> AuthoritativeLedgerService<S> {
    pub fn new(inventory_id: InventoryId, ledger: Ledger) -> Self {
        Self {
            inventory_id,
            ledger,
            peers: HashMap::new(),
        }
    }

    /// Register the outbound channel for a dependent peer.
    pub fn register_peer(&mut self, peer_id: PeerId, sink: S) {
        self.peers.insert(
            peer_id,
            PeerChannel {
                sink,
                next_outbound: 0,
                last_inbound: None,
            },
        );
    }

    pub fn inventory_id(&self) -> InventoryId {
        self.inventory_id
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
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

    /// Apply a delta group locally and propagate it to every peer.
    pub fn modify(&mut self, changes: &[Entry]) -> (GroupStatus, Vec<ChangeStatus>) {
        debug_warn_zero_quantities(changes);

        let (group_status, change_statuses) = self.ledger.apply_delta_group(changes);
        if group_status != GroupStatus::AllSuccessful {
            warn!("not all local inventory changes successful, some lost");
        }

        self.broadcast(None, &SyncMessage::ProposeDeltaGroup {
            changes: changes.to_vec(),
        });

        (group_status, change_statuses)
    }

    /// Map-keyed variant of [`Self::modify`]. Distinct codes only, so the
    /// unspecified iteration order cannot change the result.
    pub fn modify_map(
        &mut self,
        changes: &HashMap<ItemCode, i64>,
    ) -> (GroupStatus, Vec<ChangeStatus>) {
        let changes: Vec<Entry> = changes
            .iter()
            .map(|(code, delta)| Entry::new(code.clone(), *delta))
            .collect();
        self.modify(&changes)
    }

    /// Add items (positive quantities by convention).
    pub fn add_items(&mut self, items: &[Entry]) -> (GroupStatus, Vec<ChangeStatus>) {
        debug_warn_non_positive(items, "adding");
        self.modify(items)
    }

    /// Remove items: quantities are flipped so the batch subtracts.
    pub fn remove_items(&mut self, items: &[Entry]) -> (GroupStatus, Vec<ChangeStatus>) {
        debug_warn_non_positive(items, "removing");
        let flipped: Vec<Entry> = items.iter().map(Entry::negated).collect();
        self.modify(&flipped)
    }

    /// Handle one inbound envelope from `from`, to be invoked by the host
    /// transport in delivery order.
    pub fn on_receive(&mut self, from: PeerId, envelope: MessageEnvelope) {
        if envelope.inventory_id() != self.inventory_id {
            warn!(
                peer = %from,
                received = %envelope.inventory_id(),
                expected = %self.inventory_id,
                "envelope for a different inventory, dropping"
            );
            return;
        }

        let Some(peer) = self.peers.get_mut(&from) else {
            warn!(peer = %from, "envelope from unregistered peer, dropping");
            return;
        };

        if let Some(last) = peer.last_inbound {
            if envelope.sequence() <= last {
                debug!(
                    peer = %from,
                    sequence = envelope.sequence(),
                    last,
                    "duplicate or stale envelope, dropping"
                );
                return;
            }
        }
        peer.last_inbound = Some(envelope.sequence());

        match envelope.into_payload() {
            SyncMessage::ProposeDeltaGroup { changes } => {
                debug!(peer = %from, count = changes.len(), "applying proposed delta group");

                let (group_status, _) = self.ledger.apply_delta_group(&changes);
                if group_status != GroupStatus::AllSuccessful {
                    warn!(peer = %from, "not all proposed inventory changes successful, some lost");
                }

                self.send_to_peer(from, SyncMessage::ConfirmGroupStatus {
                    status: group_status,
                });
                // Everyone but the proposer still needs the group; the
                // proposer already applied it optimistically.
                self.broadcast(Some(from), &SyncMessage::ProposeDeltaGroup { changes });
            }
            SyncMessage::RequestFullSet => {
                debug!(peer = %from, "peer requested full inventory");
                self.push_snapshot_to(from);
            }
            SyncMessage::ConfirmSetStatus { status } => {
                if status != SetStatus::Success {
                    error!(peer = %from, ?status, "peer could not install snapshot, retrying");
                    self.push_snapshot_to(from);
                } else {
                    debug!(peer = %from, "peer confirmed snapshot");
                }
            }
            other @ (SyncMessage::ConfirmGroupStatus { .. }
            | SyncMessage::PushFullSnapshot { .. }) => {
                debug!(
                    kind = other.kind(),
                    "dependent-role message received by authority, ignoring"
                );
            }
        }
    }

    fn push_snapshot_to(&mut self, peer_id: PeerId) {
        let entries = self.ledger.to_entries();
        self.send_to_peer(peer_id, SyncMessage::PushFullSnapshot { entries });
    }

    fn send_to_peer(&mut self, peer_id: PeerId, payload: SyncMessage) {
        let inventory_id = self.inventory_id;
        let Some(peer) = self.peers.get_mut(&peer_id) else {
            warn!(peer = %peer_id, "no channel registered for peer");
            return;
        };

        peer.next_outbound += 1;
        let envelope = MessageEnvelope::new(inventory_id, peer.next_outbound, payload);
        if let Err(error) = peer.sink.send(envelope) {
            warn!(peer = %peer_id, ?error, "failed to send to peer");
        }
    }

    fn broadcast(&mut self, except: Option<PeerId>, payload: &SyncMessage) {
        let inventory_id = self.inventory_id;
        for (peer_id, peer) in &mut self.peers {
            if Some(*peer_id) == except {
                continue;
            }

            peer.next_outbound += 1;
            let envelope =
                MessageEnvelope::new(inventory_id, peer.next_outbound, payload.clone());
            if let Err(error) = peer.sink.send(envelope) {
                warn!(peer = %peer_id, ?error, "failed to send to peer");
            }
        }
    }
}

impl<S: MessageSink> core::fmt::Display for AuthoritativeLedgerService<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.ledger, f)
    }
}
