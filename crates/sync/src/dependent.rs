//! Dependent (non-authoritative) side of the optimistic sync protocol.

use std::collections::HashMap;

use tracing::{debug, error, warn};

use stocklink_core::{InventoryId, ItemCode};
use stocklink_ledger::{ChangeStatus, Entry, GroupStatus, Ledger, SetStatus};

use crate::channel::MessageSink;
use crate::message::{MessageEnvelope, SyncMessage};
use crate::{debug_warn_non_positive, debug_warn_zero_quantities};

/// Where the dependent side stands relative to the authority.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SyncState {
    /// Everything proposed so far has been confirmed.
    Idle,
    /// At least one optimistically-applied group awaits confirmation.
    PendingConfirmation,
    /// Divergence detected; a full snapshot has been requested and local
    /// proposals are refused until it lands.
    AwaitingResync,
}

/// Outcome of proposing a local modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposeOutcome {
    /// Applied locally and sent to the authority for confirmation.
    Proposed {
        group_status: GroupStatus,
        change_statuses: Vec<ChangeStatus>,
    },
    /// Refused: a full resync is in flight. Retry once it completes.
    ResyncInProgress,
}

/// The side that mirrors the authoritative ledger and may propose changes.
///
/// Proposals are applied to the local ledger immediately (the caller's view
/// reflects the change with no round-trip wait), then sent up. Divergence
/// recovery is all-or-nothing: any lost change, reported or local, makes
/// this side ask for the authority's whole ledger rather than patch entries.
#[derive(Debug)]
pub struct DependentLedgerService<S: MessageSink> {
    inventory_id: InventoryId,
    ledger: Ledger,
    authority: S,
    next_outbound: u64,
    last_inbound: Option<u64>,
    outstanding_proposals: u32,
    awaiting_resync: bool,
}

impl<S: MessageSink> DependentLedgerService<S> {
    pub fn new(inventory_id: InventoryId, ledger: Ledger, authority: S) -> Self {
        Self {
            inventory_id,
            ledger,
            authority,
            next_outbound: 0,
            last_inbound: None,
            outstanding_proposals: 0,
            awaiting_resync: false,
        }
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

    pub fn state(&self) -> SyncState {
        if self.awaiting_resync {
            SyncState::AwaitingResync
        } else if self.outstanding_proposals > 0 {
            SyncState::PendingConfirmation
        } else {
            SyncState::Idle
        }
    }

    /// Optimistically apply a delta group and propose it to the authority.
    pub fn modify(&mut self, changes: &[Entry]) -> ProposeOutcome {
        if self.awaiting_resync {
            warn!("full resync in flight, refusing local modification");
            return ProposeOutcome::ResyncInProgress;
        }

        debug_warn_zero_quantities(changes);

        let (group_status, change_statuses) = self.ledger.apply_delta_group(changes);
        self.outstanding_proposals += 1;
        self.send(SyncMessage::ProposeDeltaGroup {
            changes: changes.to_vec(),
        });

        if group_status != GroupStatus::AllSuccessful {
            // The local ledger itself failed to take the change; don't wait
            // for the authority to tell us what we already know.
            warn!("local optimistic apply lost changes, requesting full resync");
            self.request_full_resync();
        }

        ProposeOutcome::Proposed {
            group_status,
            change_statuses,
        }
    }

    /// Map-keyed variant of [`Self::modify`]. Distinct codes only, so the
    /// unspecified iteration order cannot change the result.
    pub fn modify_map(&mut self, changes: &HashMap<ItemCode, i64>) -> ProposeOutcome {
        let changes: Vec<Entry> = changes
            .iter()
            .map(|(code, delta)| Entry::new(code.clone(), *delta))
            .collect();
        self.modify(&changes)
    }

    /// Add items (positive quantities by convention).
    pub fn add_items(&mut self, items: &[Entry]) -> ProposeOutcome {
        debug_warn_non_positive(items, "adding");
        self.modify(items)
    }

    /// Remove items: quantities are flipped so the batch subtracts.
    pub fn remove_items(&mut self, items: &[Entry]) -> ProposeOutcome {
        debug_warn_non_positive(items, "removing");
        let flipped: Vec<Entry> = items.iter().map(Entry::negated).collect();
        self.modify(&flipped)
    }

    /// Ask the authority for its complete ledger and refuse local proposals
    /// until the snapshot has been installed.
    pub fn request_full_resync(&mut self) {
        self.awaiting_resync = true;
        self.send(SyncMessage::RequestFullSet);
    }

    /// Handle one inbound envelope from the authority, to be invoked by the
    /// host transport in delivery order.
    pub fn on_receive(&mut self, envelope: MessageEnvelope) {
        if envelope.inventory_id() != self.inventory_id {
            warn!(
                received = %envelope.inventory_id(),
                expected = %self.inventory_id,
                "envelope for a different inventory, dropping"
            );
            return;
        }

        if let Some(last) = self.last_inbound {
            if envelope.sequence() <= last {
                debug!(
                    sequence = envelope.sequence(),
                    last,
                    "duplicate or stale envelope, dropping"
                );
                return;
            }
        }
        self.last_inbound = Some(envelope.sequence());

        match envelope.into_payload() {
            SyncMessage::ConfirmGroupStatus { status } => {
                if self.outstanding_proposals == 0 {
                    warn!("confirmation without an outstanding proposal");
                } else {
                    self.outstanding_proposals -= 1;
                }

                if status == GroupStatus::AllSuccessful {
                    debug!("authority confirmed proposed changes");
                } else if !self.awaiting_resync {
                    warn!(?status, "authority reports lost changes, requesting full resync");
                    self.request_full_resync();
                }
            }
            SyncMessage::ProposeDeltaGroup { changes } => {
                debug!(count = changes.len(), "applying authority-propagated delta group");

                let (group_status, _) = self.ledger.apply_delta_group(&changes);
                if group_status != GroupStatus::AllSuccessful && !self.awaiting_resync {
                    warn!("could not apply propagated changes, requesting full resync");
                    self.request_full_resync();
                }
            }
            SyncMessage::PushFullSnapshot { entries } => {
                let status = self.ledger.replace_all(&entries);
                match status {
                    SetStatus::Success => {
                        debug!(entries = self.ledger.len(), "installed authority snapshot");
                        self.awaiting_resync = false;
                        self.outstanding_proposals = 0;
                    }
                    SetStatus::CouldNotSetInventory => {
                        error!("could not install authority snapshot");
                    }
                }
                self.send(SyncMessage::ConfirmSetStatus { status });
            }
            other @ (SyncMessage::RequestFullSet | SyncMessage::ConfirmSetStatus { .. }) => {
                debug!(
                    kind = other.kind(),
                    "authority-role message received by dependent, ignoring"
                );
            }
        }
    }

    fn send(&mut self, payload: SyncMessage) {
        self.next_outbound += 1;
        let envelope = MessageEnvelope::new(self.inventory_id, self.next_outbound, payload);
        if let Err(error) = self.authority.send(envelope) {
            warn!(?error, "failed to send to authority");
        }
    }
}

impl<S: MessageSink> core::fmt::Display for DependentLedgerService<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.ledger, f)
    }
}
