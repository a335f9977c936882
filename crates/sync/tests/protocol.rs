//! End-to-end scenarios for the optimistic sync protocol.
//!
//! The tests play the role of the host transport: they drain each side's
//! inbox and feed envelopes into the opposite role in delivery order, one
//! hop at a time where the intermediate state matters.

use stocklink_core::{InventoryId, ItemCode, PeerId};
use stocklink_ledger::{ChangeStatus, Entry, GroupStatus, Ledger};
use stocklink_sync::{
    AuthoritativeLedgerService, DependentLedgerService, InMemorySink, Inbox, MessageEnvelope,
    ProposeOutcome, SyncMessage, SyncState, in_memory,
};

type Sink = InMemorySink<MessageEnvelope>;

struct Client {
    peer_id: PeerId,
    service: DependentLedgerService<Sink>,
    inbox: Inbox<MessageEnvelope>,
    to_server: Inbox<MessageEnvelope>,
}

fn code(s: &str) -> ItemCode {
    ItemCode::new(s).unwrap()
}

fn entry(s: &str, quantity: i64) -> Entry {
    Entry::new(code(s), quantity)
}

fn harness(
    inventory_id: InventoryId,
    server_ledger: Ledger,
    client_ledgers: Vec<Ledger>,
) -> (AuthoritativeLedgerService<Sink>, Vec<Client>) {
    let mut server = AuthoritativeLedgerService::new(inventory_id, server_ledger);
    let mut clients = Vec::new();

    for ledger in client_ledgers {
        let peer_id = PeerId::new();
        let (up_sink, to_server) = in_memory();
        let (down_sink, inbox) = in_memory();
        server.register_peer(peer_id, down_sink);

        clients.push(Client {
            peer_id,
            service: DependentLedgerService::new(inventory_id, ledger, up_sink),
            inbox,
            to_server,
        });
    }

    (server, clients)
}

/// Deliver every queued envelope in both directions until quiescent.
fn pump(server: &mut AuthoritativeLedgerService<Sink>, clients: &mut [Client]) {
    loop {
        let mut delivered = false;

        for client in clients.iter_mut() {
            while let Ok(envelope) = client.to_server.try_recv() {
                server.on_receive(client.peer_id, envelope);
                delivered = true;
            }
            while let Ok(envelope) = client.inbox.try_recv() {
                client.service.on_receive(envelope);
                delivered = true;
            }
        }

        if !delivered {
            break;
        }
    }
}

/// Deliver exactly one hop: everything currently queued toward the server,
/// then everything currently queued toward each client.
fn pump_one_hop(server: &mut AuthoritativeLedgerService<Sink>, clients: &mut [Client]) {
    for client in clients.iter_mut() {
        while let Ok(envelope) = client.to_server.try_recv() {
            server.on_receive(client.peer_id, envelope);
        }
    }
    for client in clients.iter_mut() {
        while let Ok(envelope) = client.inbox.try_recv() {
            client.service.on_receive(envelope);
        }
    }
}

#[test]
fn optimistic_happy_path_confirms_without_resync() {
    let inventory_id = InventoryId::new();
    let (mut server, mut clients) = harness(inventory_id, Ledger::new(), vec![Ledger::new()]);

    let outcome = clients[0].service.modify(&[entry("sword", 1)]);
    assert_eq!(
        outcome,
        ProposeOutcome::Proposed {
            group_status: GroupStatus::AllSuccessful,
            change_statuses: vec![ChangeStatus::Success],
        }
    );

    // The caller's view reflects the change before any round trip.
    assert_eq!(clients[0].service.ledger().quantity_of(&code("sword")), 1);
    assert_eq!(clients[0].service.state(), SyncState::PendingConfirmation);

    pump(&mut server, &mut clients);

    assert_eq!(server.ledger().quantity_of(&code("sword")), 1);
    assert_eq!(clients[0].service.ledger(), server.ledger());
    assert_eq!(clients[0].service.state(), SyncState::Idle);
}

#[test]
fn authority_originated_changes_propagate_down() {
    let inventory_id = InventoryId::new();
    let (mut server, mut clients) = harness(inventory_id, Ledger::new(), vec![Ledger::new()]);

    let (group_status, _) = server.add_items(&[entry("arrow", 30)]);
    assert_eq!(group_status, GroupStatus::AllSuccessful);

    pump(&mut server, &mut clients);

    assert_eq!(clients[0].service.ledger().quantity_of(&code("arrow")), 30);
    // A pushed group is not a proposal; nothing is pending.
    assert_eq!(clients[0].service.state(), SyncState::Idle);
}

#[test]
fn accepted_proposals_reach_other_observers_but_not_the_proposer() {
    let inventory_id = InventoryId::new();
    let (mut server, mut clients) = harness(
        inventory_id,
        Ledger::new(),
        vec![Ledger::new(), Ledger::new()],
    );

    clients[0].service.modify(&[entry("sword", 1)]);
    pump(&mut server, &mut clients);

    assert_eq!(server.ledger().quantity_of(&code("sword")), 1);
    // The proposer keeps its single optimistic application; no echo.
    assert_eq!(clients[0].service.ledger().quantity_of(&code("sword")), 1);
    // The other observer converges through the propagated group.
    assert_eq!(clients[1].service.ledger().quantity_of(&code("sword")), 1);
}

#[test]
fn remove_items_flips_quantities() {
    let inventory_id = InventoryId::new();
    let (mut server, mut clients) = harness(
        inventory_id,
        Ledger::from_entries([(code("arrow"), 30)]),
        vec![Ledger::from_entries([(code("arrow"), 30)])],
    );

    clients[0].service.remove_items(&[entry("arrow", 10)]);
    pump(&mut server, &mut clients);

    assert_eq!(server.ledger().quantity_of(&code("arrow")), 20);
    assert_eq!(clients[0].service.ledger(), server.ledger());
}

#[test]
fn lost_changes_force_a_full_resync() {
    let inventory_id = InventoryId::new();

    let mut server_ledger = Ledger::from_entries([(code("potion"), 1)]);
    // Simulated internal-consistency fault: the server's removal step will
    // report the potion missing even though it is present.
    server_ledger.poison_removal(code("potion"));
    let client_ledger = Ledger::from_entries([(code("potion"), 1)]);

    let (mut server, mut clients) = harness(inventory_id, server_ledger, vec![client_ledger]);

    let outcome = clients[0].service.modify(&[entry("potion", -1)]);
    assert_eq!(
        outcome,
        ProposeOutcome::Proposed {
            group_status: GroupStatus::AllSuccessful,
            change_statuses: vec![ChangeStatus::Success],
        }
    );

    // Hop 1: the server applies the group, hits the fault, and confirms
    // SomeChangesLost; the client reacts by requesting the full set.
    pump_one_hop(&mut server, &mut clients);
    assert_eq!(clients[0].service.state(), SyncState::AwaitingResync);

    // Local proposals are refused until the snapshot lands.
    assert_eq!(
        clients[0].service.modify(&[entry("sword", 1)]),
        ProposeOutcome::ResyncInProgress
    );
    assert!(!clients[0].service.ledger().contains(&code("sword")));

    // Hop 2: the server answers with its exact snapshot; the client installs
    // it and confirms success.
    pump_one_hop(&mut server, &mut clients);
    assert_eq!(clients[0].service.ledger(), server.ledger());
    assert_eq!(clients[0].service.state(), SyncState::Idle);

    // Hop 3: the success confirmation reaches the server; no retry follows.
    pump_one_hop(&mut server, &mut clients);
    assert!(clients[0].inbox.try_recv().is_err());
}

#[test]
fn duplicate_deliveries_apply_once() {
    let inventory_id = InventoryId::new();
    let (mut server, mut clients) = harness(inventory_id, Ledger::new(), vec![Ledger::new()]);

    clients[0].service.modify(&[entry("sword", 1)]);

    let envelope = clients[0].to_server.try_recv().unwrap();
    server.on_receive(clients[0].peer_id, envelope.clone());
    server.on_receive(clients[0].peer_id, envelope);

    assert_eq!(server.ledger().quantity_of(&code("sword")), 1);

    // Exactly one confirmation came back for the two deliveries.
    assert!(clients[0].inbox.try_recv().is_ok());
    assert!(clients[0].inbox.try_recv().is_err());
}

#[test]
fn refused_snapshots_are_retried_until_one_installs() {
    let inventory_id = InventoryId::new();

    // Corrupted authoritative state: a stored non-positive quantity violates
    // the snapshot contract, so dependents will refuse it.
    let server_ledger = Ledger::from_entries([(code("cursed"), -3), (code("sword"), 2)]);
    let (mut server, mut clients) = harness(inventory_id, server_ledger, vec![Ledger::new()]);

    clients[0].service.request_full_resync();
    pump_one_hop(&mut server, &mut clients);

    // The bad snapshot was refused; the client is untouched and still waiting.
    assert!(clients[0].service.ledger().is_empty());
    assert_eq!(clients[0].service.state(), SyncState::AwaitingResync);

    // The authority repairs itself before processing the failure report, so
    // the retried snapshot is installable.
    server.modify(&[entry("cursed", 4)]);
    assert_eq!(server.ledger().quantity_of(&code("cursed")), 1);

    pump(&mut server, &mut clients);

    assert_eq!(clients[0].service.ledger(), server.ledger());
    assert_eq!(clients[0].service.state(), SyncState::Idle);
}

#[test]
fn wrong_role_messages_are_ignored() {
    let inventory_id = InventoryId::new();
    let (mut server, mut clients) = harness(inventory_id, Ledger::new(), vec![Ledger::new()]);

    // A dependent-role message arriving at the authority is a routing
    // mismatch, not an error.
    server.on_receive(
        clients[0].peer_id,
        MessageEnvelope::new(inventory_id, 1, SyncMessage::ConfirmGroupStatus {
            status: GroupStatus::AllSuccessful,
        }),
    );
    assert!(server.ledger().is_empty());
    assert!(clients[0].inbox.try_recv().is_err());

    // And symmetrically for an authority-role message at the dependent.
    clients[0]
        .service
        .on_receive(MessageEnvelope::new(inventory_id, 1, SyncMessage::RequestFullSet));
    assert!(clients[0].service.ledger().is_empty());
    assert_eq!(clients[0].service.state(), SyncState::Idle);
    assert!(clients[0].to_server.try_recv().is_err());
}

#[test]
fn envelopes_for_other_inventories_are_dropped() {
    let inventory_id = InventoryId::new();
    let (_server, mut clients) = harness(inventory_id, Ledger::new(), vec![Ledger::new()]);

    clients[0].service.on_receive(MessageEnvelope::new(
        InventoryId::new(),
        7,
        SyncMessage::ProposeDeltaGroup {
            changes: vec![entry("sword", 1)],
        },
    ));
    assert!(clients[0].service.ledger().is_empty());

    // The stray envelope did not advance duplicate tracking; real traffic
    // starting at sequence 1 still gets through.
    clients[0].service.on_receive(MessageEnvelope::new(
        inventory_id,
        1,
        SyncMessage::ProposeDeltaGroup {
            changes: vec![entry("sword", 1)],
        },
    ));
    assert_eq!(clients[0].service.ledger().quantity_of(&code("sword")), 1);
}

#[test]
fn unregistered_peers_are_dropped() {
    let inventory_id = InventoryId::new();
    let (mut server, _clients) = harness(inventory_id, Ledger::new(), vec![Ledger::new()]);

    server.on_receive(
        PeerId::new(),
        MessageEnvelope::new(inventory_id, 1, SyncMessage::ProposeDeltaGroup {
            changes: vec![entry("sword", 1)],
        }),
    );

    assert!(server.ledger().is_empty());
}
