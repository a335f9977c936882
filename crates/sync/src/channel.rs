//! Channel abstraction between sync peers.
//!
//! The host networking layer provides the actual transport (assumed
//! reliable, order-preserving, at-least-once per direction). This module
//! only defines the seam the sync roles send through, plus an in-memory
//! implementation for tests and single-process setups.

use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use thiserror::Error;

use crate::message::MessageEnvelope;

/// Outbound half of a channel to one peer.
///
/// Implementations must not block: sends are fire-and-forget, and delivery
/// failures are surfaced to the caller to log, not to retry (resync is the
/// corrective mechanism, not redelivery).
pub trait MessageSink: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn send(&self, envelope: MessageEnvelope) -> Result<(), Self::Error>;
}

impl<S> MessageSink for std::sync::Arc<S>
where
    S: MessageSink + ?Sized,
{
    type Error = S::Error;

    fn send(&self, envelope: MessageEnvelope) -> Result<(), Self::Error> {
        (**self).send(envelope)
    }
}

/// Failure to hand a message to the in-memory transport.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The receiving endpoint has been dropped.
    #[error("peer endpoint disconnected")]
    Disconnected,
}

/// Inbound half of an in-memory channel.
///
/// The host transport drains this and feeds each message into the owning
/// role's `on_receive`. Single-consumer by design.
#[derive(Debug)]
pub struct Inbox<M> {
    receiver: Receiver<M>,
}

impl<M> Inbox<M> {
    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Sender side of an in-memory channel.
#[derive(Debug, Clone)]
pub struct InMemorySink<M> {
    sender: mpsc::Sender<M>,
}

impl<M: Send> InMemorySink<M> {
    pub(crate) fn push(&self, message: M) -> Result<(), ChannelError> {
        self.sender.send(message).map_err(|_| ChannelError::Disconnected)
    }
}

impl MessageSink for InMemorySink<MessageEnvelope> {
    type Error = ChannelError;

    fn send(&self, envelope: MessageEnvelope) -> Result<(), Self::Error> {
        self.push(envelope)
    }
}

/// One direction of an in-memory channel: a sink for the sender and an inbox
/// for the receiver. A duplex link between two peers is two of these.
pub fn in_memory<M: Send>() -> (InMemorySink<M>, Inbox<M>) {
    let (sender, receiver) = mpsc::channel();
    (InMemorySink { sender }, Inbox { receiver })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SyncMessage;
    use stocklink_core::InventoryId;

    #[test]
    fn in_memory_channel_preserves_order() {
        let (sink, inbox) = in_memory::<MessageEnvelope>();
        let inventory_id = InventoryId::new();

        for sequence in 1..=3 {
            sink.send(MessageEnvelope::new(
                inventory_id,
                sequence,
                SyncMessage::RequestFullSet,
            ))
            .unwrap();
        }

        for expected in 1..=3 {
            assert_eq!(inbox.try_recv().unwrap().sequence(), expected);
        }
        assert!(inbox.try_recv().is_err());
    }

    #[test]
    fn send_fails_once_the_inbox_is_dropped() {
        let (sink, inbox) = in_memory::<MessageEnvelope>();
        drop(inbox);

        let envelope =
            MessageEnvelope::new(InventoryId::new(), 1, SyncMessage::RequestFullSet);
        assert!(matches!(sink.send(envelope), Err(ChannelError::Disconnected)));
    }
}
