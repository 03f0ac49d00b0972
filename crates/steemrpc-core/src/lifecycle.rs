//! Transport lifecycle notifications.
//!
//! Observers subscribe to a [`Lifecycle`] hub and receive [`TransportEvent`]s.
//! Publishing never blocks and never fails: events sent while nobody listens
//! are dropped, and slow receivers lag rather than stall the transport.

use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 64;

/// A transport state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// `start()` was called.
    Started { url: String },
    /// A connection to the node was established.
    Connected { url: String },
    /// The connection dropped; the transport may reconnect.
    Disconnected { url: String },
    /// `stop()` was called.
    Stopped { url: String },
}

/// Broadcast hub for [`TransportEvent`]s.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    tx: broadcast::Sender<TransportEvent>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Lifecycle {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all current subscribers.
    pub fn emit(&self, event: TransportEvent) {
        tracing::trace!(?event, "transport lifecycle");
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_subscribers_is_silent() {
        let hub = Lifecycle::default();
        hub.emit(TransportEvent::Started { url: "ws://a".into() });
    }

    #[test]
    fn subscribers_receive_in_order() {
        let hub = Lifecycle::default();
        let mut rx = hub.subscribe();
        hub.emit(TransportEvent::Connected { url: "ws://a".into() });
        hub.emit(TransportEvent::Disconnected { url: "ws://a".into() });

        assert_eq!(
            rx.try_recv().unwrap(),
            TransportEvent::Connected { url: "ws://a".into() }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            TransportEvent::Disconnected { url: "ws://a".into() }
        );
    }
}
