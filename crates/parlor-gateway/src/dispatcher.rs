use std::sync::Arc;

use tokio::sync::broadcast;

use parlor_types::events::GatewayEvent;

/// Fans gateway events out to every connected client. Each connection
/// holds its own broadcast receiver and filters channel-scoped events
/// against its active subscription before forwarding to the socket.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<GatewayEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn message_delete(channel_id: Uuid) -> GatewayEvent {
        GatewayEvent::MessageDelete {
            channel_id,
            message_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn each_receiver_sees_one_copy_per_broadcast() {
        let dispatcher = Dispatcher::new();
        let mut rx_a = dispatcher.subscribe();
        let mut rx_b = dispatcher.subscribe();

        dispatcher.broadcast(message_delete(Uuid::new_v4()));

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn late_subscribers_miss_earlier_events() {
        let dispatcher = Dispatcher::new();
        dispatcher.broadcast(message_delete(Uuid::new_v4()));

        let mut rx = dispatcher.subscribe();
        assert!(rx.try_recv().is_err());
    }
}
