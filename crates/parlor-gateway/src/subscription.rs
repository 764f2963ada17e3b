use uuid::Uuid;

use parlor_types::events::GatewayEvent;

/// Per-connection subscription state.
///
/// A connection follows at most one channel at a time: subscribing while
/// already subscribed replaces the previous channel, and unsubscribing
/// (or connection teardown) returns to the unsubscribed state.
#[derive(Debug, Default)]
pub struct Subscription {
    active: Option<Uuid>,
}

impl Subscription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow `channel_id`. Returns the channel that was replaced, if any.
    pub fn subscribe(&mut self, channel_id: Uuid) -> Option<Uuid> {
        self.active.replace(channel_id)
    }

    /// Stop following the current channel. Returns it, if any.
    pub fn unsubscribe(&mut self) -> Option<Uuid> {
        self.active.take()
    }

    pub fn active(&self) -> Option<Uuid> {
        self.active
    }

    /// Whether this connection should receive `event`. Channel-scoped
    /// events require a matching active subscription; unscoped events go
    /// to every connection.
    pub fn wants(&self, event: &GatewayEvent) -> bool {
        match event.channel_id() {
            Some(channel_id) => self.active == Some(channel_id),
            None => true,
        }
    }
}
