use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A new message was posted
    MessageCreate {
        id: Uuid,
        channel_id: Uuid,
        author_id: Uuid,
        author_username: String,
        body: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A message was deleted by its author
    MessageDelete { channel_id: Uuid, message_id: Uuid },
}

impl GatewayEvent {
    /// Returns the channel_id if this event is scoped to a specific channel.
    /// Channel-scoped events are only delivered to connections whose active
    /// subscription matches.
    pub fn channel_id(&self) -> Option<Uuid> {
        match self {
            Self::MessageCreate { channel_id, .. } => Some(*channel_id),
            Self::MessageDelete { channel_id, .. } => Some(*channel_id),
            // Ready is connection-local
            Self::Ready { .. } => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Follow one channel's events. Replaces any previous subscription:
    /// a connection follows at most one channel at a time.
    Subscribe { channel_id: Uuid },

    /// Stop following the current channel
    Unsubscribe,
}
