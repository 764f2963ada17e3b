use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// JWT claims shared between parlor-api (REST middleware) and
/// parlor-gateway (WebSocket Identify). Canonical definition lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Channels --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenDirectChannelRequest {
    /// The other participant. The session user is always the first member.
    pub user_id: Uuid,
}

/// `channel_id` is null when resolution failed or the fallback path found
/// no existing channel. Callers treat null as "no conversation yet".
#[derive(Debug, Serialize, Deserialize)]
pub struct DirectChannelResponse {
    pub channel_id: Option<Uuid>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub author_id: Uuid,
    pub author_display_name: String,
    pub author_avatar_url: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DeleteMessageResponse {
    pub deleted: bool,
}

// -- Conversations --

#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    pub channel_id: Uuid,
    pub other_user_id: Uuid,
    pub other_display_name: String,
    pub other_avatar_url: Option<String>,
    pub last_message: Option<LastMessage>,
}

#[derive(Debug, Serialize)]
pub struct LastMessage {
    pub body: String,
    pub created_at: DateTime<Utc>,
}
