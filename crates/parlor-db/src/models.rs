/// Database row types — these map directly to SQLite rows.
/// Distinct from parlor-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct ProfileRow {
    pub user_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

pub struct MessageRow {
    pub id: String,
    pub channel_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: String,
}

/// One row of the derived conversation view: the caller's private channel,
/// the other member, and that channel's most recent message (if any).
pub struct ConversationRow {
    pub channel_id: String,
    pub other_user_id: String,
    pub last_body: Option<String>,
    pub last_created_at: Option<String>,
}
