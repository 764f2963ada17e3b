use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS profiles (
            user_id       TEXT PRIMARY KEY REFERENCES users(id),
            display_name  TEXT NOT NULL,
            avatar_url    TEXT,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS channels (
            id          TEXT PRIMARY KEY,
            is_private  INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS channel_members (
            channel_id  TEXT NOT NULL REFERENCES channels(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            PRIMARY KEY (channel_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_members_user
            ON channel_members(user_id);

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            channel_id  TEXT NOT NULL REFERENCES channels(id),
            author_id   TEXT NOT NULL REFERENCES users(id),
            body        TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_channel
            ON messages(channel_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
