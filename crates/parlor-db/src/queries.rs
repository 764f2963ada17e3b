use crate::Database;
use crate::models::{ConversationRow, MessageRow, ProfileRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;
use uuid::Uuid;

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    // -- Profiles --

    pub fn create_profile(&self, user_id: &str, display_name: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO profiles (user_id, display_name) VALUES (?1, ?2)",
                (user_id, display_name),
            )?;
            Ok(())
        })
    }

    /// Batch-fetch profiles for a set of user IDs. The message page joins
    /// author display data through this instead of a per-row lookup.
    pub fn get_profiles_for_users(&self, user_ids: &[String]) -> Result<Vec<ProfileRow>> {
        if user_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=user_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT user_id, display_name, avatar_url FROM profiles WHERE user_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = user_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(ProfileRow {
                        user_id: row.get(0)?,
                        display_name: row.get(1)?,
                        avatar_url: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Channels --

    /// Atomic find-or-create for the private channel between two users.
    ///
    /// Runs in a single transaction: either an existing channel whose member
    /// set is exactly {a, b} is returned, or a new channel plus both member
    /// rows is inserted. Repeated calls for the same pair (in either order)
    /// return the same id, and near-simultaneous calls cannot create
    /// duplicates.
    pub fn find_or_create_direct_channel(&self, a: &str, b: &str) -> Result<String> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if let Some(id) = query_direct_channel(&tx, a, b)? {
                tx.commit()?;
                return Ok(id);
            }

            let id = Uuid::new_v4().to_string();
            tx.execute("INSERT INTO channels (id, is_private) VALUES (?1, 1)", [&id])?;
            tx.execute(
                "INSERT INTO channel_members (channel_id, user_id) VALUES (?1, ?2)",
                (&id, a),
            )?;
            tx.execute(
                "INSERT INTO channel_members (channel_id, user_id) VALUES (?1, ?2)",
                (&id, b),
            )?;
            tx.commit()?;

            Ok(id)
        })
    }

    pub fn private_channels_of(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id FROM channels c
                 JOIN channel_members m ON m.channel_id = c.id
                 WHERE c.is_private = 1 AND m.user_id = ?1",
            )?;

            let rows = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;

            Ok(rows)
        })
    }

    pub fn channel_member_ids(&self, channel_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT user_id FROM channel_members WHERE channel_id = ?1")?;

            let rows = stmt
                .query_map([channel_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;

            Ok(rows)
        })
    }

    pub fn is_channel_member(&self, channel_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM channel_members WHERE channel_id = ?1 AND user_id = ?2",
                (channel_id, user_id),
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, id: &str, channel_id: &str, author_id: &str, body: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, channel_id, author_id, body) VALUES (?1, ?2, ?3, ?4)",
                (id, channel_id, author_id, body),
            )?;
            Ok(())
        })
    }

    pub fn get_messages(&self, channel_id: &str, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, channel_id, limit))
    }

    /// Delete a message, scoped to its author. A delete by anyone else
    /// matches zero rows; the returned count lets the caller tell the two
    /// apart without treating the mismatch as an error.
    pub fn delete_message(&self, message_id: &str, author_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "DELETE FROM messages WHERE id = ?1 AND author_id = ?2",
                (message_id, author_id),
            )?;
            Ok(rows)
        })
    }

    // -- Conversations --

    /// Derived view: every 2-member private channel the user belongs to,
    /// paired with the other member and the latest message. Recomputed per
    /// call, most recent activity first (channels with no messages last).
    pub fn conversations_for(&self, user_id: &str) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id,
                        other.user_id,
                        (SELECT body FROM messages
                          WHERE channel_id = c.id
                          ORDER BY created_at DESC, rowid DESC LIMIT 1),
                        (SELECT created_at FROM messages
                          WHERE channel_id = c.id
                          ORDER BY created_at DESC, rowid DESC LIMIT 1)
                 FROM channels c
                 JOIN channel_members me    ON me.channel_id = c.id AND me.user_id = ?1
                 JOIN channel_members other ON other.channel_id = c.id AND other.user_id <> ?1
                 WHERE c.is_private = 1
                   AND (SELECT COUNT(*) FROM channel_members m WHERE m.channel_id = c.id) = 2
                 ORDER BY 4 DESC",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ConversationRow {
                        channel_id: row.get(0)?,
                        other_user_id: row.get(1)?,
                        last_body: row.get(2)?,
                        last_created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, password, created_at FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, password, created_at FROM users WHERE id = ?1")?;

    let row = stmt
        .query_row([id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Find the private channel whose member set is exactly {a, b}.
/// The member-count subquery is load-bearing: a channel with any other
/// membership count must not match, even if both users belong to it.
fn query_direct_channel(conn: &Connection, a: &str, b: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare(
        "SELECT c.id FROM channels c
         JOIN channel_members m1 ON m1.channel_id = c.id AND m1.user_id = ?1
         JOIN channel_members m2 ON m2.channel_id = c.id AND m2.user_id = ?2
         WHERE c.is_private = 1
           AND (SELECT COUNT(*) FROM channel_members m WHERE m.channel_id = c.id) = 2
         LIMIT 1",
    )?;

    let row = stmt.query_row((a, b), |row| row.get(0)).optional()?;

    Ok(row)
}

fn query_messages(conn: &Connection, channel_id: &str, limit: u32) -> Result<Vec<MessageRow>> {
    // Ascending by creation time; rowid breaks ties for messages stored
    // within the same second. Author display data is joined by the caller
    // through a batched profile fetch, not here.
    let mut stmt = conn.prepare(
        "SELECT id, channel_id, author_id, body, created_at
         FROM messages
         WHERE channel_id = ?1
         ORDER BY created_at ASC, rowid ASC
         LIMIT ?2",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![channel_id, limit], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                channel_id: row.get(1)?,
                author_id: row.get(2)?,
                body: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
