use anyhow::Context;
use tracing::warn;
use uuid::Uuid;

use parlor_db::Database;

use crate::resolver::{ChannelDirectory, DirectoryError};

/// Bind the resolver's directory surface to the SQLite store. The store
/// always carries the atomic find-or-create, so the scan fallback is never
/// taken against it; it exists for backends that lack the operation.
impl ChannelDirectory for Database {
    fn find_or_create_direct(&self, a: Uuid, b: Uuid) -> Result<Uuid, DirectoryError> {
        let id = self.find_or_create_direct_channel(&a.to_string(), &b.to_string())?;
        let id = id.parse().context("stored channel id is not a UUID")?;
        Ok(id)
    }

    fn private_channels_of(&self, user: Uuid) -> Result<Vec<Uuid>, DirectoryError> {
        let ids = Database::private_channels_of(self, &user.to_string())?;
        Ok(parse_ids(ids))
    }

    fn channel_member_ids(&self, channel: Uuid) -> Result<Vec<Uuid>, DirectoryError> {
        let ids = Database::channel_member_ids(self, &channel.to_string())?;
        Ok(parse_ids(ids))
    }
}

/// Corrupt ids are dropped with a warning rather than failing the whole
/// resolution; a dropped member row changes the member count, so the
/// affected channel simply stops matching.
fn parse_ids(raw: Vec<String>) -> Vec<Uuid> {
    raw.into_iter()
        .filter_map(|id| match id.parse() {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Corrupt id '{}' in store: {}", id, e);
                None
            }
        })
        .collect()
}
