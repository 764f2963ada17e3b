use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// The backend surface channel resolution depends on. Keeping it behind a
/// trait decouples the resolver from the concrete store and makes the
/// fallback path reachable in tests.
pub trait ChannelDirectory {
    /// Atomic find-or-create: one transactional operation that returns the
    /// private channel for {a, b}, creating it if absent. Backends that
    /// predate this operation return [`DirectoryError::Unsupported`].
    fn find_or_create_direct(&self, a: Uuid, b: Uuid) -> Result<Uuid, DirectoryError>;

    fn private_channels_of(&self, user: Uuid) -> Result<Vec<Uuid>, DirectoryError>;

    fn channel_member_ids(&self, channel: Uuid) -> Result<Vec<Uuid>, DirectoryError>;
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The atomic find-or-create operation does not exist on this backend.
    /// Triggers the scan fallback instead of failing the resolution.
    #[error("atomic find-or-create is not available")]
    Unsupported,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Resolve the private channel between two users.
///
/// Prefers the directory's atomic find-or-create. When that operation is
/// unavailable, falls back to scanning `user_a`'s private channels for a
/// member set of exactly {a, b}. Resolution failures are logged and
/// surface as `None`; nothing is retried.
pub fn resolve_direct<D: ChannelDirectory>(directory: &D, user_a: Uuid, user_b: Uuid) -> Option<Uuid> {
    // A private channel requires two distinct members.
    if user_a == user_b {
        return None;
    }

    match directory.find_or_create_direct(user_a, user_b) {
        Ok(channel_id) => Some(channel_id),
        Err(DirectoryError::Unsupported) => scan_existing(directory, user_a, user_b),
        Err(e) => {
            warn!("direct channel resolution for {} / {} failed: {:#}", user_a, user_b, e);
            None
        }
    }
}

/// Fallback for backends without the atomic operation. Never creates a
/// channel: creation outside a single transaction can race a concurrent
/// resolver and leave the pair with duplicate channels, so an absent
/// channel resolves to `None` here.
fn scan_existing<D: ChannelDirectory>(directory: &D, user_a: Uuid, user_b: Uuid) -> Option<Uuid> {
    let channels = match directory.private_channels_of(user_a) {
        Ok(channels) => channels,
        Err(e) => {
            warn!("listing private channels of {} failed: {:#}", user_a, e);
            return None;
        }
    };

    for channel_id in channels {
        let members = match directory.channel_member_ids(channel_id) {
            Ok(members) => members,
            Err(e) => {
                warn!("fetching members of channel {} failed: {:#}", channel_id, e);
                return None;
            }
        };

        // Any membership count other than 2 is not a direct channel,
        // even if both users belong to it.
        if members.len() != 2 {
            continue;
        }
        if members.contains(&user_a) && members.contains(&user_b) {
            return Some(channel_id);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// In-memory directory with a switchable atomic path.
    struct MockDirectory {
        channels: Vec<(Uuid, Vec<Uuid>)>,
        atomic_available: bool,
        fail_all: bool,
        atomic_calls: Cell<u32>,
    }

    impl MockDirectory {
        fn new(channels: Vec<(Uuid, Vec<Uuid>)>) -> Self {
            Self {
                channels,
                atomic_available: true,
                fail_all: false,
                atomic_calls: Cell::new(0),
            }
        }

        fn without_atomic(mut self) -> Self {
            self.atomic_available = false;
            self
        }

        fn failing(mut self) -> Self {
            self.fail_all = true;
            self
        }
    }

    impl ChannelDirectory for MockDirectory {
        fn find_or_create_direct(&self, a: Uuid, b: Uuid) -> Result<Uuid, DirectoryError> {
            self.atomic_calls.set(self.atomic_calls.get() + 1);
            if self.fail_all {
                return Err(anyhow::anyhow!("backend unreachable").into());
            }
            if !self.atomic_available {
                return Err(DirectoryError::Unsupported);
            }
            for (id, members) in &self.channels {
                if members.len() == 2 && members.contains(&a) && members.contains(&b) {
                    return Ok(*id);
                }
            }
            Ok(Uuid::new_v4())
        }

        fn private_channels_of(&self, user: Uuid) -> Result<Vec<Uuid>, DirectoryError> {
            if self.fail_all {
                return Err(anyhow::anyhow!("backend unreachable").into());
            }
            Ok(self
                .channels
                .iter()
                .filter(|(_, members)| members.contains(&user))
                .map(|(id, _)| *id)
                .collect())
        }

        fn channel_member_ids(&self, channel: Uuid) -> Result<Vec<Uuid>, DirectoryError> {
            if self.fail_all {
                return Err(anyhow::anyhow!("backend unreachable").into());
            }
            Ok(self
                .channels
                .iter()
                .find(|(id, _)| *id == channel)
                .map(|(_, members)| members.clone())
                .unwrap_or_default())
        }
    }

    #[test]
    fn atomic_path_is_preferred() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let existing = Uuid::new_v4();
        let directory = MockDirectory::new(vec![(existing, vec![a, b])]);

        assert_eq!(resolve_direct(&directory, a, b), Some(existing));
        assert_eq!(directory.atomic_calls.get(), 1);
    }

    #[test]
    fn same_user_never_resolves() {
        let a = Uuid::new_v4();
        let directory = MockDirectory::new(vec![]);

        assert_eq!(resolve_direct(&directory, a, a), None);
        assert_eq!(directory.atomic_calls.get(), 0);
    }

    #[test]
    fn fallback_finds_the_exact_pair() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let wrong_pair = Uuid::new_v4();
        let target = Uuid::new_v4();
        let directory = MockDirectory::new(vec![
            (wrong_pair, vec![a, c]),
            (target, vec![a, b]),
        ])
        .without_atomic();

        assert_eq!(resolve_direct(&directory, a, b), Some(target));
    }

    #[test]
    fn fallback_skips_channels_with_other_member_counts() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let solo = Uuid::new_v4();
        let group = Uuid::new_v4();
        let directory = MockDirectory::new(vec![
            (solo, vec![a]),
            // Both users present, but a third member makes it a group.
            (group, vec![a, b, c]),
        ])
        .without_atomic();

        assert_eq!(resolve_direct(&directory, a, b), None);
    }

    #[test]
    fn fallback_never_creates() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let directory = MockDirectory::new(vec![]).without_atomic();

        assert_eq!(resolve_direct(&directory, a, b), None);
        // The atomic call was attempted once (and reported Unsupported);
        // the fallback made no further attempt to create anything.
        assert_eq!(directory.atomic_calls.get(), 1);
    }

    #[test]
    fn store_errors_surface_as_none() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let directory = MockDirectory::new(vec![]).failing();

        assert_eq!(resolve_direct(&directory, a, b), None);
    }
}
