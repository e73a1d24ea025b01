//! Last-writer-wins resolution between a server record and a client digest.

use crate::crypto::content_hash;
use crate::models::{Record, SyncDigest};

/// Outcome of comparing one server record with the client's digest of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Hashes match; nothing to exchange.
    Unchanged,
    /// Server copy is authoritative; send it down.
    PushDown,
    /// Client holds a newer copy; ask for it.
    PullUp,
}

/// The one tie-break rule of the protocol: on equal timestamps the server wins.
pub fn server_wins(remote_updated_at: i64, client_updated_at: i64) -> bool {
    remote_updated_at >= client_updated_at
}

pub struct ConflictResolver;

impl ConflictResolver {
    /// Resolve a server record against the client's digest for the same id.
    ///
    /// 1. Equal content hashes: unchanged.
    /// 2. Server tombstone: push down.
    /// 3. Client tombstone: pull up.
    /// 4. Otherwise [`server_wins`] decides between push-down and pull-up.
    ///
    /// A tombstone on either side is never resurrected by a live edit.
    pub fn resolve(server: &Record, client: &SyncDigest) -> Resolution {
        if content_hash(server.content.as_deref()) == client.content_hash {
            return Resolution::Unchanged;
        }
        if server.deleted {
            return Resolution::PushDown;
        }
        if client.deleted {
            return Resolution::PullUp;
        }
        if server_wins(server.updated_at, client.updated_at) {
            Resolution::PushDown
        } else {
            Resolution::PullUp
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordKind;
    use uuid::Uuid;

    fn server(content: &[u8], updated_at: i64) -> Record {
        Record {
            id: Uuid::new_v4(),
            name: Some("mail".to_string()),
            kind: RecordKind::Credential,
            content: Some(content.to_vec()),
            updated_at,
            deleted: false,
        }
    }

    fn digest_of(record: &Record, content: &[u8], updated_at: i64) -> SyncDigest {
        SyncDigest {
            id: record.id,
            content_hash: content_hash(Some(content)),
            updated_at,
            deleted: false,
        }
    }

    #[test]
    fn tie_goes_to_server() {
        assert!(server_wins(1000, 1000));
        assert!(server_wins(1001, 1000));
        assert!(!server_wins(999, 1000));
    }

    #[test]
    fn equal_hash_is_unchanged_regardless_of_time() {
        let s = server(b"same", 5000);
        assert_eq!(
            ConflictResolver::resolve(&s, &digest_of(&s, b"same", 1)),
            Resolution::Unchanged
        );
        assert_eq!(
            ConflictResolver::resolve(&s, &digest_of(&s, b"same", 9999)),
            Resolution::Unchanged
        );
    }

    #[test]
    fn newer_server_pushes_down() {
        let s = server(b"v2", 2000);
        assert_eq!(
            ConflictResolver::resolve(&s, &digest_of(&s, b"v1", 1000)),
            Resolution::PushDown
        );
    }

    #[test]
    fn newer_client_is_pulled_up() {
        let s = server(b"v1", 1000);
        assert_eq!(
            ConflictResolver::resolve(&s, &digest_of(&s, b"v2", 2000)),
            Resolution::PullUp
        );
    }

    #[test]
    fn equal_timestamps_different_hash_resolve_to_server_repeatably() {
        let s = server(b"server", 1500);
        let d = digest_of(&s, b"client", 1500);
        for _ in 0..10 {
            assert_eq!(ConflictResolver::resolve(&s, &d), Resolution::PushDown);
        }
    }

    #[test]
    fn server_tombstone_beats_newer_client() {
        let mut s = server(b"", 1000);
        s.deleted = true;
        s.content = None;
        s.name = None;
        assert_eq!(
            ConflictResolver::resolve(&s, &digest_of(&s, b"live", 9000)),
            Resolution::PushDown
        );
    }

    #[test]
    fn client_tombstone_beats_newer_server() {
        let s = server(b"edited", 9000);
        let tombstone = SyncDigest {
            id: s.id,
            content_hash: content_hash(None),
            updated_at: 1000,
            deleted: true,
        };
        assert_eq!(ConflictResolver::resolve(&s, &tombstone), Resolution::PullUp);
    }
}
