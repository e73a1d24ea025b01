//! Server half of reconciliation: turn a client's digest list into the
//! push-down and pull-up sets.

use crate::models::{Record, SyncDigest};
use crate::rpc::ReconcileResponse;
use crate::sync::conflict::{ConflictResolver, Resolution};
use std::collections::{HashMap, HashSet};

/// Plan one reconciliation for a single owner.
///
/// `server_records` must be every record the owner has on the server,
/// tombstones included. Records the client did not mention are pushed down,
/// so an empty digest list yields everything. Digests for ids the server has
/// never stored are requested back.
pub fn plan(server_records: Vec<Record>, digests: &[SyncDigest]) -> ReconcileResponse {
    let mut remaining: HashMap<_, _> = server_records.into_iter().map(|r| (r.id, r)).collect();
    let mut seen = HashSet::with_capacity(digests.len());
    let mut response = ReconcileResponse::default();

    for digest in digests {
        if !seen.insert(digest.id) {
            continue;
        }
        match remaining.remove(&digest.id) {
            Some(server) => match ConflictResolver::resolve(&server, digest) {
                Resolution::Unchanged => {}
                Resolution::PushDown => response.push_down.push(server),
                Resolution::PullUp => response.pull_up.push(digest.id),
            },
            None => response.pull_up.push(digest.id),
        }
    }

    let mut unseen: Vec<Record> = remaining.into_values().collect();
    unseen.sort_by_key(|r| (r.updated_at, r.id));
    response.push_down.extend(unseen);
    response
}
