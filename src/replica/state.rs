//! Per-replica mutable state (§3, §4.3). A pure container: gated insertion
//! helpers auto-initialise the nested vote sets, but the acceptance
//! predicates that decide *whether* to call them live in `handler`, not here.

use std::collections::{HashMap, HashSet};

use crate::messages::{ClientMessage, Digest, Request};

/// Whether this replica assigns sequence numbers (`N0`, statically) or follows them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaRole {
    /// The fixed primary.
    Primary,
    /// Any non-primary replica.
    Backup,
}

/// The mutable state one replica keeps across the lifetime of the process.
/// No entry is ever removed (§3 "Lifecycles" — no checkpointing in this core).
#[derive(Debug, Default)]
pub struct ReplicaState {
    /// Highest sequence number this replica has accepted, via PRE-PREPARE.
    seq: u64,
    /// Accepted pending requests, keyed by digest.
    request_pool: HashMap<Digest, Request>,
    /// Who has sent us a valid PREPARE for this digest.
    prepare_votes: HashMap<Digest, HashSet<String>>,
    /// Who has sent us a valid COMMIT for this digest.
    commit_votes: HashMap<Digest, HashSet<String>>,
    /// Digests we have already broadcast our own COMMIT for.
    commit_broadcast: HashSet<Digest>,
    /// Digests we have already delivered and replied to the client for.
    replied: HashSet<Digest>,
    /// The committed application log — the "local message pool".
    log: Vec<ClientMessage>,
}

impl ReplicaState {
    /// A fresh replica state with `seq = 0` and every set empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current sequence number.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Increments `seq` and returns the new value. Used only by the primary
    /// on `REQUEST` arrival (§4.4.1).
    pub fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Advances `seq` to `new_seq`, used by backups on PRE-PREPARE acceptance
    /// (§4.4.2). Callers are responsible for having already checked
    /// `new_seq == seq + 1`; this never decreases `seq` (invariant 5).
    pub fn advance_seq(&mut self, new_seq: u64) {
        if new_seq > self.seq {
            self.seq = new_seq;
        }
    }

    /// Stores or overwrites the request for `digest` in the temporary pool.
    pub fn insert_request(&mut self, digest: Digest, req: Request) {
        self.request_pool.insert(digest, req);
    }

    /// The pooled request for `digest`, if this replica has seen one.
    pub fn request(&self, digest: &str) -> Option<&Request> {
        self.request_pool.get(digest)
    }

    /// `true` once this replica has pooled a request for `digest`.
    pub fn has_request(&self, digest: &str) -> bool {
        self.request_pool.contains_key(digest)
    }

    /// Records a PREPARE vote from `node_id` for `digest` and returns the
    /// resulting quorum size. Auto-initialises the vote set on first use.
    pub fn record_prepare_vote(&mut self, digest: &str, node_id: &str) -> usize {
        let votes = self
            .prepare_votes
            .entry(digest.to_string())
            .or_insert_with(HashSet::new);
        votes.insert(node_id.to_string());
        votes.len()
    }

    /// `true` once this replica has validated at least one PREPARE for `digest`.
    pub fn has_prepare_votes(&self, digest: &str) -> bool {
        self.prepare_votes.contains_key(digest)
    }

    /// Records a COMMIT vote from `node_id` for `digest` and returns the
    /// resulting quorum size. Auto-initialises the vote set on first use.
    pub fn record_commit_vote(&mut self, digest: &str, node_id: &str) -> usize {
        let votes = self
            .commit_votes
            .entry(digest.to_string())
            .or_insert_with(HashSet::new);
        votes.insert(node_id.to_string());
        votes.len()
    }

    /// `true` once this replica has already broadcast its own COMMIT for `digest`.
    pub fn is_commit_broadcast(&self, digest: &str) -> bool {
        self.commit_broadcast.contains(digest)
    }

    /// Marks `digest` as having had its COMMIT broadcast. Idempotent, but
    /// callers only call this once per digest, under the quorum-test lock.
    pub fn mark_commit_broadcast(&mut self, digest: &str) {
        self.commit_broadcast.insert(digest.to_string());
    }

    /// `true` once this replica has already replied to the client for `digest`.
    pub fn is_replied(&self, digest: &str) -> bool {
        self.replied.contains(digest)
    }

    /// Appends `message` to the committed log and marks `digest` as replied.
    /// The caller (§4.4.4) is responsible for having checked the commit
    /// quorum and `commit_broadcast` first.
    pub fn commit_and_mark_replied(&mut self, digest: &str, message: ClientMessage) {
        self.log.push(message);
        self.replied.insert(digest.to_string());
    }

    /// The committed application log, in commit order.
    pub fn log(&self) -> &[ClientMessage] {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_only_advances_forward() {
        let mut state = ReplicaState::new();
        state.advance_seq(5);
        state.advance_seq(2);
        assert_eq!(state.seq(), 5);
    }

    #[test]
    fn next_seq_increments_from_zero() {
        let mut state = ReplicaState::new();
        assert_eq!(state.next_seq(), 1);
        assert_eq!(state.next_seq(), 2);
    }

    #[test]
    fn prepare_votes_are_set_semantics() {
        let mut state = ReplicaState::new();
        assert_eq!(state.record_prepare_vote("d", "N1"), 1);
        assert_eq!(state.record_prepare_vote("d", "N1"), 1, "replay is a no-op");
        assert_eq!(state.record_prepare_vote("d", "N2"), 2);
    }

    #[test]
    fn commit_broadcast_and_replied_flags_are_independent_per_digest() {
        let mut state = ReplicaState::new();
        state.mark_commit_broadcast("d1");
        assert!(state.is_commit_broadcast("d1"));
        assert!(!state.is_commit_broadcast("d2"));
        assert!(!state.is_replied("d1"));
    }
}
