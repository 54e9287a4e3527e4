//! The PBFT state machine itself (§4.4): four message handlers, the quorum
//! tests that drive phase transitions, and outbound broadcast. Dispatch is
//! synchronous — only the broadcast/reply sends suspend, and they do so on
//! independent tasks spawned after the state lock is released (§5).

use log::{debug, info, warn};

use crate::codec::{self};
use crate::config::PRIMARY_ID;
use crate::crypto;
use crate::messages::{Command, Commit, PrePrepare, Prepare, Request};
use crate::network;
use crate::replica::state::ReplicaRole;
use crate::replica::Replica;

impl Replica {
    /// Entry point for a freshly-received frame (§4.4). Decodes it and
    /// dispatches by command tag; anything that fails to decode, or whose tag
    /// isn't one of the four known commands, is dropped silently.
    pub fn handle(&self, frame: Vec<u8>) {
        let (cmd, payload) = match codec::split(&frame) {
            Some(parts) => parts,
            None => {
                warn!("{}: dropping malformed or unknown frame", self.id());
                return;
            }
        };

        match cmd {
            Command::Request => match serde_json::from_slice::<Request>(payload) {
                Ok(req) => self.handle_request(req),
                Err(e) => warn!("{}: dropping malformed REQUEST: {}", self.id(), e),
            },
            Command::PrePrepare => match serde_json::from_slice::<PrePrepare>(payload) {
                Ok(pp) => self.handle_pre_prepare(pp),
                Err(e) => warn!("{}: dropping malformed PRE-PREPARE: {}", self.id(), e),
            },
            Command::Prepare => match serde_json::from_slice::<Prepare>(payload) {
                Ok(pre) => self.handle_prepare(pre),
                Err(e) => warn!("{}: dropping malformed PREPARE: {}", self.id(), e),
            },
            Command::Commit => match serde_json::from_slice::<Commit>(payload) {
                Ok(c) => self.handle_commit(c),
                Err(e) => warn!("{}: dropping malformed COMMIT: {}", self.id(), e),
            },
        }
    }

    /// §4.4.1. Only meaningful on the primary; a backup that somehow receives
    /// a REQUEST logs and drops it instead of ordering it.
    fn handle_request(&self, req: Request) {
        if self.role() != ReplicaRole::Primary {
            warn!("{}: non-primary received a REQUEST, dropping", self.id());
            return;
        }

        let digest_bytes = crypto::digest_bytes(&req);
        let digest = hex::encode(digest_bytes);

        let seq = {
            let mut state = self.state().lock().expect("replica state lock poisoned");
            let seq = state.next_seq();
            state.insert_request(digest.clone(), req.clone());
            seq
        };

        let sign = match self.keys().sign(&digest_bytes) {
            Ok(sig) => sig,
            Err(e) => {
                warn!("{}: failed to sign PRE-PREPARE: {}", self.id(), e);
                return;
            }
        };

        debug!("{}: assigned seq {} to digest {}", self.id(), seq, digest);

        let pp = PrePrepare {
            request: req,
            digest,
            seq,
            sign,
        };
        let payload = serde_json::to_vec(&pp).expect("PrePrepare serialises infallibly");
        self.broadcast(Command::PrePrepare, payload);
    }

    /// §4.4.2. Executed by backups (the primary never sends itself one).
    fn handle_pre_prepare(&self, pp: PrePrepare) {
        let recomputed = crypto::digest(&pp.request);
        if recomputed != pp.digest {
            warn!("{}: PRE-PREPARE digest mismatch, dropping", self.id());
            return;
        }

        let digest_bytes = match crypto::decode_digest(&pp.digest) {
            Some(bytes) => bytes,
            None => {
                warn!("{}: PRE-PREPARE digest is not valid hex, dropping", self.id());
                return;
            }
        };

        if !self.keys().verify(&digest_bytes, &pp.sign, PRIMARY_ID) {
            warn!("{}: PRE-PREPARE signature invalid, dropping", self.id());
            return;
        }

        {
            let state = self.state().lock().expect("replica state lock poisoned");
            if pp.seq != state.seq() + 1 {
                warn!(
                    "{}: PRE-PREPARE seq {} out of order (have {}), dropping",
                    self.id(),
                    pp.seq,
                    state.seq()
                );
                return;
            }
        }

        let sign = {
            let mut state = self.state().lock().expect("replica state lock poisoned");
            // Re-check under the lock: another task may have advanced seq
            // between the read above and here.
            if pp.seq != state.seq() + 1 {
                warn!("{}: PRE-PREPARE seq {} raced out of order, dropping", self.id(), pp.seq);
                return;
            }
            state.advance_seq(pp.seq);
            state.insert_request(pp.digest.clone(), pp.request.clone());
            match self.keys().sign(&digest_bytes) {
                Ok(sig) => sig,
                Err(e) => {
                    warn!("{}: failed to sign PREPARE: {}", self.id(), e);
                    return;
                }
            }
        };

        debug!("{}: accepted PRE-PREPARE for seq {}", self.id(), pp.seq);

        let prepare = Prepare {
            digest: pp.digest,
            seq: pp.seq,
            node_id: self.id().to_string(),
            sign,
        };
        let payload = serde_json::to_vec(&prepare).expect("Prepare serialises infallibly");
        self.broadcast(Command::Prepare, payload);
    }

    /// §4.4.3.
    fn handle_prepare(&self, pre: Prepare) {
        let digest_bytes = match crypto::decode_digest(&pre.digest) {
            Some(bytes) => bytes,
            None => {
                warn!("{}: PREPARE digest is not valid hex, dropping", self.id());
                return;
            }
        };

        if !self.keys().verify(&digest_bytes, &pre.sign, &pre.node_id) {
            warn!("{}: PREPARE signature invalid from {}, dropping", self.id(), pre.node_id);
            return;
        }

        let outcome = {
            let mut state = self.state().lock().expect("replica state lock poisoned");

            if !state.has_request(&pre.digest) {
                warn!("{}: PREPARE for unknown digest, dropping", self.id());
                return;
            }
            if pre.seq != state.seq() {
                warn!(
                    "{}: PREPARE seq {} does not match current seq {}, dropping",
                    self.id(),
                    pre.seq,
                    state.seq()
                );
                return;
            }

            let votes = state.record_prepare_vote(&pre.digest, &pre.node_id);
            let threshold = self.prepare_threshold();

            if votes >= threshold && !state.is_commit_broadcast(&pre.digest) {
                match self.keys().sign(&digest_bytes) {
                    Ok(sign) => {
                        state.mark_commit_broadcast(&pre.digest);
                        Some(sign)
                    }
                    Err(e) => {
                        warn!("{}: failed to sign COMMIT: {}", self.id(), e);
                        None
                    }
                }
            } else {
                None
            }
        };

        if let Some(sign) = outcome {
            info!(
                "{}: reached prepare quorum for digest {}, broadcasting COMMIT",
                self.id(),
                pre.digest
            );
            let commit = Commit {
                digest: pre.digest,
                seq: pre.seq,
                node_id: self.id().to_string(),
                sign,
            };
            let payload = serde_json::to_vec(&commit).expect("Commit serialises infallibly");
            self.broadcast(Command::Commit, payload);
        }
    }

    /// §4.4.4.
    fn handle_commit(&self, c: Commit) {
        let digest_bytes = match crypto::decode_digest(&c.digest) {
            Some(bytes) => bytes,
            None => {
                warn!("{}: COMMIT digest is not valid hex, dropping", self.id());
                return;
            }
        };

        if !self.keys().verify(&digest_bytes, &c.sign, &c.node_id) {
            warn!("{}: COMMIT signature invalid from {}, dropping", self.id(), c.node_id);
            return;
        }

        let reply = {
            let mut state = self.state().lock().expect("replica state lock poisoned");

            if !state.has_prepare_votes(&c.digest) {
                warn!("{}: COMMIT for digest with no prepare votes, dropping", self.id());
                return;
            }
            if c.seq != state.seq() {
                warn!(
                    "{}: COMMIT seq {} does not match current seq {}, dropping",
                    self.id(),
                    c.seq,
                    state.seq()
                );
                return;
            }

            let votes = state.record_commit_vote(&c.digest, &c.node_id);
            let threshold = self.commit_threshold();

            if votes >= threshold && state.is_commit_broadcast(&c.digest) && !state.is_replied(&c.digest)
            {
                let request = state
                    .request(&c.digest)
                    .cloned()
                    .expect("invariant 1: digest in commit_votes implies request_pool entry");
                state.commit_and_mark_replied(&c.digest, request.message.clone());
                Some((request.client_addr, request.message))
            } else {
                None
            }
        };

        if let Some((client_addr, message)) = reply {
            info!(
                "{}: committed digest {} locally, replying to {}",
                self.id(),
                c.digest,
                client_addr
            );
            let text = format!(
                "{} committed message id {} with content: {}",
                self.id(),
                message.id,
                message.content
            );
            self.reply(client_addr, text);
        }
    }

    /// §4.4.3: required PREPARE votes, asymmetric between primary and backup.
    fn prepare_threshold(&self) -> usize {
        let n = self.roster().len();
        let base = (2 * n) / 3;
        match self.role() {
            ReplicaRole::Primary => base,
            ReplicaRole::Backup => base.saturating_sub(1),
        }
    }

    /// §4.4.4: required COMMIT votes (`⌊2N/3⌋`, matching the reference's coded
    /// threshold rather than the textbook `2f+1` — see §9 Open Question 1).
    fn commit_threshold(&self) -> usize {
        let n = self.roster().len();
        (2 * n) / 3
    }

    /// §4.4.5. Sends `cmd`/`payload` to every other replica in the roster,
    /// each on its own fire-and-forget task. Never called while holding the
    /// state lock.
    fn broadcast(&self, cmd: Command, payload: Vec<u8>) {
        let frame = codec::join(cmd, &payload);
        let self_id = self.id().to_string();
        for peer in self.roster().peers_of(self.id()) {
            let peer = peer.to_string();
            let addr = match self.roster().addr_of(&peer) {
                Some(addr) => addr.to_string(),
                None => continue,
            };
            let frame = frame.clone();
            let self_id = self_id.clone();
            tokio::spawn(async move {
                if let Err(e) = network::send_frame(&addr, &frame).await {
                    warn!("{}: failed to send {:?} to {}: {}", self_id, cmd, peer, e);
                }
            });
        }
    }

    /// Sends a plain-text REPLY directly to the client's listen address.
    fn reply(&self, client_addr: String, text: String) {
        let self_id = self.id().to_string();
        tokio::spawn(async move {
            if let Err(e) = network::send_frame(&client_addr, text.as_bytes()).await {
                warn!("{}: failed to reply to {}: {}", self_id, client_addr, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Roster;
    use crate::crypto::Keys;

    /// Builds a replica with real (disk-backed) key material, the only way
    /// to get a `Replica` at all, under a key dir unique to `label` so
    /// parallel test threads don't race on the same files.
    fn build_replica(label: &str, id: &str) -> Replica {
        let key_dir = std::env::temp_dir()
            .join(format!("pbft-handler-test-{}-{}", label, std::process::id()))
            .to_string_lossy()
            .into_owned();
        let roster = Roster::demo();
        crypto::provision_keys(&roster, &key_dir).expect("key provisioning");
        let keys = Keys::load(&roster, id, &key_dir).expect("key load");
        Replica::new(id.to_string(), roster, keys)
    }

    #[test]
    fn prepare_threshold_is_asymmetric_between_primary_and_backup() {
        let primary = build_replica("prepare-threshold", "N0");
        let backup = build_replica("prepare-threshold", "N1");

        assert_eq!(primary.prepare_threshold(), 2, "primary needs floor(2*4/3) = 2");
        assert_eq!(backup.prepare_threshold(), 1, "backup needs floor(2*4/3) - 1 = 1");
    }

    #[test]
    fn commit_threshold_is_floor_2n_over_3_regardless_of_role() {
        let primary = build_replica("commit-threshold", "N0");
        let backup = build_replica("commit-threshold", "N2");

        assert_eq!(primary.commit_threshold(), 2, "floor(2*4/3) = 2 for N0");
        assert_eq!(backup.commit_threshold(), 2, "commit threshold has no role asymmetry");
    }

    #[test]
    fn handle_ignores_a_frame_with_an_unknown_command_tag() {
        let replica = build_replica("unknown-command", "N1");
        replica.handle(b"REPLY garbage".to_vec());
        assert_eq!(replica.seq(), 0, "an unrecognised frame must not touch state");
    }

    #[test]
    fn handle_ignores_malformed_json_for_a_known_command() {
        let replica = build_replica("malformed-json", "N0");
        replica.handle(codec::join(Command::Request, b"not json"));
        assert_eq!(replica.seq(), 0, "a REQUEST that fails to parse must not advance seq");
    }
}
