//! A running replica: role, roster, cached keys, and the mutable state they
//! all act on, wired to the TCP listener (§4.3, §4.5).

mod handler;
pub mod state;

use std::sync::{Arc, Mutex};

use log::info;

use crate::config::{Roster, PRIMARY_ID};
use crate::crypto::Keys;
use crate::error::ReplicaError;
use crate::network;
use crate::replica::state::{ReplicaRole, ReplicaState};

/// A handle to one replica's identity, key material, and shared state. Cheap
/// to clone — every clone refers to the same underlying `Arc`s, so cloning it
/// into a spawned task does not duplicate the state it protects.
#[derive(Clone)]
pub struct Replica {
    id: Arc<String>,
    role: ReplicaRole,
    roster: Arc<Roster>,
    keys: Arc<Keys>,
    state: Arc<Mutex<ReplicaState>>,
}

impl Replica {
    /// Builds a replica for `id`. `id` must already be known to `roster`.
    pub fn new(id: String, roster: Roster, keys: Keys) -> Self {
        let role = if id == PRIMARY_ID {
            ReplicaRole::Primary
        } else {
            ReplicaRole::Backup
        };
        Replica {
            id: Arc::new(id),
            role,
            roster: Arc::new(roster),
            keys: Arc::new(keys),
            state: Arc::new(Mutex::new(ReplicaState::new())),
        }
    }

    /// This replica's id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this replica is the fixed primary or a backup.
    pub fn role(&self) -> ReplicaRole {
        self.role
    }

    pub(crate) fn roster(&self) -> &Roster {
        &self.roster
    }

    pub(crate) fn keys(&self) -> &Keys {
        &self.keys
    }

    pub(crate) fn state(&self) -> &Mutex<ReplicaState> {
        &self.state
    }

    /// Highest sequence number this replica has assigned or accepted so far.
    pub fn seq(&self) -> u64 {
        self.state.lock().expect("replica state lock poisoned").seq()
    }

    /// A snapshot of the committed application log, in commit order.
    pub fn committed_log(&self) -> Vec<crate::messages::ClientMessage> {
        self.state
            .lock()
            .expect("replica state lock poisoned")
            .log()
            .to_vec()
    }

    /// Binds this replica's roster address and serves connections until the
    /// process is killed. Every accepted frame is dispatched through `handle`.
    pub async fn run(self) -> Result<(), ReplicaError> {
        let addr = self
            .roster
            .addr_of(&self.id)
            .ok_or_else(|| ReplicaError::UnknownNodeId(self.id.to_string()))?
            .to_string();

        let listener = network::bind(&addr).await?;
        info!("{} ({:?}) listening on {}", self.id, self.role, addr);

        let replica = self.clone();
        network::serve(listener, move |frame| {
            replica.handle(frame);
        })
        .await;

        Ok(())
    }
}
