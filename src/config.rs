//! Roster and logging configuration (§6, §4.6). The roster is compiled in, the
//! way the reference implementation hard-codes its node table; log verbosity
//! and the key directory are the only things an operator can override, through
//! environment variables, following the `env var -> typed value` pattern the
//! teacher simulation's configuration module uses.

use std::collections::HashMap;
use std::env;

use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::error::ReplicaError;

/// Default listen address for the client's REPLY listener.
pub const CLIENT_ADDR: &str = "127.0.0.1:8888";

/// Id of the replica that is always primary in this normal-case-only core.
pub const PRIMARY_ID: &str = "N0";

/// The compiled-in map of replica id to TCP listen address.
#[derive(Debug, Clone)]
pub struct Roster {
    nodes: HashMap<String, String>,
}

impl Roster {
    /// The roster used by every demo invocation: `N0..N3` on `127.0.0.1:8000..8003`.
    pub fn demo() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert("N0".to_string(), "127.0.0.1:8000".to_string());
        nodes.insert("N1".to_string(), "127.0.0.1:8001".to_string());
        nodes.insert("N2".to_string(), "127.0.0.1:8002".to_string());
        nodes.insert("N3".to_string(), "127.0.0.1:8003".to_string());
        Roster { nodes }
    }

    /// The listen address for `id`, if it is a known replica.
    pub fn addr_of(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).map(String::as_str)
    }

    /// `true` if `id` names a replica in this roster.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// The number of replicas `N` in the roster.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// All replica ids other than `id`, in an unspecified order.
    pub fn peers_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> {
        self.nodes.keys().map(String::as_str).filter(move |n| *n != id)
    }

    /// Every replica id in the roster, in an unspecified order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }
}

/// Directory holding the `<id>/<id>_RSA_{PUB,PIV}` key files, overridable with
/// the `PBFT_KEY_DIR` environment variable.
pub fn key_dir() -> String {
    env::var("PBFT_KEY_DIR").unwrap_or_else(|_| "Keys".to_string())
}

/// Everything a replica process needs to start: which roster id it is, the
/// roster itself, and where to find key material. Bundled so `main` has one
/// value to pass around instead of three loose arguments.
#[derive(Debug, Clone)]
pub struct ReplicaConfig {
    /// This process's roster id, e.g. `"N0"`.
    pub id: String,
    /// The compiled-in roster.
    pub roster: Roster,
    /// Directory holding `<id>/<id>_RSA_{PUB,PIV}` key files.
    pub key_dir: String,
}

impl ReplicaConfig {
    /// Builds a config for `id` against the demo roster and the resolved
    /// `key_dir()`. Fails if `id` is not in the roster.
    pub fn new(id: String) -> Result<Self, ReplicaError> {
        let roster = Roster::demo();
        if !roster.contains(&id) {
            return Err(ReplicaError::UnknownNodeId(id));
        }
        Ok(ReplicaConfig {
            id,
            roster,
            key_dir: key_dir(),
        })
    }
}

/// Everything the client driver needs: the roster (to find the primary) and
/// the address it listens on for replies.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The compiled-in roster, used to look up the primary's address.
    pub roster: Roster,
    /// This client's own listen address for REPLYs.
    pub client_addr: String,
}

impl ClientConfig {
    /// Builds the client config against the demo roster and `CLIENT_ADDR`.
    pub fn new() -> Self {
        ClientConfig {
            roster: Roster::demo(),
            client_addr: CLIENT_ADDR.to_string(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Sets up a console logger at `Info`, plus an optional file logger at `Debug`
/// when `PBFT_LOG_FILE` names a path to log to.
pub fn initialize_logging() -> Result<(), ReplicaError> {
    let stdout = ConsoleAppender::builder().build();
    let mut builder =
        Config::builder().appender(Appender::builder().build("stdout", Box::new(stdout)));
    let mut root = Root::builder().appender("stdout");

    if let Ok(path) = env::var("PBFT_LOG_FILE") {
        let file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{d} {l} {t} - {m}{n}")))
            .append(true)
            .build(&path)
            .map_err(|e| ReplicaError::LogInit(e.to_string()))?;
        builder = builder.appender(Appender::builder().build("file", Box::new(file)));
        root = root.appender("file");
    }

    let config = builder
        .build(root.build(LevelFilter::Info))
        .map_err(|e| ReplicaError::LogInit(e.to_string()))?;

    log4rs::init_config(config).map_err(|e| ReplicaError::LogInit(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_roster_has_four_nodes_and_n0_is_present() {
        let roster = Roster::demo();
        assert_eq!(roster.len(), 4);
        assert!(roster.contains(PRIMARY_ID));
        assert_eq!(roster.addr_of("N0"), Some("127.0.0.1:8000"));
    }

    #[test]
    fn peers_of_excludes_self() {
        let roster = Roster::demo();
        let peers: Vec<&str> = roster.peers_of("N0").collect();
        assert_eq!(peers.len(), 3);
        assert!(!peers.contains(&"N0"));
    }
}
