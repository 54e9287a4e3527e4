//! Wire types for the four PBFT protocol messages (§3) and the command tags
//! that `codec` frames them with (§4.2).

use serde::{Deserialize, Serialize};

/// A SHA-256 digest of a canonically-serialised `Request`, as a lowercase hex string.
pub type Digest = String;

/// The four framing tags a replica can receive. Unknown tags are dropped by the
/// dispatcher in `replica::handler` without reaching any of these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// A client submission, handled only by the primary.
    Request,
    /// The primary's ordering assignment, broadcast to every backup.
    PrePrepare,
    /// A backup's (or the primary's, never sent to itself) vote that it has seen a request.
    Prepare,
    /// A replica's vote that the prepare quorum has been reached.
    Commit,
}

impl Command {
    /// The literal tag used on the wire, e.g. `"PRE-PREPARE"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Request => "REQUEST",
            Command::PrePrepare => "PRE-PREPARE",
            Command::Prepare => "PREPARE",
            Command::Commit => "COMMIT",
        }
    }

    /// Parses a wire tag back into a `Command`. Returns `None` for anything else,
    /// which the caller is expected to drop silently (§4.2).
    pub fn from_str(s: &str) -> Option<Command> {
        match s {
            "REQUEST" => Some(Command::Request),
            "PRE-PREPARE" => Some(Command::PrePrepare),
            "PREPARE" => Some(Command::Prepare),
            "COMMIT" => Some(Command::Commit),
            _ => None,
        }
    }
}

/// The `(id, content)` payload that ultimately lands in the committed log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMessage {
    /// Ten-digit client-chosen message id.
    pub id: u64,
    /// Free-form command text, trimmed of surrounding whitespace.
    pub content: String,
}

/// An opaque client submission, as sent to the primary and echoed back inside
/// every subsequent protocol message for this request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Nanoseconds since the Unix epoch at submission time, client-local.
    pub timestamp: i64,
    /// Address the client listens on for its REPLY.
    pub client_addr: String,
    /// The actual payload.
    pub message: ClientMessage,
}

/// Sent by the primary once per accepted client request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrePrepare {
    /// The request being ordered.
    pub request: Request,
    /// `digest(request)`, carried alongside rather than recomputed by receivers
    /// purely for diagnostics — receivers always recompute it to check binding.
    pub digest: Digest,
    /// Sequence number the primary assigned.
    pub seq: u64,
    /// Primary's signature over the raw digest bytes.
    pub sign: Vec<u8>,
}

/// Broadcast by a backup once it accepts a `PrePrepare` for `digest`/`seq`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prepare {
    /// Digest this vote is for.
    pub digest: Digest,
    /// Sequence number this vote is for.
    pub seq: u64,
    /// Id of the replica casting the vote.
    pub node_id: String,
    /// Sender's signature over the raw digest bytes.
    pub sign: Vec<u8>,
}

/// Broadcast by a replica once it has collected the prepare quorum for `digest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    /// Digest this vote is for.
    pub digest: Digest,
    /// Sequence number this vote is for.
    pub seq: u64,
    /// Id of the replica casting the vote.
    pub node_id: String,
    /// Sender's signature over the raw digest bytes.
    pub sign: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_round_trips_through_its_wire_tag() {
        for cmd in [
            Command::Request,
            Command::PrePrepare,
            Command::Prepare,
            Command::Commit,
        ] {
            assert_eq!(Command::from_str(cmd.as_str()), Some(cmd));
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert_eq!(Command::from_str("REPLY"), None);
        assert_eq!(Command::from_str(""), None);
    }
}
