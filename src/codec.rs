//! Command-tagged framing (§4.2). `join`/`split` only ever see the logical
//! `COMMAND || SEPARATOR || PAYLOAD` bytes — the length-delimited TCP envelope
//! around them is the concern of `network`.

use crate::messages::Command;

const SEPARATOR: u8 = b' ';

/// Joins a command tag and its JSON payload into one frame.
pub fn join(cmd: Command, payload: &[u8]) -> Vec<u8> {
    let tag = cmd.as_str().as_bytes();
    let mut buf = Vec::with_capacity(tag.len() + 1 + payload.len());
    buf.extend_from_slice(tag);
    buf.push(SEPARATOR);
    buf.extend_from_slice(payload);
    buf
}

/// Splits a frame back into its command tag and payload. Returns `None` for a
/// frame with no separator, or whose tag is not one of the four known commands
/// — both cases are malformed-frame dispositions the caller drops and logs (§7).
pub fn split(frame: &[u8]) -> Option<(Command, &[u8])> {
    let sep_at = frame.iter().position(|&b| b == SEPARATOR)?;
    let (tag, rest) = frame.split_at(sep_at);
    let cmd = Command::from_str(std::str::from_utf8(tag).ok()?)?;
    Some((cmd, &rest[1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_of_join_is_the_identity() {
        let payload = br#"{"seq":1}"#;
        let frame = join(Command::Commit, payload);
        let (cmd, decoded_payload) = split(&frame).expect("frame should split");
        assert_eq!(cmd, Command::Commit);
        assert_eq!(decoded_payload, payload);
    }

    #[test]
    fn empty_payload_round_trips() {
        let frame = join(Command::Request, b"");
        let (cmd, payload) = split(&frame).expect("frame should split");
        assert_eq!(cmd, Command::Request);
        assert!(payload.is_empty());
    }

    #[test]
    fn unknown_command_tag_is_rejected() {
        let frame = b"REPLY {}".to_vec();
        assert!(split(&frame).is_none());
    }

    #[test]
    fn frame_without_separator_is_rejected() {
        assert!(split(b"GARBAGE").is_none());
    }
}
