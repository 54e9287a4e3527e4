//! Digest and per-replica key handling (§4.1). The raw RSA/PKCS#1 operations
//! live in `mc_utils::crypto`; this module adds the app-specific digest
//! function and the roster-wide key cache.

use std::collections::HashMap;

use log::info;
use openssl::pkey::{PKey, Private, Public};
use openssl::sha::sha256;

use crate::config::Roster;
use crate::error::ReplicaError;
use crate::messages::{Digest, Request};

/// SHA-256 of the canonical JSON serialisation of `req`, as lowercase hex.
///
/// `serde_json` is deterministic for a fixed struct shape (field order follows
/// declaration order), so the same `Request` always yields the same digest
/// across replicas.
pub fn digest(req: &Request) -> Digest {
    hex::encode(digest_bytes(req))
}

/// Signs raw digest bytes with `key` (PKCS#1 v1.5 over SHA-256).
pub fn sign(digest_bytes: &[u8], key: &PKey<Private>) -> Result<Vec<u8>, ReplicaError> {
    mc_utils::crypto::sign(digest_bytes, key).map_err(ReplicaError::KeyGen)
}

/// Verifies `sig` over raw digest bytes under `key`.
pub fn verify(digest_bytes: &[u8], sig: &[u8], key: &PKey<Public>) -> bool {
    mc_utils::crypto::verify(digest_bytes, sig, key)
}

/// Recovers the raw SHA-256 bytes a wire `Digest` hex-encodes, for signing
/// and verification. `None` if the string isn't valid hex — a peer can send
/// any JSON string here, so this is a rejection case, not a panic.
pub fn decode_digest(digest: &Digest) -> Option<Vec<u8>> {
    hex::decode(digest).ok()
}

/// `digest()`'s raw SHA-256 bytes, before hex encoding. Callers that need to
/// both sign and broadcast a fresh digest use this to avoid re-deriving the
/// same bytes from the hex string they just produced.
pub fn digest_bytes(req: &Request) -> [u8; 32] {
    let bytes = serde_json::to_vec(req).expect("Request serialises infallibly");
    sha256(&bytes)
}

/// Creates `Keys/<id>/<id>_RSA_{PUB,PIV}` for every roster id that doesn't
/// already have both files, generating a fresh 2048-bit RSA keypair for each.
/// Mirrors the reference implementation's one-shot `genRsaKeys` step.
pub fn provision_keys(roster: &Roster, key_dir: &str) -> Result<(), ReplicaError> {
    for id in roster.ids() {
        let pub_path = format!("{}/{}/{}_RSA_PUB", key_dir, id, id);
        let priv_path = format!("{}/{}/{}_RSA_PIV", key_dir, id, id);

        if mc_utils::filehelper::FileHelper::file_exists(&pub_path)
            && mc_utils::filehelper::FileHelper::file_exists(&priv_path)
        {
            continue;
        }

        info!("generating RSA keypair for {}", id);
        let (priv_pem, pub_pem) = mc_utils::crypto::generate_keypair(2048)
            .map_err(ReplicaError::KeyGen)?;

        mc_utils::filehelper::FileHelper::write_to_file(
            &priv_path,
            std::str::from_utf8(&priv_pem).expect("PEM is ASCII"),
        )
        .map_err(|source| ReplicaError::KeyLoad {
            id: id.to_string(),
            source,
        })?;
        mc_utils::filehelper::FileHelper::write_to_file(
            &pub_path,
            std::str::from_utf8(&pub_pem).expect("PEM is ASCII"),
        )
        .map_err(|source| ReplicaError::KeyLoad {
            id: id.to_string(),
            source,
        })?;
    }
    Ok(())
}

/// A replica's own private key plus the cached public key of every roster id,
/// parsed once at startup (§4.1, §5 "Key loading on the hot path").
pub struct Keys {
    private: PKey<Private>,
    public: HashMap<String, PKey<Public>>,
}

impl Keys {
    /// Loads `self_id`'s private key and every roster id's public key from
    /// `key_dir`. Any missing or unparsable file is a fatal startup error.
    pub fn load(roster: &Roster, self_id: &str, key_dir: &str) -> Result<Keys, ReplicaError> {
        let priv_path = format!("{}/{}/{}_RSA_PIV", key_dir, self_id, self_id);
        let priv_pem = mc_utils::filehelper::FileHelper::read_file_to_string(&priv_path)
            .map_err(|source| ReplicaError::KeyLoad {
                id: self_id.to_string(),
                source,
            })?;
        let private =
            mc_utils::crypto::private_key_from_pem(priv_pem.as_bytes()).map_err(|source| {
                ReplicaError::KeyParse {
                    id: self_id.to_string(),
                    source,
                }
            })?;

        let mut public = HashMap::new();
        for id in roster.ids() {
            let pub_path = format!("{}/{}/{}_RSA_PUB", key_dir, id, id);
            let pub_pem = mc_utils::filehelper::FileHelper::read_file_to_string(&pub_path)
                .map_err(|source| ReplicaError::KeyLoad {
                    id: id.to_string(),
                    source,
                })?;
            let key = mc_utils::crypto::public_key_from_pem(pub_pem.as_bytes()).map_err(
                |source| ReplicaError::KeyParse {
                    id: id.to_string(),
                    source,
                },
            )?;
            public.insert(id.to_string(), key);
        }

        Ok(Keys { private, public })
    }

    /// Signs raw digest bytes with this replica's own private key.
    pub fn sign(&self, digest_bytes: &[u8]) -> Result<Vec<u8>, ReplicaError> {
        sign(digest_bytes, &self.private)
    }

    /// Verifies `sig` over raw digest bytes under `node_id`'s cached public key.
    /// Returns `false` (not an error) if `node_id` is unknown — an unrecognised
    /// signer fails verification the same way a bad signature would.
    pub fn verify(&self, digest_bytes: &[u8], sig: &[u8], node_id: &str) -> bool {
        match self.public.get(node_id) {
            Some(key) => verify(digest_bytes, sig, key),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ClientMessage;

    fn sample_request() -> Request {
        Request {
            timestamp: 1,
            client_addr: "127.0.0.1:8888".to_string(),
            message: ClientMessage {
                id: 1234567890,
                content: "hello".to_string(),
            },
        }
    }

    #[test]
    fn digest_is_stable_across_calls() {
        let req = sample_request();
        assert_eq!(digest(&req), digest(&req));
        assert_eq!(digest(&req).len(), 64);
    }

    #[test]
    fn digest_changes_with_content() {
        let mut req = sample_request();
        let d1 = digest(&req);
        req.message.content.push('!');
        let d2 = digest(&req);
        assert_ne!(d1, d2);
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let (priv_pem, pub_pem) = mc_utils::crypto::generate_keypair(2048).unwrap();
        let private = mc_utils::crypto::private_key_from_pem(&priv_pem).unwrap();
        let public = mc_utils::crypto::public_key_from_pem(&pub_pem).unwrap();

        let data = b"some digest bytes";
        let sig = sign(data, &private).unwrap();
        assert!(verify(data, &sig, &public));
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let (priv_pem, pub_pem) = mc_utils::crypto::generate_keypair(2048).unwrap();
        let private = mc_utils::crypto::private_key_from_pem(&priv_pem).unwrap();
        let public = mc_utils::crypto::public_key_from_pem(&pub_pem).unwrap();

        let data = b"some digest bytes";
        let mut sig = sign(data, &private).unwrap();
        sig[0] ^= 0xFF;
        assert!(!verify(data, &sig, &public));
    }
}
