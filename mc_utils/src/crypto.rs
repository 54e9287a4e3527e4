//! Thin wrapper around `openssl`'s RSA/PKCS#1 v1.5 signing primitives.

extern crate openssl;

use log::warn;
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private, Public};
use openssl::rsa::Rsa;
use openssl::sign::{Signer, Verifier};

/// Generates a fresh RSA keypair and returns it as `(private_pem, public_pem)`.
pub fn generate_keypair(bits: u32) -> Result<(Vec<u8>, Vec<u8>), ErrorStack> {
    let rsa = Rsa::generate(bits)?;
    let priv_pem = rsa.private_key_to_pem()?;
    let pub_pem = rsa.public_key_to_pem()?;
    Ok((priv_pem, pub_pem))
}

/// Parses a PEM-encoded RSA private key.
pub fn private_key_from_pem(pem: &[u8]) -> Result<PKey<Private>, ErrorStack> {
    PKey::private_key_from_pem(pem)
}

/// Parses a PEM-encoded RSA public key.
pub fn public_key_from_pem(pem: &[u8]) -> Result<PKey<Public>, ErrorStack> {
    PKey::public_key_from_pem(pem)
}

/// Signs `data` (PKCS#1 v1.5 over SHA-256) with `key`.
pub fn sign(data: &[u8], key: &PKey<Private>) -> Result<Vec<u8>, ErrorStack> {
    let mut signer = Signer::new(MessageDigest::sha256(), key)?;
    signer.update(data)?;
    signer.sign_to_vec()
}

/// Verifies that `sig` is a valid PKCS#1 v1.5/SHA-256 signature over `data` under `key`.
pub fn verify(data: &[u8], sig: &[u8], key: &PKey<Public>) -> bool {
    let mut verifier = match Verifier::new(MessageDigest::sha256(), key) {
        Ok(v) => v,
        Err(e) => {
            warn!("could not construct verifier: {}", e);
            return false;
        }
    };
    if verifier.update(data).is_err() {
        return false;
    }
    match verifier.verify(sig) {
        Ok(res) => res,
        Err(e) => {
            warn!("defunct signature: {}", e);
            false
        }
    }
}
