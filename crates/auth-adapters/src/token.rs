use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use domains::TokenCodec;
use sha2::{Digest, Sha256};

/// 128 random bits, base64url without padding (22 characters).
///
/// Only the SHA-256 digest is meant to be stored; the digest is
/// deterministic so a presented token can be looked up by it.
#[derive(Debug, Clone, Default)]
pub struct OpaqueTokenCodec;

impl OpaqueTokenCodec {
    pub fn new() -> Self {
        Self
    }
}

impl TokenCodec for OpaqueTokenCodec {
    fn generate(&self) -> String {
        URL_SAFE_NO_PAD.encode(rand::random::<[u8; 16]>())
    }

    fn digest(&self, plaintext: &str) -> Vec<u8> {
        Sha256::digest(plaintext.as_bytes()).to_vec()
    }
}
