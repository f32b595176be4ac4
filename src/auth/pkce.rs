// PKCE verifier/challenge generation (RFC 7636, S256)

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// A verifier/challenge pair, generated fresh per interactive sign-in attempt.
/// The verifier is sent exactly once in the code exchange and then discarded.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// Generate a new pair: 32 random bytes as URL-safe base64 without
    /// padding, challenge = base64url(SHA-256(verifier))
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = challenge_for(&verifier);
        PkcePair {
            verifier,
            challenge,
        }
    }
}

fn challenge_for(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}
