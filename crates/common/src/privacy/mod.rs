//! Hashing helpers for store keys and log redaction

use sha2::{Digest, Sha256};

const EMAIL_HASH_SALT: &[u8] = b"calsync-email-redaction-salt";

/// Length of the hex digest used in store keys.
const KEY_HASH_LEN: usize = 32;

/// Opaque fixed-length key component for an arbitrary identifier.
pub fn hash_key(id: &str) -> String {
    let digest = Sha256::digest(id.as_bytes());
    let mut hashed = hex::encode(digest);
    hashed.truncate(KEY_HASH_LEN);
    hashed
}

/// Render an email address for logs without revealing it.
pub fn redact_email(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(EMAIL_HASH_SALT);
    hasher.update(email.as_bytes());
    let digest = hasher.finalize();
    format!("email_hash={}", hex::encode(&digest[..8]))
}
