use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use sha2::{Digest, Sha512};

use crate::config;

/// Salted SHA-512 of `password` using the configured salt, URL-safe base64 with padding
pub fn hash_password(password: &str) -> String {
    hash_with_salt(&config::config().security.password_salt, password)
}

fn digest(salt: &str, password: &str) -> Vec<u8> {
    let mut hasher = Sha512::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

pub fn hash_with_salt(salt: &str, password: &str) -> String {
    URL_SAFE.encode(digest(salt, password))
}

/// Accepts the base64 form and the older lowercase hex form of the same digest
pub fn verify_password(password: &str, hash: &str) -> bool {
    verify_with_salt(&config::config().security.password_salt, password, hash)
}

fn verify_with_salt(salt: &str, password: &str, hash: &str) -> bool {
    let digest = digest(salt, password);
    URL_SAFE.encode(&digest) == hash || hex(&digest) == hash
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
