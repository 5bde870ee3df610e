//! Canonicalización JSON y hashes (blake3 para huellas, SHA-256 para ficheros).

pub mod canonical_json;
pub mod hash;

pub use canonical_json::to_canonical_json;
pub use hash::{hash_str, hash_value, sha256_file};
