use sha2::{Digest, Sha256};

// Build a registry key from a scope and a personal identifier (e-mail, phone).
// The identifier is normalized and hashed so it never sits in memory in clear.
pub fn limit_key(scope: &str, subject: &str) -> String {
    let normalized = subject.trim().to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{}:{:x}", scope, hasher.finalize())
}

// For subjects that are already opaque ids (user id, person id)
pub fn raw_key(scope: &str, subject: &str) -> String {
    format!("{}:{}", scope, subject)
}
