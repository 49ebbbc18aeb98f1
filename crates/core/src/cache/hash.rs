//! Deterministic blob key derivation.

use sha2::{Digest, Sha256};

/// Compute the blob key for an image URL.
///
/// The key is the lowercase hex SHA-256 of the URL exactly as given, so the
/// same URL always maps to the same file and distinct URLs collide only with
/// negligible probability.
pub fn compute_blob_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stability() {
        let a = compute_blob_key("https://img.example.com/poster/1.jpg");
        let b = compute_blob_key("https://img.example.com/poster/1.jpg");
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_distinguishes_urls() {
        let a = compute_blob_key("https://img.example.com/poster/1.jpg");
        let b = compute_blob_key("https://img.example.com/poster/2.jpg");
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_is_case_sensitive() {
        let a = compute_blob_key("https://img.example.com/A.jpg");
        let b = compute_blob_key("https://img.example.com/a.jpg");
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_format() {
        let key = compute_blob_key("https://img.example.com/poster/1.jpg");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
