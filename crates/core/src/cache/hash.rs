//! Cache key and content hash generation.

use sha2::{Digest, Sha256};

/// Length of a cache key in hex characters.
pub const CACHE_KEY_LEN: usize = 16;

/// Compute the stable cache key for a request: a SHA-256 prefix of `METHOD:URL`.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b":");
    hasher.update(url.as_bytes());
    let mut key = hex::encode(hasher.finalize());
    key.truncate(CACHE_KEY_LEN);
    key
}

/// Compute the content hash identifying one observed version of a body.
pub fn compute_content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stability() {
        let key1 = compute_cache_key("GET", "https://api.oyez.org/cases");
        let key2 = compute_cache_key("GET", "https://api.oyez.org/cases");
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_key_different_method() {
        let get = compute_cache_key("GET", "https://api.oyez.org/cases");
        let post = compute_cache_key("POST", "https://api.oyez.org/cases");
        assert_ne!(get, post);
    }

    #[test]
    fn test_key_format() {
        let key = compute_cache_key("GET", "https://api.oyez.org/cases");
        assert_eq!(key.len(), CACHE_KEY_LEN);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_key_is_prefix_of_method_url_digest() {
        let full = compute_content_hash(b"GET:https://api.oyez.org/cases");
        assert!(full.starts_with(&compute_cache_key("GET", "https://api.oyez.org/cases")));
    }

    #[test]
    fn test_content_hash_format() {
        let hash = compute_content_hash(b"{\"v\": 1}");
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, compute_content_hash(b"{\"v\": 2}"));
    }
}
