//! Content hashing for independent integrity checks.
//!
//! The companion endpoint publishes a digest of the recognized certificate
//! text so third parties can compare transcripts without re-uploading the
//! document.

use sha2::{Digest as ShaDigest, Sha256};

/// SHA-256 hex digest of a recognized-text transcript.
pub fn content_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_sixty_four_hex_chars() {
        let digest = content_digest("certificate transcript");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_is_stable_for_identical_text() {
        assert_eq!(content_digest("abc"), content_digest("abc"));
        assert_ne!(content_digest("abc"), content_digest("abd"));
    }

    #[test]
    fn empty_transcript_hashes_to_known_value() {
        assert_eq!(
            content_digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
