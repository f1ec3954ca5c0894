use crate::shortcode::{ShortCode, SHORT_CODE_LEN};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Trait for deriving short codes from original URLs.
///
/// Implementations are pure functions of the URL and don't interact with
/// storage: the same URL always yields the same code, so the code doubles as
/// a content fingerprint for duplicate detection.
pub trait Deriver: Send + Sync + 'static {
    fn derive(&self, original_url: &str) -> ShortCode;
}

/// The production deriver: the first 8 characters of the URL-safe base64
/// encoding of the SHA-256 digest of the URL.
///
/// Two different URLs sharing the same 48-bit prefix collide. That risk is
/// accepted; the shortener detects it and refuses to hand out the code.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Deriver;

impl Deriver for Sha256Deriver {
    fn derive(&self, original_url: &str) -> ShortCode {
        let digest = Sha256::digest(original_url.as_bytes());
        let mut encoded = URL_SAFE.encode(digest);
        // 32 digest bytes encode to 44 characters; padding only appears at the end
        encoded.truncate(SHORT_CODE_LEN);
        ShortCode::new_unchecked(encoded)
    }
}
