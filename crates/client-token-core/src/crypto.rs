//! Secret key generation
//!
//! Dynamic-mode merchants get a fresh secret key on every device
//! registration. Keys are the first 16 upper-case hex characters of an
//! HMAC-SHA256 over 32 bytes drawn from the OS random source, keyed with a
//! fixed domain-separation string. 16 hex characters give a 2^64 key space.

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of every generated secret key
pub const SECRET_KEY_LEN: usize = 16;

/// Domain separation for generated secret keys
const SECRET_KEY_DOMAIN: &[u8] = b"client-token/secret-key/v1";

/// Generate a fresh secret key for a dynamic-mode device
pub fn generate_secret_key() -> String {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);

    let mut mac = HmacSha256::new_from_slice(SECRET_KEY_DOMAIN)
        .expect("HMAC accepts keys of any length");
    mac.update(&seed);
    let digest = mac.finalize().into_bytes();

    let mut key = hex::encode_upper(digest);
    key.truncate(SECRET_KEY_LEN);
    key
}

/// Check that `key` has the shape of a generated secret key
pub fn is_well_formed_secret_key(key: &str) -> bool {
    key.len() == SECRET_KEY_LEN
        && key
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_key_shape() {
        let key = generate_secret_key();
        assert_eq!(key.len(), SECRET_KEY_LEN);
        assert!(is_well_formed_secret_key(&key));
        assert_eq!(key, key.to_uppercase());
    }

    #[test]
    fn test_generated_keys_differ() {
        let keys: HashSet<String> = (0..256).map(|_| generate_secret_key()).collect();
        assert_eq!(keys.len(), 256);
    }

    #[test]
    fn test_well_formed_rejects() {
        assert!(!is_well_formed_secret_key(""));
        assert!(!is_well_formed_secret_key("abcdef0123456789"));
        assert!(!is_well_formed_secret_key("ABCDEF012345678"));
        assert!(!is_well_formed_secret_key("ABCDEF0123456789A"));
        assert!(!is_well_formed_secret_key("GHIJKL0123456789"));
        assert!(is_well_formed_secret_key("ABCDEF0123456789"));
    }
}
