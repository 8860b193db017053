//! Token generation and keyed hashing for single-use links.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Number of random bytes behind each raw token.
pub const TOKEN_BYTES: usize = 32;

/// HMAC-SHA256 of `token` keyed with `secret`, hex encoded.
pub fn get_token_hash(token: &str, secret: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts keys of any length"),
    };
    mac.update(token.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Generates a URL-safe random token and its keyed hash.
pub fn generate_token(secret: &str) -> (String, String) {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let token = URL_SAFE_NO_PAD.encode(bytes);
    let token_hash = get_token_hash(&token, secret);
    (token, token_hash)
}
