use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

/// Number of random bytes behind every token.
pub const TOKEN_BYTES: usize = 32;

/// A cryptographically random, URL-safe token, suitable for session ids and CSRF tokens.
pub fn secure_token() -> String {
    let mut bytes = [0_u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
