//! PBKDF2-HMAC-SHA256 password hashes, stored as
//! `pbkdf2$<iterations>$base64(salt)$base64(key)`.
//!
//! The iteration count travels with the hash, so raising [`DEFAULT_ITERATIONS`] keeps older
//! hashes verifiable.

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use hmac::digest::CtOutput;
use hmac::digest::generic_array::GenericArray;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

pub const DEFAULT_ITERATIONS: u32 = 100_000;

const SCHEME: &str = "pbkdf2";
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

pub fn hash(password: &str) -> String {
    hash_with_iterations(password, DEFAULT_ITERATIONS)
}

pub fn hash_with_iterations(password: &str, iterations: u32) -> String {
    let mut salt = [0_u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let key = derive(password, &salt, iterations);
    format!("{SCHEME}${iterations}${}${}", STANDARD_NO_PAD.encode(salt), STANDARD_NO_PAD.encode(key))
}

pub fn verify(password: &str, hashed: &str) -> bool {
    let mut parts = hashed.split('$');
    let (Some(SCHEME), Some(iterations), Some(salt), Some(expected), None) =
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (STANDARD_NO_PAD.decode(salt), STANDARD_NO_PAD.decode(expected)) else {
        return false;
    };
    if iterations == 0 || expected.len() != KEY_LEN {
        return false;
    }

    let actual = derive(password, &salt, iterations);
    CtOutput::<Sha256>::new(GenericArray::from(actual)) == CtOutput::new(GenericArray::clone_from_slice(&expected))
}

/// The iteration count recorded in `hashed`, if it is a well-formed hash.
pub fn iterations(hashed: &str) -> Option<u32> {
    let mut parts = hashed.split('$');
    if parts.next() != Some(SCHEME) {
        return None;
    }
    parts.next()?.parse().ok()
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; KEY_LEN] {
    let mut key = [0_u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}
