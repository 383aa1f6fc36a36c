use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::AppResult;
use crate::util::{hex_decode, hex_encode, random_bytes};

const OUTPUT_LEN: usize = 32;
const SALT_LEN: usize = 16;
pub const DEFAULT_ITERATIONS: u32 = 100_000;
const SCHEME: &str = "pbkdf2_sha256";

/// Raw PBKDF2-HMAC-SHA256 derivation.
pub fn hash_password(secret: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut out = vec![0u8; OUTPUT_LEN];
    pbkdf2_hmac::<Sha256>(secret, salt, iterations.max(1), &mut out);
    out
}

pub fn verify_password_hash(secret: &[u8], salt: &[u8], expected: &[u8], iterations: u32) -> bool {
    if expected.len() != OUTPUT_LEN || iterations == 0 {
        return false;
    }
    let out = hash_password(secret, salt, iterations);
    out.ct_eq(expected).into()
}

/// Hash a plaintext password into `pbkdf2_sha256$iter$salt$hash` (hex fields).
pub fn hash_password_phc(password: &str) -> AppResult<String> {
    hash_password_phc_with(password, DEFAULT_ITERATIONS)
}

pub fn hash_password_phc_with(password: &str, iterations: u32) -> AppResult<String> {
    let salt = random_bytes(SALT_LEN)?;
    let hash = hash_password(password.as_bytes(), &salt, iterations);
    Ok(format!(
        "{SCHEME}${iterations}${}${}",
        hex_encode(&salt),
        hex_encode(&hash)
    ))
}

/// Verify a password against a stored `pbkdf2_sha256$...` string.
///
/// Malformed stored values never verify.
pub fn verify_password_phc(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iter), Some(salt), Some(hash), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    let Ok(iterations) = iter.parse::<u32>() else {
        return false;
    };
    let (Some(salt), Some(hash)) = (hex_decode(salt), hex_decode(hash)) else {
        return false;
    };
    verify_password_hash(password.as_bytes(), &salt, &hash, iterations)
}
