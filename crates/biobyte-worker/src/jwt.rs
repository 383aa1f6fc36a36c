use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use entity::user;

/// Minimal HS256 JWT utilities.
///
/// Only JSON object headers/payloads, base64url without padding. Signatures are
/// checked with `Hmac::verify_slice`; `decode_claims` additionally enforces `exp`.

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("Invalid token format")]
    Format,
    #[error("Unsupported token header")]
    Header,
    #[error("Invalid token signature")]
    Signature,
    #[error("Invalid token payload: {0}")]
    Payload(String),
    #[error("Token expired")]
    Expired,
    #[error("Invalid signing key: {0}")]
    Key(String),
    #[error("Failed to encode token: {0}")]
    Encode(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct JwtHeader {
    alg: String,
    typ: String,
}

/// Claims carried by session tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: i32,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn for_user(u: &user::Model, now: i64, ttl_secs: i64) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            role: u.role().as_str().to_string(),
            iat: now,
            exp: now + ttl_secs,
        }
    }

    pub fn is_admin(&self) -> bool {
        user::Role::parse(&self.role) == user::Role::Admin
    }
}

fn b64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

fn b64url_decode(s: &str) -> Result<Vec<u8>, JwtError> {
    URL_SAFE_NO_PAD
        .decode(s.as_bytes())
        .map_err(|_| JwtError::Format)
}

fn mac(secret: &[u8]) -> Result<Hmac<Sha256>, JwtError> {
    Hmac::<Sha256>::new_from_slice(secret).map_err(|e| JwtError::Key(e.to_string()))
}

/// Encode claims as an HS256-signed JWT.
pub fn encode_hs256<T: Serialize>(secret: &[u8], claims: &T) -> Result<String, JwtError> {
    let header = JwtHeader {
        alg: "HS256".to_string(),
        typ: "JWT".to_string(),
    };

    let header_json = serde_json::to_vec(&header).map_err(|e| JwtError::Encode(e.to_string()))?;
    let claims_json = serde_json::to_vec(claims).map_err(|e| JwtError::Encode(e.to_string()))?;

    let signing_input = format!("{}.{}", b64url_encode(&header_json), b64url_encode(&claims_json));

    let mut mac = mac(secret)?;
    mac.update(signing_input.as_bytes());
    let sig_b64 = b64url_encode(&mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{sig_b64}"))
}

/// Decode an HS256 JWT and verify its signature. Does not look at `exp`.
pub fn decode_hs256<T: DeserializeOwned>(secret: &[u8], token: &str) -> Result<T, JwtError> {
    let token = token.replace(char::is_whitespace, "");
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(JwtError::Format);
    };

    let header: JwtHeader =
        serde_json::from_slice(&b64url_decode(header_b64)?).map_err(|_| JwtError::Header)?;
    if header.alg != "HS256" || !header.typ.eq_ignore_ascii_case("JWT") {
        return Err(JwtError::Header);
    }

    let signing_input = format!("{header_b64}.{payload_b64}");
    let sig = b64url_decode(sig_b64)?;
    let mut mac = mac(secret)?;
    mac.update(signing_input.as_bytes());
    mac.verify_slice(&sig).map_err(|_| JwtError::Signature)?;

    serde_json::from_slice(&b64url_decode(payload_b64)?)
        .map_err(|e| JwtError::Payload(e.to_string()))
}

pub fn encode_claims(secret: &[u8], claims: &Claims) -> Result<String, JwtError> {
    encode_hs256(secret, claims)
}

/// Verify signature and expiry.
pub fn decode_claims(secret: &[u8], token: &str, now: i64) -> Result<Claims, JwtError> {
    let claims: Claims = decode_hs256(secret, token)?;
    if claims.exp <= now {
        return Err(JwtError::Expired);
    }
    Ok(claims)
}
