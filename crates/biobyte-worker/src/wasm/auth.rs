use worker::Request;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::jwt::{decode_claims, Claims};
use crate::session::extract_token;
use crate::util::now_ts;

fn header(req: &Request, name: &str) -> Option<String> {
    req.headers().get(name).ok().flatten()
}

/// Session token from the `token` cookie or the bearer header.
pub fn request_token(req: &Request) -> Option<String> {
    extract_token(
        header(req, "Cookie").as_deref(),
        header(req, "Authorization").as_deref(),
    )
}

pub fn decode_token(cfg: &Config, token: &str) -> AppResult<Claims> {
    Ok(decode_claims(cfg.jwt_secret()?, token, now_ts())?)
}

/// 401 without a token, 403 when it does not verify.
pub fn require_claims(req: &Request, cfg: &Config) -> AppResult<Claims> {
    let token = request_token(req)
        .ok_or_else(|| AppError::unauthorized("Access denied. No token provided."))?;
    decode_token(cfg, &token).map_err(|e| match e {
        AppError::Forbidden(detail) => {
            tracing::debug!("token rejected: {detail}");
            AppError::forbidden("Invalid token.")
        }
        other => other,
    })
}

/// Claims when a valid token is present; anonymous otherwise.
pub fn optional_claims(req: &Request, cfg: &Config) -> Option<Claims> {
    let token = request_token(req)?;
    decode_token(cfg, &token).ok()
}

pub fn require_admin(req: &Request, cfg: &Config) -> AppResult<Claims> {
    let claims = require_claims(req, cfg)?;
    if !claims.is_admin() {
        return Err(AppError::forbidden("Admin access required"));
    }
    Ok(claims)
}
