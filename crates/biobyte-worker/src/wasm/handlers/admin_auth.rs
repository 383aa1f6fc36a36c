use worker::{Env, Request, Result};

use crate::session::bearer_token;
use crate::worker_wasm::env::env_string;
use crate::worker_wasm::http::error_response;

pub fn extract_bearer_token(req: &Request) -> Result<Option<String>> {
    let Some(raw) = req.headers().get("Authorization")? else {
        return Ok(None);
    };
    Ok(bearer_token(&raw))
}

/// Guard for the operational endpoints: `MIGRATIONS_TOKEN` must be configured
/// and presented as a bearer token.
///
/// Returns `Ok(None)` when authorized; otherwise returns an error response.
pub async fn ensure_admin_authorized(req: &Request, env: &Env) -> Result<Option<worker::Response>> {
    let Some(token) = extract_bearer_token(req)? else {
        return Ok(Some(error_response(
            req,
            401,
            "missing_token",
            "Missing Authorization Bearer token",
        )?));
    };

    let Some(required) = env_string(env, "MIGRATIONS_TOKEN") else {
        tracing::warn!("MIGRATIONS_TOKEN is not configured; operational endpoints are disabled");
        return Ok(Some(error_response(
            req,
            403,
            "forbidden",
            "Operational endpoints are disabled",
        )?));
    };

    if !bool::from(subtle::ConstantTimeEq::ct_eq(token.as_bytes(), required.as_bytes())) {
        return Ok(Some(error_response(
            req,
            401,
            "unauthorized",
            "Invalid migrations token",
        )?));
    }

    Ok(None)
}
