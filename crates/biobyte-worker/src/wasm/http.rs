use std::fmt::Display;

use serde::de::DeserializeOwned;
use serde::Serialize;
use worker::{Headers, Request, Response, Result};

use crate::error::{AppError, AppResult};

impl From<worker::Error> for AppError {
    fn from(e: worker::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

fn cors_headers(req: &Request) -> Result<Headers> {
    let headers = Headers::new();

    // Reflect Origin when present; otherwise allow all.
    // Cookies only travel cross-origin when the origin is echoed back.
    let origin = req.headers().get("Origin")?.unwrap_or_else(|| "*".to_string());

    headers.set("Access-Control-Allow-Origin", &origin)?;
    headers.set("Vary", "Origin")?;
    headers.set("Access-Control-Allow-Credentials", "true")?;
    headers.set("Access-Control-Allow-Methods", "GET,POST,PUT,PATCH,DELETE,OPTIONS")?;
    headers.set(
        "Access-Control-Allow-Headers",
        "Authorization,Content-Type,Accept,X-Requested-With",
    )?;

    Ok(headers)
}

pub fn json_with_cors(req: &Request, mut resp: Response) -> Result<Response> {
    let headers = cors_headers(req)?;
    let resp_headers = resp.headers_mut();
    for (k, v) in headers.entries() {
        resp_headers.set(&k, &v)?;
    }

    Ok(resp)
}

pub fn error_response(req: &Request, status: u16, code: &str, message: &str) -> Result<Response> {
    let body = serde_json::json!({
        "success": false,
        "message": message,
        "error": {
            "code": code,
            "message": message
        }
    });

    let resp = Response::from_json(&body)?.with_status(status);
    json_with_cors(req, resp)
}

pub fn internal_error_response<E: Display>(req: &Request, context: &str, err: &E) -> Result<Response> {
    tracing::error!("{context}: {err}");
    error_response(req, 500, "internal_error", "Internal server error")
}

/// Render an `AppError`. 5xx details are logged and replaced by a generic message.
pub fn app_error_response(req: &Request, err: &AppError) -> Result<Response> {
    if err.is_server_error() {
        tracing::error!(code = err.code(), "{err}");
    }
    let mut resp = Response::from_json(&err.to_body())?.with_status(err.status());
    if let AppError::TooManyRequests { retry_after, .. } = err {
        resp.headers_mut().set("Retry-After", &retry_after.to_string())?;
    }
    json_with_cors(req, resp)
}

/// Terminal step for handlers written against `AppResult`.
pub fn finish(req: &Request, result: AppResult<Response>) -> Result<Response> {
    match result {
        Ok(resp) => json_with_cors(req, resp),
        Err(e) => app_error_response(req, &e),
    }
}

pub fn json_status<T: Serialize>(body: &T, status: u16) -> AppResult<Response> {
    Ok(Response::from_json(body)?.with_status(status))
}

pub fn json_ok<T: Serialize>(body: &T) -> AppResult<Response> {
    json_status(body, 200)
}

pub fn with_cookies(mut resp: Response, cookies: &[String]) -> AppResult<Response> {
    let headers = resp.headers_mut();
    for cookie in cookies {
        headers.append("Set-Cookie", cookie)?;
    }
    Ok(resp)
}

pub async fn read_json<T: DeserializeOwned>(req: &mut Request) -> AppResult<T> {
    req.json::<T>().await.map_err(|e| {
        tracing::warn!("invalid JSON body: {e}");
        AppError::bad_request("Invalid JSON body")
    })
}

pub fn query_param(req: &Request, name: &str) -> Option<String> {
    let url = req.url().ok()?;
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Client address used as the rate-limit key.
pub fn client_ip(req: &Request) -> String {
    req.headers()
        .get("CF-Connecting-IP")
        .ok()
        .flatten()
        .or_else(|| {
            req.headers()
                .get("X-Forwarded-For")
                .ok()
                .flatten()
                .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn not_found(req: &Request) -> Result<Response> {
    error_response(req, 404, "not_found", "Not found")
}
