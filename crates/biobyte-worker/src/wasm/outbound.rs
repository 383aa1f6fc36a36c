use serde_json::Value;
use worker::{Env, Headers, Method, Request, RequestInit};

use crate::error::{AppError, AppResult};

const USER_AGENT: &str = "BioByte/0.1 (Cloudflare Worker)";

/// Synthetic origin for asset-binding fetches; only the path matters.
const ASSET_ORIGIN: &str = "https://assets.local";

fn is_success_status(status: u16) -> bool {
    (200..=299).contains(&status)
}

/// One outbound call with no retries. Returns status and body text.
pub async fn send(
    method: Method,
    url: &str,
    headers: &[(&str, &str)],
    body: Option<String>,
) -> AppResult<(u16, String)> {
    let h = Headers::new();
    h.set("User-Agent", USER_AGENT)?;
    h.set("Accept", "application/json")?;
    for (k, v) in headers {
        h.set(k, v)?;
    }

    let mut init = RequestInit::new();
    init.with_method(method);
    init.with_headers(h);
    if let Some(body) = body {
        init.with_body(Some(body.into()));
    }

    let req = Request::new_with_init(url, &init)?;
    let mut resp = worker::Fetch::Request(req).send().await?;
    let status = resp.status_code();
    let text = resp.text().await.unwrap_or_default();
    Ok((status, text))
}

/// Like [`send`] but requires a 2xx JSON answer; anything else is `Upstream`.
pub async fn send_json(
    method: Method,
    url: &str,
    headers: &[(&str, &str)],
    body: Option<String>,
) -> AppResult<Value> {
    let (status, text) = send(method, url, headers, body).await?;
    if !is_success_status(status) {
        return Err(AppError::upstream(format!("{url} answered {status}: {text}")));
    }
    serde_json::from_str(&text)
        .map_err(|e| AppError::upstream(format!("{url} returned non-JSON (status={status}): {e}")))
}

/// Raw bytes of a bundled asset, `None` when the binding has no such file.
pub async fn asset_bytes(env: &Env, path: &str) -> AppResult<Option<Vec<u8>>> {
    let fetcher = env.assets("ASSETS")?;
    let url = format!("{ASSET_ORIGIN}/{}", path.trim_start_matches('/'));
    let mut resp = fetcher.fetch(url, None).await?;
    if resp.status_code() == 404 {
        return Ok(None);
    }
    if !is_success_status(resp.status_code()) {
        return Err(AppError::internal(format!(
            "asset {path} answered {}",
            resp.status_code()
        )));
    }
    Ok(Some(resp.bytes().await?))
}

pub async fn asset_text(env: &Env, path: &str) -> AppResult<Option<String>> {
    asset_bytes(env, path)
        .await?
        .map(|bytes| {
            String::from_utf8(bytes).map_err(|e| AppError::internal(format!("asset {path} is not UTF-8: {e}")))
        })
        .transpose()
}

pub async fn asset_json(env: &Env, path: &str) -> AppResult<Option<Value>> {
    let Some(text) = asset_text(env, path).await? else {
        return Ok(None);
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| AppError::internal(format!("asset {path} is not valid JSON: {e}")))
}
