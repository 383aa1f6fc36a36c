use worker::{Env, Request, Response, Result};

use crate::content::{safe_file_name, view_content_paths, watermark, SECURE_HEADERS};
use crate::error::{AppError, AppResult};
use crate::mindmap::{normalize, resolve_file, search, MindmapFile};
use crate::services::catalog::{find_by_title, random_resources, resolve_page};
use crate::services::entitlements::check_resource_access;
use crate::util::now_ts;
use crate::worker_wasm::auth::{decode_token, optional_claims};
use crate::worker_wasm::db::db_connect;
use crate::worker_wasm::env::load_config;
use crate::worker_wasm::http::{finish, json_ok, query_param};
use crate::worker_wasm::outbound::asset_json;

const RANDOM_PRODUCT_COUNT: u64 = 3;

async fn load_mindmap(req: &Request, env: &Env) -> AppResult<(MindmapFile, serde_json::Value)> {
    let file = resolve_file(
        query_param(req, "chapter").as_deref(),
        query_param(req, "level").as_deref(),
    )?;
    let Some(doc) = asset_json(env, &file.asset_path()).await? else {
        return Err(file.missing_error());
    };
    Ok((file, doc))
}

pub async fn handle_mindmap_data(req: Request, env: &Env) -> Result<Response> {
    let result = mindmap_data(&req, env).await;
    finish(&req, result)
}

async fn mindmap_data(req: &Request, env: &Env) -> AppResult<Response> {
    let (file, doc) = load_mindmap(req, env).await?;
    if query_param(req, "format").as_deref() == Some("tree") {
        let tree = normalize(&doc).ok_or_else(|| {
            AppError::internal(format!("{} has no usable nodes", file.asset_path()))
        })?;
        return json_ok(&tree);
    }
    json_ok(&doc)
}

pub async fn handle_search_mindmap(req: Request, env: &Env) -> Result<Response> {
    let result = search_mindmap(&req, env).await;
    finish(&req, result)
}

async fn search_mindmap(req: &Request, env: &Env) -> AppResult<Response> {
    let q = query_param(req, "q").ok_or_else(|| AppError::bad_request("Search query is required"))?;
    let (file, doc) = load_mindmap(req, env).await?;
    let tree = normalize(&doc)
        .ok_or_else(|| AppError::internal(format!("{} has no usable nodes", file.asset_path())))?;
    let hits = search(&tree, &q);
    json_ok(&serde_json::json!({ "query": q, "count": hits.len(), "results": hits }))
}

pub async fn handle_view_content(req: Request, env: &Env) -> Result<Response> {
    let result = view_content(&req, env).await;
    finish(&req, result)
}

async fn view_content(req: &Request, env: &Env) -> AppResult<Response> {
    let file = safe_file_name(query_param(req, "file").as_deref())?;
    for path in view_content_paths(&file) {
        if let Some(doc) = asset_json(env, &path).await? {
            return json_ok(&doc);
        }
    }
    Err(AppError::not_found("File not found"))
}

pub async fn handle_secure_content(req: Request, env: &Env) -> Result<Response> {
    let result = secure_content(&req, env).await;
    finish(&req, result)
}

async fn secure_content(req: &Request, env: &Env) -> AppResult<Response> {
    let cfg = load_config(env);
    let file = safe_file_name(query_param(req, "file").as_deref())?;

    let user_id = match query_param(req, "token") {
        Some(token) => Some(
            decode_token(&cfg, &token)
                .map_err(|_| AppError::unauthorized("Invalid token"))?
                .id,
        ),
        None => optional_claims(req, &cfg).map(|c| c.id),
    };

    let doc = asset_json(env, &format!("output/{file}"))
        .await?
        .ok_or_else(|| AppError::not_found("Content not found"))?;

    let mut resp = json_ok(&watermark(doc, user_id, now_ts()))?;
    let headers = resp.headers_mut();
    for (k, v) in SECURE_HEADERS {
        headers.set(k, v)?;
    }
    Ok(resp)
}

pub async fn handle_get_resource(req: Request, env: &Env) -> Result<Response> {
    let result = get_resource(&req, env).await;
    finish(&req, result)
}

async fn get_resource(req: &Request, env: &Env) -> AppResult<Response> {
    let slug = query_param(req, "title").unwrap_or_default();
    let db = db_connect(env).await?;
    json_ok(&resolve_page(&db, &slug).await?)
}

pub async fn handle_study_resource_id(req: Request, env: &Env) -> Result<Response> {
    let result = study_resource_id(&req, env).await;
    finish(&req, result)
}

async fn study_resource_id(req: &Request, env: &Env) -> AppResult<Response> {
    let title = query_param(req, "title").ok_or_else(|| AppError::bad_request("Title is required"))?;
    let db = db_connect(env).await?;
    let resource = find_by_title(&db, &title)
        .await?
        .ok_or_else(|| AppError::not_found("Resource not found"))?;
    json_ok(&serde_json::json!({ "id": resource.id }))
}

pub async fn handle_random_products(req: Request, env: &Env) -> Result<Response> {
    let result = random_products(env).await;
    finish(&req, result)
}

async fn random_products(env: &Env) -> AppResult<Response> {
    let db = db_connect(env).await?;
    json_ok(&random_resources(&db, RANDOM_PRODUCT_COUNT).await?)
}

pub async fn handle_check_resource_access(req: Request, env: &Env) -> Result<Response> {
    let result = resource_access(&req, env).await;
    finish(&req, result)
}

async fn resource_access(req: &Request, env: &Env) -> AppResult<Response> {
    let cfg = load_config(env);
    let user_id = optional_claims(req, &cfg).map(|c| c.id);
    let db = db_connect(env).await?;
    let decision = check_resource_access(
        &db,
        user_id,
        query_param(req, "resourceId").as_deref(),
        query_param(req, "resourceType").as_deref(),
        now_ts(),
    )
    .await?;
    json_ok(&decision)
}
