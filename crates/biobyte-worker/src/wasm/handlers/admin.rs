use sea_orm::ConnectionTrait;
use worker::{Env, Request, Response, Result};

use crate::error::{AppError, AppResult};
use crate::services::accounts::find_by_id;
use crate::services::admin::{
    grant_membership, grant_resource, search_users, GrantMembershipInput, GrantResourceInput, UserRow,
};
use crate::services::catalog::list_brief;
use crate::util::{now_ts, ts_to_rfc3339};
use crate::worker_wasm::auth::require_admin;
use crate::worker_wasm::db::db_connect;
use crate::worker_wasm::env::load_config;
use crate::worker_wasm::http::{finish, internal_error_response, json_ok, json_with_cors, query_param, read_json};

use super::admin_auth::ensure_admin_authorized;

pub async fn handle_verify(req: Request, env: &Env) -> Result<Response> {
    let result = verify(&req, env).await;
    finish(&req, result)
}

async fn verify(req: &Request, env: &Env) -> AppResult<Response> {
    let claims = require_admin(req, &load_config(env))?;
    let db = db_connect(env).await?;
    let user = find_by_id(&db, claims.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    json_ok(&serde_json::json!({ "isAdmin": true, "user": UserRow::from(user) }))
}

pub async fn handle_users(req: Request, env: &Env) -> Result<Response> {
    let result = users(&req, env).await;
    finish(&req, result)
}

async fn users(req: &Request, env: &Env) -> AppResult<Response> {
    require_admin(req, &load_config(env))?;
    let db = db_connect(env).await?;
    let rows = search_users(&db, query_param(req, "search").as_deref()).await?;
    json_ok(&serde_json::json!({ "users": rows }))
}

pub async fn handle_resources(req: Request, env: &Env) -> Result<Response> {
    let result = resources(&req, env).await;
    finish(&req, result)
}

async fn resources(req: &Request, env: &Env) -> AppResult<Response> {
    require_admin(req, &load_config(env))?;
    let db = db_connect(env).await?;
    json_ok(&serde_json::json!({ "resources": list_brief(&db).await? }))
}

pub async fn handle_grant_membership(mut req: Request, env: &Env) -> Result<Response> {
    let result = membership(&mut req, env).await;
    finish(&req, result)
}

async fn membership(req: &mut Request, env: &Env) -> AppResult<Response> {
    let admin = require_admin(req, &load_config(env))?;
    let payload: GrantMembershipInput = read_json(req).await?;
    let db = db_connect(env).await?;
    let granted = grant_membership(&db, payload, now_ts()).await?;
    tracing::info!(admin_id = admin.id, user_id = granted.user_id, "admin granted membership");

    json_ok(&serde_json::json!({
        "success": true,
        "message": format!("Membership granted: {}", granted.membership_type),
        "membership": {
            "userId": granted.user_id,
            "membershipType": granted.membership_type,
            "startDate": ts_to_rfc3339(granted.start_date),
            "expireDate": granted.expire_date.map(ts_to_rfc3339),
            "status": granted.status,
        },
    }))
}

pub async fn handle_grant_resource(mut req: Request, env: &Env) -> Result<Response> {
    let result = resource(&mut req, env).await;
    finish(&req, result)
}

async fn resource(req: &mut Request, env: &Env) -> AppResult<Response> {
    let admin = require_admin(req, &load_config(env))?;
    let payload: GrantResourceInput = read_json(req).await?;
    let db = db_connect(env).await?;
    let grant = grant_resource(&db, payload, now_ts()).await?;
    tracing::info!(admin_id = admin.id, order_id = grant.order.order_id.as_str(), "admin granted resource");

    json_ok(&serde_json::json!({
        "success": true,
        "message": format!("Granted \"{}\" to {}", grant.resource.title, grant.user.email),
        "orderId": grant.order.order_id,
    }))
}

pub async fn handle_db_ping(req: &Request, env: &Env) -> Result<Response> {
    if let Some(resp) = ensure_admin_authorized(req, env).await? {
        return Ok(resp);
    }

    let db = match db_connect(env).await {
        Ok(db) => db,
        Err(e) => return internal_error_response(req, "Failed to open libSQL connection", &e),
    };

    // A minimal query to validate the connection.
    if let Err(e) = db.execute_unprepared("SELECT 1").await {
        return internal_error_response(req, "libSQL ping failed", &e);
    }

    let resp = Response::from_json(&serde_json::json!({
        "success": true,
        "db": { "ok": true }
    }))?;

    json_with_cors(req, resp)
}
