use serde::Deserialize;
use worker::{Env, Request, Response, Result};

use crate::error::{AppError, AppResult};
use crate::mail::{password_reset_email, reset_link, verification_code_email};
use crate::rate_limit::{LOGIN, VERIFICATION};
use crate::services::accounts::{
    self, change_password, find_by_id, issue_verification_code, register, reset_password,
    start_password_reset, ChangePasswordInput, RegisterInput,
};
use crate::session::{login_cookies, logout_cookies};
use crate::util::{normalize_email, now_ts};
use crate::worker_wasm::auth::{optional_claims, require_claims};
use crate::worker_wasm::brevo::send_email;
use crate::worker_wasm::db::db_connect;
use crate::worker_wasm::env::load_config;
use crate::worker_wasm::http::{finish, json_ok, json_status, read_json, with_cookies};
use crate::worker_wasm::limits::enforce;

#[derive(Debug, Deserialize)]
struct EmailData {
    #[serde(default)]
    email: String,
}

pub async fn handle_send_verification_code(mut req: Request, env: &Env) -> Result<Response> {
    let result = send_verification_code(&mut req, env).await;
    finish(&req, result)
}

async fn send_verification_code(req: &mut Request, env: &Env) -> AppResult<Response> {
    let cfg = load_config(env);
    let db = db_connect(env).await?;
    enforce(req, &db, &VERIFICATION).await?;

    let payload: EmailData = read_json(req).await?;
    let email = normalize_email(&payload.email);
    let code = issue_verification_code(&db, &email, now_ts()).await?;

    send_email(env, cfg.mail()?, &verification_code_email(&email, &code)).await?;
    json_ok(&serde_json::json!({ "message": "Verification code sent" }))
}

pub async fn handle_register(mut req: Request, env: &Env) -> Result<Response> {
    let result = register_user(&mut req, env).await;
    finish(&req, result)
}

async fn register_user(req: &mut Request, env: &Env) -> AppResult<Response> {
    let db = db_connect(env).await?;
    enforce(req, &db, &VERIFICATION).await?;

    let payload: RegisterInput = read_json(req).await?;
    let user = register(&db, payload, now_ts()).await?;
    json_status(
        &serde_json::json!({
            "message": "User registered successfully.",
            "user": { "id": user.id, "email": user.email, "name": user.name },
        }),
        201,
    )
}

#[derive(Debug, Deserialize)]
struct LoginData {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

pub async fn handle_login(mut req: Request, env: &Env) -> Result<Response> {
    let result = login(&mut req, env).await;
    finish(&req, result)
}

async fn login(req: &mut Request, env: &Env) -> AppResult<Response> {
    let cfg = load_config(env);
    let db = db_connect(env).await?;
    enforce(req, &db, &LOGIN).await?;

    let payload: LoginData = read_json(req).await?;
    let session = accounts::login(
        &db,
        &normalize_email(&payload.email),
        &payload.password,
        cfg.jwt_secret()?,
        cfg.token_ttl_secs,
        now_ts(),
    )
    .await?;

    let resp = json_ok(&serde_json::json!({
        "message": "Login successful",
        "token": session.token,
        "expiresAt": session.claims.exp,
        "user": {
            "id": session.user.id,
            "email": session.user.email,
            "name": session.user.name,
            "role": session.claims.role,
        },
    }))?;
    with_cookies(
        resp,
        &login_cookies(&session.token, &session.claims, cfg.token_ttl_secs),
    )
}

pub async fn handle_logout(req: Request, _env: &Env) -> Result<Response> {
    let result = json_ok(&serde_json::json!({ "message": "Logged out successfully" }))
        .and_then(|resp| with_cookies(resp, &logout_cookies()));
    finish(&req, result)
}

/// Always 200; anonymous callers get `isAuthenticated: false`.
pub async fn handle_auth_check(req: Request, env: &Env) -> Result<Response> {
    let cfg = load_config(env);
    let body = match optional_claims(&req, &cfg) {
        Some(claims) => serde_json::json!({
            "isAuthenticated": true,
            "user": {
                "id": claims.id,
                "email": claims.email,
                "role": claims.role,
            },
        }),
        None => serde_json::json!({ "isAuthenticated": false, "user": null }),
    };
    finish(&req, json_ok(&body))
}

pub async fn handle_user(req: Request, env: &Env) -> Result<Response> {
    let result = current_user(&req, env).await;
    finish(&req, result)
}

async fn current_user(req: &Request, env: &Env) -> AppResult<Response> {
    let cfg = load_config(env);
    let claims = require_claims(req, &cfg)?;
    let db = db_connect(env).await?;
    let user = find_by_id(&db, claims.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    json_ok(&serde_json::json!({
        "id": user.id,
        "email": user.email,
        "name": user.name,
        "role": user.role().as_str(),
    }))
}

pub async fn handle_forgot_password(mut req: Request, env: &Env) -> Result<Response> {
    let result = forgot_password(&mut req, env).await;
    finish(&req, result)
}

async fn forgot_password(req: &mut Request, env: &Env) -> AppResult<Response> {
    let cfg = load_config(env);
    let db = db_connect(env).await?;
    enforce(req, &db, &VERIFICATION).await?;

    let payload: EmailData = read_json(req).await?;
    let email = normalize_email(&payload.email);
    if email.is_empty() {
        return Err(AppError::bad_request("Email is required."));
    }
    let token = start_password_reset(&db, &email, now_ts()).await?;

    let link = reset_link(&cfg.app_url, &token);
    send_email(env, cfg.mail()?, &password_reset_email(&email, &link)).await?;
    json_ok(&serde_json::json!({ "message": "Password reset link sent to your email." }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetData {
    #[serde(default)]
    token: String,
    #[serde(default, alias = "password")]
    new_password: String,
}

pub async fn handle_reset_password(mut req: Request, env: &Env) -> Result<Response> {
    let result = reset(&mut req, env).await;
    finish(&req, result)
}

async fn reset(req: &mut Request, env: &Env) -> AppResult<Response> {
    let db = db_connect(env).await?;
    let payload: ResetData = read_json(req).await?;
    reset_password(&db, &payload.token, &payload.new_password, now_ts()).await?;
    json_ok(&serde_json::json!({ "message": "Password has been reset successfully." }))
}

pub async fn handle_change_password(mut req: Request, env: &Env) -> Result<Response> {
    let result = change(&mut req, env).await;
    finish(&req, result)
}

async fn change(req: &mut Request, env: &Env) -> AppResult<Response> {
    let db = db_connect(env).await?;
    enforce(req, &db, &LOGIN).await?;
    let payload: ChangePasswordInput = read_json(req).await?;
    change_password(&db, payload, now_ts()).await?;
    json_ok(&serde_json::json!({ "message": "Password changed successfully." }))
}
