use serde::Deserialize;
use serde_json::Value;
use worker::{Env, Request, Response, Result};

use crate::error::{AppError, AppResult};
use crate::mail::{order_confirmation_email, OrderLine};
use crate::services::accounts::find_by_id;
use crate::services::entitlements::purchased_resource;
use crate::services::orders::{checkout, list_orders, CheckoutInput};
use crate::util::{now_ts, simulated_payment_approved};
use crate::worker_wasm::auth::{optional_claims, require_claims};
use crate::worker_wasm::brevo::{send_best_effort, send_email};
use crate::worker_wasm::db::db_connect;
use crate::worker_wasm::env::load_config;
use crate::worker_wasm::http::{finish, json_ok, read_json};

pub async fn handle_checkout(mut req: Request, env: &Env) -> Result<Response> {
    let result = place_order(&mut req, env).await;
    finish(&req, result)
}

async fn place_order(req: &mut Request, env: &Env) -> AppResult<Response> {
    let cfg = load_config(env);
    let claims = optional_claims(req, &cfg);
    let payload: CheckoutInput = read_json(req).await?;
    let db = db_connect(env).await?;

    let outcome = checkout(
        &db,
        payload,
        claims.as_ref(),
        simulated_payment_approved()?,
        now_ts(),
    )
    .await?;

    let order = &outcome.order;
    let email = order_confirmation_email(
        &order.user_name,
        &order.user_email,
        Some(&order.order_id),
        &outcome.lines,
        order.total_cents,
    );
    send_best_effort(env, cfg.mail(), &email).await;

    json_ok(&serde_json::json!({
        "message": "Order placed successfully",
        "order_id": order.order_id,
    }))
}

pub async fn handle_orders(req: Request, env: &Env) -> Result<Response> {
    let result = orders(&req, env).await;
    finish(&req, result)
}

async fn orders(req: &Request, env: &Env) -> AppResult<Response> {
    let cfg = load_config(env);
    let claims = require_claims(req, &cfg)?;
    let db = db_connect(env).await?;
    json_ok(&list_orders(&db, claims.id).await?)
}

#[derive(Debug, Deserialize)]
struct ResendData {
    #[serde(default)]
    study_resource_id: Option<Value>,
}

pub async fn handle_resend_order_email(mut req: Request, env: &Env) -> Result<Response> {
    let result = resend(&mut req, env).await;
    finish(&req, result)
}

async fn resend(req: &mut Request, env: &Env) -> AppResult<Response> {
    let cfg = load_config(env);
    let claims = require_claims(req, &cfg)?;
    let payload: ResendData = read_json(req).await?;
    let resource_id = match payload.study_resource_id {
        Some(Value::Number(n)) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| AppError::bad_request("study_resource_id is required"))?;

    let db = db_connect(env).await?;
    let user = find_by_id(&db, claims.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let resource = purchased_resource(&db, user.id, resource_id)
        .await?
        .ok_or_else(|| AppError::not_found("No paid order found for this resource"))?;

    let line = OrderLine {
        chapter: resource.chapter_or_all().to_string(),
        title: resource.title,
        price_cents: resource.price_cents,
        file_path: resource.file_path,
    };
    let name = user.name.clone().unwrap_or_else(|| user.email.clone());
    let email = order_confirmation_email(&name, &user.email, None, &[line], resource.price_cents);
    send_email(env, cfg.mail()?, &email).await?;

    json_ok(&serde_json::json!({ "message": "Email resent successfully" }))
}
