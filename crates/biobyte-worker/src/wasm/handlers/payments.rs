use serde::Deserialize;
use serde_json::Value;
use worker::{Env, Method, Request, Response, Result};

use entity::order::PaymentMethod;

use crate::error::{AppError, AppResult};
use crate::paypal::{create_order_body, verify_webhook_body, webhook_action, webhook_verified, Capture};
use crate::services::orders::{apply_capture, apply_webhook, mark_order_paid, parse_amount_cents};
use crate::util::{generate_order_id, now_ts, random_base36};
use crate::wechat::{decrypt_transaction, signed_native_order, Notification, TRANSACTION_SUCCESS};
use crate::worker_wasm::db::db_connect;
use crate::worker_wasm::env::load_config;
use crate::worker_wasm::http::{finish, json_ok, read_json};
use crate::worker_wasm::outbound::send_json;
use crate::worker_wasm::paypal_client;

#[derive(Debug, Deserialize)]
struct CreateOrderData {
    #[serde(default)]
    amount: Option<Value>,
    #[serde(default)]
    order_id: Option<String>,
}

pub async fn handle_paypal_create_order(mut req: Request, env: &Env) -> Result<Response> {
    let result = paypal_create_order(&mut req, env).await;
    finish(&req, result)
}

async fn paypal_create_order(req: &mut Request, env: &Env) -> AppResult<Response> {
    let cfg = load_config(env);
    let payload: CreateOrderData = read_json(req).await?;
    let amount_cents = parse_amount_cents(payload.amount.as_ref())?;
    let order_id = match payload.order_id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        Some(id) => id,
        None => generate_order_id()?,
    };

    let paypal = cfg.paypal()?;
    let created = paypal_client::create_order(
        paypal,
        &create_order_body(amount_cents, &order_id, &cfg.app_url),
    )
    .await?;
    tracing::info!(order_id = order_id.as_str(), paypal_order_id = created.id.as_str(), "PayPal order created");

    json_ok(&serde_json::json!({
        "success": true,
        "order_id": order_id,
        "paypal_order_id": created.id,
        "approval_url": created.approval_url(),
    }))
}

#[derive(Debug, Deserialize)]
struct CaptureData {
    #[serde(default)]
    paypal_order_id: Option<String>,
    #[serde(default)]
    order_id: Option<String>,
}

pub async fn handle_paypal_capture_order(mut req: Request, env: &Env) -> Result<Response> {
    let result = paypal_capture_order(&mut req, env).await;
    finish(&req, result)
}

async fn paypal_capture_order(req: &mut Request, env: &Env) -> AppResult<Response> {
    let cfg = load_config(env);
    let payload: CaptureData = read_json(req).await?;
    let paypal_order_id = payload
        .paypal_order_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::bad_request("PayPal order ID is required"))?;

    let response = paypal_client::capture_order(cfg.paypal()?, &paypal_order_id).await?;
    let capture = Capture::from_response(&response);

    let db = db_connect(env).await?;
    let result = apply_capture(&db, &capture, payload.order_id.as_deref(), now_ts()).await?;
    json_ok(&result)
}

/// Always 200 so PayPal does not keep redelivering; problems are logged.
pub async fn handle_paypal_webhook(mut req: Request, env: &Env) -> Result<Response> {
    let message = match paypal_webhook(&mut req, env).await {
        Ok(message) => message,
        Err(e) => {
            tracing::error!("webhook processing failed: {e}");
            "Webhook received, processing failed"
        }
    };
    finish(&req, json_ok(&serde_json::json!({ "message": message })))
}

async fn paypal_webhook(req: &mut Request, env: &Env) -> AppResult<&'static str> {
    let cfg = load_config(env);
    let raw = req.text().await?;
    let event: Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("webhook body is not JSON: {e}");
            return Ok("Invalid webhook event");
        }
    };

    if let Some((paypal, webhook_id)) = cfg
        .paypal
        .as_ref()
        .and_then(|p| p.webhook_id.as_deref().map(|id| (p, id)))
    {
        let header = |name: &str| req.headers().get(name).ok().flatten();
        let Some(body) = verify_webhook_body(webhook_id, &event, header) else {
            tracing::warn!("webhook missing transmission headers; dropped");
            return Ok("Webhook dropped");
        };
        let verdict = paypal_client::verify_webhook(paypal, &body).await?;
        if !webhook_verified(&verdict) {
            tracing::warn!("webhook signature not verified; dropped");
            return Ok("Webhook dropped");
        }
    }

    let action = webhook_action(&event);
    let db = db_connect(env).await?;
    apply_webhook(&db, &action, now_ts()).await;
    Ok("Webhook processed")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeChatPayData {
    #[serde(default)]
    order_id: String,
    #[serde(default)]
    total_fee: i64,
    #[serde(default)]
    description: String,
}

pub async fn handle_wechat_pay(mut req: Request, env: &Env) -> Result<Response> {
    let result = wechat_pay(&mut req, env).await;
    finish(&req, result)
}

async fn wechat_pay(req: &mut Request, env: &Env) -> AppResult<Response> {
    let cfg = load_config(env);
    let payload: WeChatPayData = read_json(req).await?;
    let order_id = payload.order_id.trim();
    if order_id.is_empty() || payload.total_fee <= 0 {
        return Err(AppError::bad_request("orderId and a positive totalFee are required"));
    }

    let wechat = cfg.wechat()?;
    let signed = signed_native_order(
        wechat,
        order_id,
        payload.total_fee,
        payload.description.trim(),
        now_ts(),
        &random_base36(32)?,
    )?;
    let response = send_json(
        Method::Post,
        &signed.url,
        &[
            ("Authorization", signed.authorization.as_str()),
            ("Content-Type", "application/json"),
            ("Wechatpay-Serial", wechat.serial_no.as_str()),
        ],
        Some(signed.body),
    )
    .await?;
    tracing::info!(order_id, "WeChat Native transaction created");
    json_ok(&response)
}

pub async fn handle_wechat_notify(mut req: Request, env: &Env) -> Result<Response> {
    let result = wechat_notify(&mut req, env).await;
    finish(&req, result)
}

async fn wechat_notify(req: &mut Request, env: &Env) -> AppResult<Response> {
    let cfg = load_config(env);
    let notification: Notification = read_json(req)
        .await
        .map_err(|_| AppError::bad_request("Missing resource data"))?;
    let tx = decrypt_transaction(&cfg.wechat()?.api_v3_key, &notification.resource)?;

    let succeeded = notification.event_type == TRANSACTION_SUCCESS
        || tx.trade_state.as_deref() == Some("SUCCESS");
    if !succeeded {
        tracing::warn!(out_trade_no = tx.out_trade_no.as_str(), "WeChat payment not successful");
        return Err(AppError::bad_request("Payment not successful"));
    }

    let db = db_connect(env).await?;
    mark_order_paid(
        &db,
        &tx.out_trade_no,
        Some(&tx.transaction_id),
        Some(PaymentMethod::Wechat),
        now_ts(),
    )
    .await?;
    json_ok(&serde_json::json!({ "code": "SUCCESS", "message": "Payment succeeded" }))
}
