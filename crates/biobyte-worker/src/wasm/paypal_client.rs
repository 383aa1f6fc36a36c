use serde_json::Value;
use worker::Method;

use crate::config::PayPalConfig;
use crate::error::{AppError, AppResult};
use crate::paypal::{
    basic_auth, capture_url, orders_url, token_url, verify_webhook_url, AccessToken, CreatedOrder,
};

use super::outbound::send_json;

pub async fn access_token(cfg: &PayPalConfig) -> AppResult<String> {
    let auth = format!("Basic {}", basic_auth(cfg));
    let value = send_json(
        Method::Post,
        &token_url(cfg),
        &[
            ("Authorization", auth.as_str()),
            ("Content-Type", "application/x-www-form-urlencoded"),
        ],
        Some("grant_type=client_credentials".to_string()),
    )
    .await?;
    let token: AccessToken = serde_json::from_value(value)
        .map_err(|e| AppError::upstream(format!("PayPal token response: {e}")))?;
    Ok(token.access_token)
}

async fn authorized_post(cfg: &PayPalConfig, url: &str, body: String) -> AppResult<Value> {
    let token = access_token(cfg).await?;
    let bearer = format!("Bearer {token}");
    send_json(
        Method::Post,
        url,
        &[("Authorization", bearer.as_str()), ("Content-Type", "application/json")],
        Some(body),
    )
    .await
}

pub async fn create_order(cfg: &PayPalConfig, body: &Value) -> AppResult<CreatedOrder> {
    let value = authorized_post(cfg, &orders_url(cfg), body.to_string()).await?;
    serde_json::from_value(value).map_err(|e| AppError::upstream(format!("PayPal order response: {e}")))
}

pub async fn capture_order(cfg: &PayPalConfig, paypal_order_id: &str) -> AppResult<Value> {
    authorized_post(cfg, &capture_url(cfg, paypal_order_id), "{}".to_string()).await
}

pub async fn verify_webhook(cfg: &PayPalConfig, body: &Value) -> AppResult<Value> {
    authorized_post(cfg, &verify_webhook_url(cfg), body.to_string()).await
}
