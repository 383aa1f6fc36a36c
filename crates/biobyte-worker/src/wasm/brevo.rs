use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use worker::{Env, Method};

use crate::config::MailConfig;
use crate::error::AppResult;
use crate::mail::{brevo_payload, EmailMessage, BREVO_SEND_URL};

use super::outbound::{asset_bytes, send_json};

/// Send through Brevo, attaching each referenced asset that exists.
pub async fn send_email(env: &Env, cfg: &MailConfig, msg: &EmailMessage) -> AppResult<()> {
    let mut attachments = Vec::with_capacity(msg.attachments.len());
    for att in &msg.attachments {
        match asset_bytes(env, &att.path).await? {
            Some(bytes) => attachments.push((att.name.clone(), STANDARD.encode(bytes))),
            None => tracing::warn!(path = att.path.as_str(), "attachment missing from assets"),
        }
    }

    let body = brevo_payload(cfg, msg, attachments).to_string();
    send_json(
        Method::Post,
        BREVO_SEND_URL,
        &[("api-key", cfg.api_key.as_str()), ("Content-Type", "application/json")],
        Some(body),
    )
    .await?;

    tracing::info!(subject = msg.subject.as_str(), "email sent");
    Ok(())
}

/// Order emails must never fail the request that triggered them.
pub async fn send_best_effort(env: &Env, cfg: AppResult<&MailConfig>, msg: &EmailMessage) {
    let result = match cfg {
        Ok(cfg) => send_email(env, cfg, msg).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::warn!(subject = msg.subject.as_str(), "email not sent: {e}");
    }
}
