use worker::{Env, Method, Request, Response, Result};

use crate::chat::{completion_body, completion_url, extract_reply, system_prompt, ChatRequest, UserContext, PROMPT_ASSET};
use crate::error::{AppError, AppResult};
use crate::services::accounts::find_by_id;
use crate::services::orders::order_summaries;
use crate::worker_wasm::auth::optional_claims;
use crate::worker_wasm::db::db_connect;
use crate::worker_wasm::env::load_config;
use crate::worker_wasm::http::{finish, json_ok, read_json};
use crate::worker_wasm::outbound::{asset_text, send_json};

pub async fn handle_chat(mut req: Request, env: &Env) -> Result<Response> {
    let result = chat(&mut req, env).await;
    finish(&req, result)
}

async fn chat(req: &mut Request, env: &Env) -> AppResult<Response> {
    let cfg = load_config(env);
    let claims = optional_claims(req, &cfg);
    let payload: ChatRequest = read_json(req).await?;
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(AppError::bad_request("Message is required"));
    }
    let llm = cfg.llm()?;

    let base = asset_text(env, PROMPT_ASSET)
        .await?
        .ok_or_else(|| AppError::internal(format!("{PROMPT_ASSET} missing from assets")))?;

    // Order context comes from the database only.
    let context = match claims {
        Some(claims) => {
            let db = db_connect(env).await?;
            match find_by_id(&db, claims.id).await? {
                Some(user) => Some(UserContext {
                    orders: order_summaries(&db, user.id).await?,
                    id: user.id,
                    name: user.name,
                    email: user.email,
                }),
                None => None,
            }
        }
        None => None,
    };

    let system = system_prompt(&base, context.as_ref());
    let bearer = format!("Bearer {}", llm.api_key);
    let response = send_json(
        Method::Post,
        &completion_url(llm),
        &[("Authorization", bearer.as_str()), ("Content-Type", "application/json")],
        Some(completion_body(llm, &system, message).to_string()),
    )
    .await?;

    json_ok(&serde_json::json!({ "message": extract_reply(&response)? }))
}
