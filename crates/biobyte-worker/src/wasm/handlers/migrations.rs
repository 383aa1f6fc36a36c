use serde::Serialize;
use worker::{Env, Request, Response, Result};

use migration::{Migrator, MigratorTrait};

use crate::error::AppResult;
use crate::worker_wasm::db::db_connect;
use crate::worker_wasm::http::{finish, json_ok, query_param};

use super::admin_auth::ensure_admin_authorized;

/// Default batch size; each statement is a libSQL subrequest.
const DEFAULT_STEPS: u32 = 1;

#[derive(Debug, Serialize)]
struct MigrationProgress {
    requested_steps: u32,
    applied_now: usize,
    pending: usize,
    done: bool,
    next: Option<String>,
}

pub async fn handle_migrations_up(req: &Request, env: &Env) -> Result<Response> {
    if let Some(resp) = ensure_admin_authorized(req, env).await? {
        return Ok(resp);
    }
    let result = migrate(req, env).await;
    finish(req, result)
}

async fn migrate(req: &Request, env: &Env) -> AppResult<Response> {
    let steps = query_param(req, "steps")
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_STEPS);

    let db = db_connect(env).await?;
    let before = Migrator::get_pending_migrations(&db).await?.len();
    let batch = steps.min(u32::try_from(before).unwrap_or(u32::MAX));
    if batch > 0 {
        Migrator::up(&db, Some(batch)).await?;
    }
    let pending = Migrator::get_pending_migrations(&db).await?;

    let progress = MigrationProgress {
        requested_steps: steps,
        applied_now: before.saturating_sub(pending.len()),
        pending: pending.len(),
        done: pending.is_empty(),
        next: pending.first().map(|m| m.name().to_string()),
    };
    tracing::info!(applied_now = progress.applied_now, pending = progress.pending, "migrations applied");
    json_ok(&serde_json::json!({ "success": true, "migrations": progress }))
}
