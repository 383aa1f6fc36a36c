use sea_orm::DatabaseConnection;
use worker::Request;

use crate::error::AppResult;
use crate::rate_limit::RateLimitPolicy;
use crate::services::rate_limit::check;
use crate::util::now_ts;

use super::http::client_ip;

/// Count this request against `policy` for the caller's IP.
pub async fn enforce(req: &Request, db: &DatabaseConnection, policy: &RateLimitPolicy) -> AppResult<()> {
    check(db, policy, &client_ip(req), now_ts()).await?;
    Ok(())
}
