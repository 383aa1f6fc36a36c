use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tracing::{debug, warn};

use entity::rate_limit;

use crate::error::{AppError, AppResult};
use crate::rate_limit::{verdict, window_cutoff, RateLimitPolicy, Verdict};

/// Count one request from `client` against `policy`.
///
/// The increment (or window reset) is a single upsert. Over the limit
/// yields `AppError::TooManyRequests` carrying the seconds left in the window.
pub async fn check<C: ConnectionTrait>(
    db: &C,
    policy: &RateLimitPolicy,
    client: &str,
    now: i64,
) -> AppResult<i32> {
    let key = policy.key(client);
    let cutoff = window_cutoff(policy, now);
    let elapsed = Expr::col(rate_limit::Column::WindowStart).lte(cutoff);

    let row = rate_limit::ActiveModel {
        key: Set(key.clone()),
        window_start: Set(now),
        count: Set(1),
    };
    rate_limit::Entity::insert(row)
        .on_conflict(
            OnConflict::column(rate_limit::Column::Key)
                .value(
                    rate_limit::Column::Count,
                    Expr::case(elapsed.clone(), 1)
                        .finally(Expr::col(rate_limit::Column::Count).add(1)),
                )
                .value(
                    rate_limit::Column::WindowStart,
                    Expr::case(elapsed, now).finally(Expr::col(rate_limit::Column::WindowStart)),
                )
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    let counter = rate_limit::Entity::find_by_id(key.clone())
        .one(db)
        .await?
        .ok_or_else(|| AppError::internal(format!("rate limit row {key} missing after upsert")))?;

    if counter.count == 1 {
        prune_elapsed(db, policy, cutoff).await?;
    }

    match verdict(policy, counter.window_start, counter.count, now) {
        Verdict::Allowed { remaining } => Ok(remaining),
        Verdict::Limited { retry_after } => {
            warn!(key = %key, retry_after, "rate limit exceeded");
            Err(AppError::TooManyRequests {
                message: policy.message.to_string(),
                retry_after,
            })
        }
    }
}

/// Drop this policy's counters whose window has already elapsed.
async fn prune_elapsed<C: ConnectionTrait>(
    db: &C,
    policy: &RateLimitPolicy,
    cutoff: i64,
) -> AppResult<u64> {
    let deleted = rate_limit::Entity::delete_many()
        .filter(rate_limit::Column::Key.starts_with(format!("{}:", policy.name)))
        .filter(rate_limit::Column::WindowStart.lte(cutoff))
        .exec(db)
        .await?
        .rows_affected;
    if deleted > 0 {
        debug!(policy = policy.name, deleted, "pruned elapsed rate limit windows");
    }
    Ok(deleted)
}
