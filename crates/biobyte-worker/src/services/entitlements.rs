use std::collections::{HashMap, HashSet};

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, JoinType, PaginatorTrait, QueryFilter, QuerySelect,
    RelationTrait, Set,
};
use tracing::debug;

use entity::order::OrderStatus;
use entity::{membership, order, order_item, study_resource, user_study_resource};

use crate::access::{
    allows, decide_for_resource, AccessDecision, AccessTier, DenyReason, Viewer, TYPE_MINDMAP,
    TYPE_SYLLABUS_ANALYSIS,
};
use crate::error::{AppError, AppResult};
use crate::services::catalog::find_resource;

/// The user's membership if it grants access at `now`.
pub async fn active_membership<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    now: i64,
) -> AppResult<Option<membership::Model>> {
    let row = membership::Entity::find()
        .filter(membership::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    Ok(row.filter(|m| m.is_effective_at(now)))
}

/// Whether a `PAID` order owned by the user contains the resource.
pub async fn has_paid_item<C: ConnectionTrait>(db: &C, user_id: i32, resource_id: i32) -> AppResult<bool> {
    let count = order_item::Entity::find()
        .join(JoinType::InnerJoin, order_item::Relation::Order.def())
        .filter(order::Column::UserId.eq(user_id))
        .filter(order::Column::Status.eq(OrderStatus::Paid.as_str()))
        .filter(order_item::Column::StudyResourceId.eq(resource_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Subset of `resource_ids` the user holds a paid order item for, in one query.
pub async fn paid_resource_ids<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    resource_ids: &[i32],
) -> AppResult<HashSet<i32>> {
    if resource_ids.is_empty() {
        return Ok(HashSet::new());
    }
    let ids: Vec<i32> = order_item::Entity::find()
        .select_only()
        .column(order_item::Column::StudyResourceId)
        .distinct()
        .join(JoinType::InnerJoin, order_item::Relation::Order.def())
        .filter(order::Column::UserId.eq(user_id))
        .filter(order::Column::Status.eq(OrderStatus::Paid.as_str()))
        .filter(order_item::Column::StudyResourceId.is_in(resource_ids.iter().copied()))
        .into_tuple()
        .all(db)
        .await?;
    Ok(ids.into_iter().collect())
}

/// Everything needed to evaluate `resource` for a user.
pub async fn viewer_for<C: ConnectionTrait>(
    db: &C,
    user_id: Option<i32>,
    resource: &study_resource::Model,
    now: i64,
) -> AppResult<Viewer> {
    let Some(user_id) = user_id else {
        return Ok(Viewer::default());
    };
    let has_membership = match AccessTier::of(resource) {
        AccessTier::Membership => active_membership(db, user_id, now).await?.is_some(),
        _ => false,
    };
    let has_paid_item = match AccessTier::of(resource) {
        AccessTier::Paid => has_paid_item(db, user_id, resource.id).await?,
        _ => false,
    };
    Ok(Viewer {
        authenticated: true,
        has_membership,
        has_paid_item,
    })
}

pub async fn can_access<C: ConnectionTrait>(
    db: &C,
    user_id: Option<i32>,
    resource: &study_resource::Model,
    now: i64,
) -> AppResult<bool> {
    let viewer = viewer_for(db, user_id, resource, now).await?;
    Ok(allows(AccessTier::of(resource), viewer))
}

/// Access map for many resources with at most one membership and one paid-items query.
pub async fn batch_access<C: ConnectionTrait>(
    db: &C,
    user_id: Option<i32>,
    resources: &[study_resource::Model],
    now: i64,
) -> AppResult<HashMap<i32, bool>> {
    let Some(user_id) = user_id else {
        return Ok(resources.iter().map(|r| (r.id, false)).collect());
    };

    let needs_membership = resources
        .iter()
        .any(|r| AccessTier::of(r) == AccessTier::Membership);
    let has_membership = needs_membership && active_membership(db, user_id, now).await?.is_some();

    let paid_ids: Vec<i32> = resources
        .iter()
        .filter(|r| AccessTier::of(r) == AccessTier::Paid)
        .map(|r| r.id)
        .collect();
    let owned = paid_resource_ids(db, user_id, &paid_ids).await?;

    Ok(resources
        .iter()
        .map(|r| {
            let viewer = Viewer {
                authenticated: true,
                has_membership,
                has_paid_item: owned.contains(&r.id),
            };
            (r.id, allows(AccessTier::of(r), viewer))
        })
        .collect())
}

/// `check-resource-access`: a type shortcut when `resource_type` names one, otherwise the
/// rule evaluation for `resource_id`.
pub async fn check_resource_access<C: ConnectionTrait>(
    db: &C,
    user_id: Option<i32>,
    resource_id: Option<&str>,
    resource_type: Option<&str>,
    now: i64,
) -> AppResult<AccessDecision> {
    let Some(user_id) = user_id else {
        return Ok(AccessDecision::denied(DenyReason::NotLoggedIn, None));
    };

    match resource_type.map(str::trim) {
        Some(TYPE_SYLLABUS_ANALYSIS) => {
            return Ok(AccessDecision::granted(Some(TYPE_SYLLABUS_ANALYSIS.to_string())));
        }
        Some(TYPE_MINDMAP) => {
            let kind = Some(TYPE_MINDMAP.to_string());
            return Ok(if active_membership(db, user_id, now).await?.is_some() {
                AccessDecision::granted(kind)
            } else {
                AccessDecision::denied(DenyReason::MembershipRequired, kind)
            });
        }
        _ => {}
    }

    let id = resource_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::bad_request("Resource ID or Resource Type is required"))?;
    let id: i32 = id
        .parse()
        .map_err(|_| AppError::bad_request("Invalid resource ID"))?;
    let resource = find_resource(db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Resource not found"))?;

    let viewer = viewer_for(db, Some(user_id), &resource, now).await?;
    debug!(user_id, resource_id = id, ?viewer, "evaluated resource access");
    Ok(decide_for_resource(&resource, viewer))
}

/// Refresh the buyer's library rows for every item of a paid order.
pub async fn record_library<C: ConnectionTrait>(
    db: &C,
    paid: &order::Model,
    now: i64,
) -> AppResult<usize> {
    let Some(user_id) = paid.user_id else {
        return Ok(0);
    };
    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(paid.order_id.as_str()))
        .all(db)
        .await?;

    for item in &items {
        let row = user_study_resource::ActiveModel {
            user_id: Set(user_id),
            study_resource_id: Set(item.study_resource_id),
            purchase_date: Set(now),
            order_id: Set(Some(paid.order_id.clone())),
            status: Set(OrderStatus::Paid.as_str().to_string()),
            transaction_id: Set(paid.transaction_id.clone()),
        };
        user_study_resource::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    user_study_resource::Column::UserId,
                    user_study_resource::Column::StudyResourceId,
                ])
                .update_columns([
                    user_study_resource::Column::PurchaseDate,
                    user_study_resource::Column::OrderId,
                    user_study_resource::Column::Status,
                    user_study_resource::Column::TransactionId,
                ])
                .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
    }
    Ok(items.len())
}

/// Resources the user owns through a paid order, for re-sending deliverables.
pub async fn purchased_resource<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    resource_id: i32,
) -> AppResult<Option<study_resource::Model>> {
    if !has_paid_item(db, user_id, resource_id).await? {
        return Ok(None);
    }
    find_resource(db, resource_id).await
}
