use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use entity::membership::{MembershipStatus, MembershipType};
use entity::order::{OrderStatus, PaymentMethod};
use entity::{membership, order, order_item, study_resource, user};

use crate::error::{AppError, AppResult};
use crate::services::accounts::{find_by_email, find_by_id};
use crate::services::catalog::find_resource;
use crate::services::entitlements::record_library;
use crate::util::{generate_grant_order_id, normalize_email, ts_to_rfc3339};

pub const USER_SEARCH_LIMIT: u64 = 50;
const SECS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRow {
    pub id: i32,
    pub email: String,
    pub name: Option<String>,
    pub role: String,
    pub created_at: String,
}

impl From<user::Model> for UserRow {
    fn from(u: user::Model) -> Self {
        let role = u.role().as_str().to_string();
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            role,
            created_at: ts_to_rfc3339(u.created_at),
        }
    }
}

/// Numeric searches match the id exactly; anything else is a
/// case-insensitive email substring.
pub async fn search_users<C: ConnectionTrait>(db: &C, search: Option<&str>) -> AppResult<Vec<UserRow>> {
    let mut query = user::Entity::find();
    if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
        query = match term.parse::<i32>() {
            Ok(id) => query.filter(user::Column::Id.eq(id)),
            Err(_) => query.filter(user::Column::Email.contains(term.to_lowercase())),
        };
    }

    let rows = query
        .order_by_desc(user::Column::CreatedAt)
        .order_by_desc(user::Column::Id)
        .limit(USER_SEARCH_LIMIT)
        .all(db)
        .await?;
    Ok(rows.into_iter().map(UserRow::from).collect())
}

/// `{userId}` or `{userEmail}` as sent by the admin portal.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub user_email: Option<String>,
}

impl UserRef {
    fn id(&self) -> Option<i32> {
        match self.user_id.as_ref()? {
            Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn email(&self) -> Option<String> {
        self.user_email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty())
    }

    fn is_empty(&self) -> bool {
        self.id().is_none() && self.email().is_none()
    }
}

pub async fn resolve_user<C: ConnectionTrait>(db: &C, who: &UserRef) -> AppResult<user::Model> {
    let found = if let Some(id) = who.id() {
        find_by_id(db, id).await?
    } else if let Some(email) = who.email() {
        find_by_email(db, &email).await?
    } else {
        return Err(AppError::bad_request("User ID or email is required"));
    };
    found.ok_or_else(|| AppError::not_found("User not found"))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantMembershipInput {
    #[serde(flatten)]
    pub user: UserRef,
    #[serde(default)]
    pub membership_type: String,
    #[serde(default)]
    pub days: Option<i64>,
}

pub async fn grant_membership<C: ConnectionTrait>(
    db: &C,
    input: GrantMembershipInput,
    now: i64,
) -> AppResult<membership::Model> {
    let kind = MembershipType::parse(&input.membership_type).ok_or_else(|| {
        AppError::bad_request("Invalid membership type. Must be \"premium\" or \"lifetime\"")
    })?;
    let expire_date = match kind {
        MembershipType::Lifetime => None,
        MembershipType::Premium => match input.days {
            Some(days) if days > 0 => Some(
                days.checked_mul(SECS_PER_DAY)
                    .and_then(|secs| now.checked_add(secs))
                    .ok_or_else(|| AppError::bad_request("Days is too large"))?,
            ),
            _ => {
                return Err(AppError::bad_request(
                    "Days must be a positive number for premium membership",
                ))
            }
        },
    };
    if input.user.is_empty() {
        return Err(AppError::bad_request("User ID or email is required"));
    }
    let target = resolve_user(db, &input.user).await?;

    let row = membership::ActiveModel {
        user_id: Set(target.id),
        membership_type: Set(kind.as_str().to_string()),
        start_date: Set(now),
        expire_date: Set(expire_date),
        status: Set(MembershipStatus::Active.as_str().to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    membership::Entity::insert(row)
        .on_conflict(
            OnConflict::column(membership::Column::UserId)
                .update_columns([
                    membership::Column::MembershipType,
                    membership::Column::StartDate,
                    membership::Column::ExpireDate,
                    membership::Column::Status,
                    membership::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    let granted = membership::Entity::find()
        .filter(membership::Column::UserId.eq(target.id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::internal("membership row missing after upsert"))?;

    info!(
        user_id = target.id,
        membership_type = kind.as_str(),
        expire_date,
        "membership granted"
    );
    Ok(granted)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantResourceInput {
    #[serde(flatten)]
    pub user: UserRef,
    #[serde(default)]
    pub resource_id: Option<Value>,
}

impl GrantResourceInput {
    fn resource_id(&self) -> Option<i32> {
        match self.resource_id.as_ref()? {
            Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResourceGrant {
    pub order: order::Model,
    pub user: user::Model,
    pub resource: study_resource::Model,
}

/// Give a user a resource through a zero-total `free` order.
pub async fn grant_resource<C: ConnectionTrait>(
    db: &C,
    input: GrantResourceInput,
    now: i64,
) -> AppResult<ResourceGrant> {
    let resource_id = input
        .resource_id()
        .ok_or_else(|| AppError::bad_request("Resource ID is required"))?;
    if input.user.is_empty() {
        return Err(AppError::bad_request("User ID or email is required"));
    }
    let resource = find_resource(db, resource_id)
        .await?
        .ok_or_else(|| AppError::not_found("Resource not found"))?;
    let target = resolve_user(db, &input.user).await?;

    let order_id = generate_grant_order_id()?;
    let row = order::ActiveModel {
        order_id: Set(order_id.clone()),
        user_id: Set(Some(target.id)),
        user_email: Set(target.email.clone()),
        user_name: Set(target.name.clone().unwrap_or_else(|| target.email.clone())),
        total_cents: Set(0),
        status: Set(OrderStatus::Paid.as_str().to_string()),
        payment_method: Set(PaymentMethod::Free.as_str().to_string()),
        transaction_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    order::Entity::insert(row).exec_without_returning(db).await?;

    let item = order_item::ActiveModel {
        order_id: Set(order_id.clone()),
        study_resource_id: Set(resource.id),
        quantity: Set(1),
        unit_price_cents: Set(resource.price_cents.max(0)),
        total_cents: Set(0),
        ..Default::default()
    };
    order_item::Entity::insert(item).exec_without_returning(db).await?;

    let order = order::Entity::find()
        .filter(order::Column::OrderId.eq(order_id.as_str()))
        .one(db)
        .await?
        .ok_or_else(|| AppError::internal(format!("order {order_id} vanished after insert")))?;
    record_library(db, &order, now).await?;

    info!(order_id = %order_id, user_id = target.id, resource_id, "resource granted");
    Ok(ResourceGrant {
        order,
        user: target,
        resource,
    })
}
