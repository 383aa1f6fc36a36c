use std::collections::HashMap;

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use entity::order::{OrderStatus, PaymentMethod};
use entity::user::GUEST_EMAIL;
use entity::{order, order_item, study_resource};

use crate::access::AccessTier;
use crate::chat::OrderSummary;
use crate::error::{AppError, AppResult};
use crate::jwt::Claims;
use crate::mail::OrderLine;
use crate::paypal::{Capture, WebhookAction};
use crate::services::accounts::{find_by_email, find_by_id};
use crate::services::entitlements::record_library;
use crate::util::{cents_to_f64, generate_order_id, normalize_email, parse_cents, ts_to_rfc3339};

pub const ORDER_HISTORY_LIMIT: u64 = 50;

/// Parse a client amount (JSON number or numeric string) into positive cents.
pub fn parse_amount_cents(raw: Option<&Value>) -> AppResult<i64> {
    let cents = match raw {
        Some(Value::Number(n)) => parse_cents(&n.to_string()),
        Some(Value::String(s)) => parse_cents(s),
        _ => None,
    };
    cents
        .filter(|c| *c > 0)
        .ok_or_else(|| AppError::bad_request("Invalid amount"))
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    pub id: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub cart: Vec<CartItem>,
    /// Client-side total; informational only, the server total is recomputed.
    #[serde(default, rename = "totalPrice")]
    pub total_price: Option<Value>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order: order::Model,
    pub lines: Vec<OrderLine>,
}

struct PricedItem {
    resource: study_resource::Model,
    unit_price_cents: i64,
}

/// Load every cart resource and snapshot its catalog price.
async fn price_cart<C: ConnectionTrait>(db: &C, cart: &[CartItem]) -> AppResult<Vec<PricedItem>> {
    let ids: Vec<i32> = cart.iter().map(|c| c.id).collect();
    let found: HashMap<i32, study_resource::Model> = study_resource::Entity::find()
        .filter(study_resource::Column::Id.is_in(ids.iter().copied()))
        .all(db)
        .await?
        .into_iter()
        .map(|r| (r.id, r))
        .collect();

    cart.iter()
        .map(|item| {
            let resource = found
                .get(&item.id)
                .cloned()
                .ok_or_else(|| AppError::not_found(format!("Resource {} not found", item.id)))?;
            match AccessTier::of(&resource) {
                AccessTier::Free | AccessTier::Paid => Ok(PricedItem {
                    unit_price_cents: resource.price_cents,
                    resource,
                }),
                AccessTier::Membership | AccessTier::Unavailable => Err(AppError::bad_request(
                    format!("Resource {} is not available for purchase", item.id),
                )),
            }
        })
        .collect()
}

async fn guest_user_id<C: ConnectionTrait>(db: &C) -> AppResult<i32> {
    find_by_email(db, GUEST_EMAIL)
        .await?
        .map(|u| u.id)
        .ok_or_else(|| AppError::internal("guest user row is missing; run migrations"))
}

async fn find_order<C: ConnectionTrait>(db: &C, order_id: &str) -> AppResult<Option<order::Model>> {
    Ok(order::Entity::find()
        .filter(order::Column::OrderId.eq(order_id))
        .one(db)
        .await?)
}

/// Resource ids already recorded for an order, sorted.
async fn load_item_resource_ids<C: ConnectionTrait>(db: &C, order_id: &str) -> AppResult<Vec<i32>> {
    let mut ids: Vec<i32> = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(db)
        .await?
        .into_iter()
        .map(|item| item.study_resource_id)
        .collect();
    ids.sort_unstable();
    Ok(ids)
}

/// An existing order id may only be reused by the same buyer for the same cart.
fn ensure_replay_of(
    existing: &order::Model,
    user_id: i32,
    user_email: &str,
    existing_items: &[i32],
    priced: &[PricedItem],
) -> AppResult<()> {
    let mut cart_ids: Vec<i32> = priced.iter().map(|p| p.resource.id).collect();
    cart_ids.sort_unstable();
    let same_buyer = existing.user_id == Some(user_id) && existing.user_email == user_email;
    let same_items = existing_items.is_empty() || existing_items == cart_ids.as_slice();
    if same_buyer && same_items {
        return Ok(());
    }
    warn!(order_id = %existing.order_id, user_id, "order id reused by a different checkout");
    Err(AppError::bad_request("Order ID is already in use"))
}

/// Persist a checkout. `simulated_approved` is the processor's answer when no
/// PayPal transaction id came with the request.
pub async fn checkout<C: ConnectionTrait>(
    db: &C,
    input: CheckoutInput,
    buyer: Option<&Claims>,
    simulated_approved: bool,
    now: i64,
) -> AppResult<CheckoutOutcome> {
    if input.cart.is_empty() {
        return Err(AppError::bad_request("Cart is empty"));
    }
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::bad_request("Missing required fields"));
    }

    let (user_id, user_email) = match buyer {
        Some(claims) => {
            let user = find_by_id(db, claims.id)
                .await?
                .ok_or_else(|| AppError::not_found("User not found in database"))?;
            (user.id, user.email)
        }
        None => {
            let email = normalize_email(&input.email);
            if email.is_empty() {
                return Err(AppError::bad_request("Email is required"));
            }
            (guest_user_id(db).await?, email)
        }
    };

    let priced = price_cart(db, &input.cart).await?;
    let total_cents: i64 = priced.iter().map(|p| p.unit_price_cents).sum();

    let transaction_id = input
        .transaction_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let method = match (&transaction_id, total_cents) {
        (Some(_), _) => PaymentMethod::Paypal,
        (None, 0) => PaymentMethod::Free,
        (None, _) if simulated_approved => PaymentMethod::Simulated,
        (None, _) => {
            warn!(user_id, "simulated payment declined");
            return Err(AppError::PaymentRequired(
                "Payment failed. Please try again.".to_string(),
            ));
        }
    };

    let order_id = match input
        .order_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        Some(id) => id.to_string(),
        None => generate_order_id()?,
    };

    let row = order::ActiveModel {
        order_id: Set(order_id.clone()),
        user_id: Set(Some(user_id)),
        user_email: Set(user_email.clone()),
        user_name: Set(name.clone()),
        total_cents: Set(total_cents),
        status: Set(OrderStatus::Paid.as_str().to_string()),
        payment_method: Set(method.as_str().to_string()),
        transaction_id: Set(transaction_id.clone()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let inserted = order::Entity::insert(row)
        .on_conflict(
            OnConflict::column(order::Column::OrderId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    let existing_items = load_item_resource_ids(db, &order_id).await?;
    if inserted == 0 {
        let existing = find_order(db, &order_id)
            .await?
            .ok_or_else(|| AppError::internal(format!("order {order_id} vanished after insert")))?;
        ensure_replay_of(&existing, user_id, &user_email, &existing_items, &priced)?;
        if !existing.is_paid() {
            mark_order_paid(db, &order_id, transaction_id.as_deref(), Some(method), now).await?;
        }
    }

    if existing_items.is_empty() {
        let items = priced.iter().map(|p| order_item::ActiveModel {
            order_id: Set(order_id.clone()),
            study_resource_id: Set(p.resource.id),
            quantity: Set(1),
            unit_price_cents: Set(p.unit_price_cents),
            total_cents: Set(p.unit_price_cents),
            ..Default::default()
        });
        order_item::Entity::insert_many(items)
            .exec_without_returning(db)
            .await?;
    }

    let order = find_order(db, &order_id)
        .await?
        .ok_or_else(|| AppError::internal(format!("order {order_id} vanished after insert")))?;
    record_library(db, &order, now).await?;

    info!(order_id = %order_id, user_id, total_cents, method = method.as_str(), "checkout recorded");

    let lines = priced
        .into_iter()
        .map(|p| OrderLine {
            chapter: p.resource.chapter_or_all().to_string(),
            title: p.resource.title,
            price_cents: p.unit_price_cents,
            file_path: p.resource.file_path,
        })
        .collect();
    Ok(CheckoutOutcome { order, lines })
}

/// Mark an existing order `PAID`. Returns `None` when no such order exists.
///
/// Safe to repeat: a second call rewrites the same values.
pub async fn mark_order_paid<C: ConnectionTrait>(
    db: &C,
    order_id: &str,
    transaction_id: Option<&str>,
    method: Option<PaymentMethod>,
    now: i64,
) -> AppResult<Option<order::Model>> {
    let Some(existing) = order::Entity::find()
        .filter(order::Column::OrderId.eq(order_id))
        .one(db)
        .await?
    else {
        warn!(order_id, "no local order to mark paid");
        return Ok(None);
    };

    let mut active = existing.into_active_model();
    active.status = Set(OrderStatus::Paid.as_str().to_string());
    if let Some(tx) = transaction_id.filter(|t| !t.is_empty()) {
        active.transaction_id = Set(Some(tx.to_string()));
    }
    if let Some(method) = method {
        active.payment_method = Set(method.as_str().to_string());
    }
    active.updated_at = Set(now);
    let updated = active.update(db).await?;

    record_library(db, &updated, now).await?;
    info!(order_id, transaction_id, "order marked paid");
    Ok(Some(updated))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub transaction_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub requires_order_id: bool,
    pub db_updated: bool,
}

/// Apply a PayPal capture response locally.
///
/// Anything but `COMPLETED` is a 400 and leaves the database untouched.
pub async fn apply_capture<C: ConnectionTrait>(
    db: &C,
    capture: &Capture,
    request_order_id: Option<&str>,
    now: i64,
) -> AppResult<CaptureResult> {
    if !capture.is_completed() {
        warn!(status = capture.status.as_str(), "capture not completed");
        return Err(AppError::bad_request(format!(
            "Payment not completed, status: {}",
            capture.status
        )));
    }

    let Some(order_id) = capture.local_order_id(request_order_id) else {
        warn!(transaction_id = capture.transaction_id.as_str(), "capture without local order id");
        return Ok(CaptureResult {
            success: true,
            order_id: None,
            transaction_id: capture.transaction_id.clone(),
            status: capture.status.clone(),
            requires_order_id: true,
            db_updated: false,
        });
    };

    let db_updated = match mark_order_paid(
        db,
        &order_id,
        Some(&capture.transaction_id),
        Some(PaymentMethod::Paypal),
        now,
    )
    .await
    {
        Ok(updated) => updated.is_some(),
        Err(e) => {
            warn!(order_id = %order_id, "capture succeeded but local update failed: {e}");
            false
        }
    };

    Ok(CaptureResult {
        success: true,
        order_id: Some(order_id),
        transaction_id: capture.transaction_id.clone(),
        status: capture.status.clone(),
        requires_order_id: false,
        db_updated,
    })
}

/// Apply a verified webhook event. Errors are logged, never surfaced.
pub async fn apply_webhook<C: ConnectionTrait>(db: &C, action: &WebhookAction, now: i64) -> bool {
    match action {
        WebhookAction::Ignore(reason) => {
            info!(reason = reason.as_str(), "webhook ignored");
            false
        }
        WebhookAction::MarkPaid {
            order_id,
            transaction_id,
        } => match mark_order_paid(db, order_id, Some(transaction_id), Some(PaymentMethod::Paypal), now).await {
            Ok(updated) => updated.is_some(),
            Err(e) => {
                warn!(order_id = order_id.as_str(), "webhook update failed: {e}");
                false
            }
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItemView {
    pub id: i32,
    pub study_resource_id: i32,
    pub quantity: i32,
    pub unit_price: f64,
    pub total_price: f64,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub level: Option<String>,
    pub chapter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    pub id: i32,
    pub order_id: String,
    pub user_id: Option<i32>,
    pub user_email: String,
    pub user_name: String,
    pub total_price: f64,
    pub status: String,
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub items: Vec<OrderItemView>,
}

/// The user's orders, newest first, each with its items.
pub async fn list_orders<C: ConnectionTrait>(db: &C, user_id: i32) -> AppResult<Vec<OrderView>> {
    let orders = order::Entity::find()
        .filter(order::Column::UserId.eq(user_id))
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .limit(ORDER_HISTORY_LIMIT)
        .all(db)
        .await?;
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = orders.iter().map(|o| o.order_id.clone()).collect();
    let rows = order_item::Entity::find()
        .filter(order_item::Column::OrderId.is_in(ids))
        .order_by_asc(order_item::Column::Id)
        .find_also_related(study_resource::Entity)
        .all(db)
        .await?;

    let mut by_order: HashMap<String, Vec<OrderItemView>> = HashMap::new();
    for (item, resource) in rows {
        by_order
            .entry(item.order_id.clone())
            .or_default()
            .push(OrderItemView {
                id: item.id,
                study_resource_id: item.study_resource_id,
                quantity: item.quantity,
                unit_price: cents_to_f64(item.unit_price_cents),
                total_price: cents_to_f64(item.total_cents),
                title: resource.as_ref().map(|r| r.title.clone()),
                kind: resource.as_ref().map(|r| r.r#type.clone()),
                level: resource.as_ref().map(|r| r.level.clone()),
                chapter: resource.as_ref().map(|r| r.chapter_or_all().to_string()),
            });
    }

    Ok(orders
        .into_iter()
        .map(|o| OrderView {
            items: by_order.remove(&o.order_id).unwrap_or_default(),
            id: o.id,
            order_id: o.order_id,
            user_id: o.user_id,
            user_email: o.user_email,
            user_name: o.user_name,
            total_price: cents_to_f64(o.total_cents),
            status: o.status,
            payment_method: o.payment_method,
            transaction_id: o.transaction_id,
            created_at: ts_to_rfc3339(o.created_at),
            updated_at: ts_to_rfc3339(o.updated_at),
        })
        .collect())
}

/// Order history in the shape the chat assistant is given.
pub async fn order_summaries<C: ConnectionTrait>(db: &C, user_id: i32) -> AppResult<Vec<OrderSummary>> {
    Ok(list_orders(db, user_id)
        .await?
        .into_iter()
        .map(|o| OrderSummary {
            date: o.created_at.get(..10).unwrap_or(&o.created_at).to_string(),
            products: o.items.into_iter().filter_map(|i| i.title).collect(),
            order_id: o.order_id,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn amount_parsing() {
        assert_eq!(parse_amount_cents(Some(&json!(12.5))).unwrap(), 1250);
        assert_eq!(parse_amount_cents(Some(&json!("9.99"))).unwrap(), 999);
        assert!(parse_amount_cents(Some(&json!(0))).is_err());
        assert!(parse_amount_cents(Some(&json!("-3"))).is_err());
        assert!(parse_amount_cents(Some(&json!("abc"))).is_err());
        assert!(parse_amount_cents(None).is_err());
    }
}
