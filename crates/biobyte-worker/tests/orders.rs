mod common;

use pretty_assertions::assert_eq;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;

use biobyte_worker::jwt::Claims;
use biobyte_worker::paypal::{webhook_action, Capture};
use biobyte_worker::services::orders::{
    apply_capture, apply_webhook, checkout, list_orders, mark_order_paid, order_summaries, CartItem,
    CheckoutInput,
};
use entity::order::PaymentMethod;
use entity::{order, order_item, user_study_resource};

use common::{insert_resource, insert_user, setup_db, NOW};

fn cart(ids: &[i32]) -> Vec<CartItem> {
    ids.iter().map(|&id| CartItem { id }).collect()
}

async fn find_order(db: &sea_orm::DatabaseConnection, order_id: &str) -> Option<order::Model> {
    order::Entity::find()
        .filter(order::Column::OrderId.eq(order_id))
        .one(db)
        .await
        .unwrap()
}

#[tokio::test]
async fn guest_simulated_checkout_snapshots_prices() {
    let db = setup_db().await;
    let a = insert_resource(&db, "Pack A", "Pack", 1000, None).await;
    let b = insert_resource(&db, "Pack B", "Pack", 250, Some("4")).await;

    let outcome = checkout(
        &db,
        CheckoutInput {
            name: "Guest Buyer".to_string(),
            email: "Guest.Buyer@Example.com".to_string(),
            cart: cart(&[a.id, b.id]),
            total_price: Some(json!(0.01)),
            ..Default::default()
        },
        None,
        true,
        NOW,
    )
    .await
    .unwrap();

    let order = outcome.order;
    assert!(order.order_id.starts_with("order_"));
    assert_eq!(order.user_id, Some(1));
    assert_eq!(order.user_email, "guest.buyer@example.com");
    assert_eq!(order.total_cents, 1250);
    assert!(order.is_paid());
    assert_eq!(order.payment_method, PaymentMethod::Simulated.as_str());

    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order.order_id.as_str()))
        .all(&db)
        .await
        .unwrap();
    let mut prices: Vec<i64> = items.iter().map(|i| i.unit_price_cents).collect();
    prices.sort();
    assert_eq!(prices, vec![250, 1000]);

    let chapters: Vec<&str> = outcome.lines.iter().map(|l| l.chapter.as_str()).collect();
    assert_eq!(chapters, vec!["All", "4"]);
}

#[tokio::test]
async fn checkout_validation() {
    let db = setup_db().await;
    let paid = insert_resource(&db, "Pack", "Pack", 1000, None).await;
    let gated = insert_resource(&db, "Gated", "Mindmap", -100, None).await;

    let base = || CheckoutInput {
        name: "Buyer".to_string(),
        email: "buyer@example.com".to_string(),
        cart: cart(&[paid.id]),
        ..Default::default()
    };

    let empty = checkout(&db, CheckoutInput { cart: vec![], ..base() }, None, true, NOW).await;
    assert_eq!(empty.unwrap_err().to_string(), "Cart is empty");

    let no_name = checkout(&db, CheckoutInput { name: " ".to_string(), ..base() }, None, true, NOW).await;
    assert_eq!(no_name.unwrap_err().status(), 400);

    let no_email = checkout(&db, CheckoutInput { email: String::new(), ..base() }, None, true, NOW).await;
    assert_eq!(no_email.unwrap_err().status(), 400);

    let unknown = checkout(&db, CheckoutInput { cart: cart(&[9999]), ..base() }, None, true, NOW).await;
    assert_eq!(unknown.unwrap_err().status(), 404);

    let membership = checkout(&db, CheckoutInput { cart: cart(&[gated.id]), ..base() }, None, true, NOW).await;
    assert_eq!(membership.unwrap_err().status(), 400);

    let declined = checkout(&db, base(), None, false, NOW).await.unwrap_err();
    assert_eq!(declined.status(), 402);
    assert_eq!(declined.to_string(), "Payment failed. Please try again.");

    assert_eq!(order::Entity::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn paypal_checkout_for_a_logged_in_buyer_is_idempotent() {
    let db = setup_db().await;
    let buyer = insert_user(&db, "buyer@example.com", "user").await;
    let pack = insert_resource(&db, "Pack", "Pack", 1000, None).await;
    let claims = Claims::for_user(&buyer, NOW, 3600);

    let input = || CheckoutInput {
        name: "Buyer".to_string(),
        email: "ignored@example.com".to_string(),
        cart: cart(&[pack.id]),
        transaction_id: Some("CAPTURE-1".to_string()),
        order_id: Some("order_fixed".to_string()),
        ..Default::default()
    };

    let first = checkout(&db, input(), Some(&claims), false, NOW).await.unwrap();
    let second = checkout(&db, input(), Some(&claims), false, NOW + 5).await.unwrap();

    assert_eq!(first.order.order_id, "order_fixed");
    assert_eq!(second.order.id, first.order.id);
    assert_eq!(second.order.user_email, "buyer@example.com");
    assert_eq!(second.order.user_id, Some(buyer.id));
    assert_eq!(second.order.payment_method, "paypal");
    assert_eq!(second.order.transaction_id.as_deref(), Some("CAPTURE-1"));

    let item_count = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq("order_fixed"))
        .count(&db)
        .await
        .unwrap();
    assert_eq!(item_count, 1);

    let library = user_study_resource::Entity::find_by_id((buyer.id, pack.id))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(library.order_id.as_deref(), Some("order_fixed"));
    assert_eq!(library.status, "PAID");
}

#[tokio::test]
async fn order_id_of_another_buyer_is_rejected() {
    let db = setup_db().await;
    let alice = insert_user(&db, "alice@example.com", "user").await;
    let bob = insert_user(&db, "bob@example.com", "user").await;
    let pack_a = insert_resource(&db, "Pack A", "Pack", 1000, None).await;
    let pack_b = insert_resource(&db, "Pack B", "Pack", 500, None).await;

    checkout(
        &db,
        CheckoutInput {
            name: "Alice".to_string(),
            cart: cart(&[pack_a.id]),
            transaction_id: Some("PAYPAL-TX-A".to_string()),
            order_id: Some("order_shared".to_string()),
            ..Default::default()
        },
        Some(&Claims::for_user(&alice, NOW, 3600)),
        false,
        NOW,
    )
    .await
    .unwrap();

    let reused = checkout(
        &db,
        CheckoutInput {
            name: "Bob".to_string(),
            cart: cart(&[pack_b.id]),
            order_id: Some("order_shared".to_string()),
            ..Default::default()
        },
        Some(&Claims::for_user(&bob, NOW, 3600)),
        true,
        NOW + 10,
    )
    .await
    .unwrap_err();
    assert_eq!(reused.status(), 400);
    assert_eq!(reused.to_string(), "Order ID is already in use");

    let order = find_order(&db, "order_shared").await.unwrap();
    assert_eq!(order.user_id, Some(alice.id));
    assert_eq!(order.payment_method, "paypal");
    assert_eq!(order.transaction_id.as_deref(), Some("PAYPAL-TX-A"));

    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq("order_shared"))
        .all(&db)
        .await
        .unwrap();
    let resource_ids: Vec<i32> = items.iter().map(|i| i.study_resource_id).collect();
    assert_eq!(resource_ids, vec![pack_a.id]);
}

#[tokio::test]
async fn replay_with_a_different_cart_is_rejected() {
    let db = setup_db().await;
    let buyer = insert_user(&db, "buyer@example.com", "user").await;
    let pack_a = insert_resource(&db, "Pack A", "Pack", 1000, None).await;
    let pack_b = insert_resource(&db, "Pack B", "Pack", 500, None).await;
    let claims = Claims::for_user(&buyer, NOW, 3600);

    let input = |ids: &[i32]| CheckoutInput {
        name: "Buyer".to_string(),
        cart: cart(ids),
        order_id: Some("order_cart".to_string()),
        ..Default::default()
    };

    checkout(&db, input(&[pack_a.id]), Some(&claims), true, NOW).await.unwrap();
    let swapped = checkout(&db, input(&[pack_b.id]), Some(&claims), true, NOW + 1)
        .await
        .unwrap_err();
    assert_eq!(swapped.status(), 400);

    let same = checkout(&db, input(&[pack_a.id]), Some(&claims), true, NOW + 2).await.unwrap();
    assert_eq!(same.order.order_id, "order_cart");
    assert_eq!(same.lines.len(), 1);
    assert_eq!(same.lines[0].title, "Pack A");
}

#[tokio::test]
async fn replaying_a_paid_order_keeps_its_payment_details() {
    let db = setup_db().await;
    let buyer = insert_user(&db, "buyer@example.com", "user").await;
    let pack = insert_resource(&db, "Pack", "Pack", 1000, None).await;
    let claims = Claims::for_user(&buyer, NOW, 3600);

    let input = |tx: Option<&str>| CheckoutInput {
        name: "Buyer".to_string(),
        cart: cart(&[pack.id]),
        transaction_id: tx.map(str::to_string),
        order_id: Some("order_keep".to_string()),
        ..Default::default()
    };

    checkout(&db, input(Some("CAPTURE-9")), Some(&claims), false, NOW).await.unwrap();
    let replay = checkout(&db, input(None), Some(&claims), true, NOW + 30).await.unwrap();

    assert_eq!(replay.order.payment_method, "paypal");
    assert_eq!(replay.order.transaction_id.as_deref(), Some("CAPTURE-9"));
    assert_eq!(replay.order.updated_at, NOW);
}

async fn pending_order(db: &sea_orm::DatabaseConnection, order_id: &str) {
    use sea_orm::{ActiveModelTrait, Set};
    order::ActiveModel {
        order_id: Set(order_id.to_string()),
        user_id: Set(Some(1)),
        user_email: Set("guest@example.com".to_string()),
        user_name: Set("Guest".to_string()),
        total_cents: Set(1000),
        status: Set("PENDING".to_string()),
        payment_method: Set("paypal".to_string()),
        transaction_id: Set(None),
        created_at: Set(NOW),
        updated_at: Set(NOW),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();
}

#[tokio::test]
async fn incomplete_capture_leaves_the_order_alone() {
    let db = setup_db().await;
    pending_order(&db, "order_pending").await;

    let capture = Capture::from_response(&json!({
        "id": "PP-ORDER",
        "status": "PAYER_ACTION_REQUIRED",
        "purchase_units": [{ "custom_id": "order_pending" }],
    }));
    let err = apply_capture(&db, &capture, None, NOW).await.unwrap_err();
    assert_eq!(err.status(), 400);

    let order = find_order(&db, "order_pending").await.unwrap();
    assert_eq!(order.status, "PENDING");
    assert_eq!(order.transaction_id, None);
}

#[tokio::test]
async fn completed_capture_marks_the_order_paid() {
    let db = setup_db().await;
    pending_order(&db, "order_pending").await;

    let capture = Capture::from_response(&json!({
        "id": "PP-ORDER",
        "status": "COMPLETED",
        "purchase_units": [{
            "reference_id": "default",
            "payments": { "captures": [{ "id": "CAP-9", "custom_id": "order_pending" }] },
        }],
    }));
    let result = apply_capture(&db, &capture, Some("order_other"), NOW).await.unwrap();
    assert_eq!(result.order_id.as_deref(), Some("order_pending"));
    assert_eq!(result.transaction_id, "CAP-9");
    assert!(result.db_updated);

    let order = find_order(&db, "order_pending").await.unwrap();
    assert!(order.is_paid());
    assert_eq!(order.transaction_id.as_deref(), Some("CAP-9"));
}

#[tokio::test]
async fn capture_without_any_order_id_asks_for_one() {
    let db = setup_db().await;
    let capture = Capture::from_response(&json!({ "id": "PP-ORDER", "status": "COMPLETED" }));
    let result = apply_capture(&db, &capture, None, NOW).await.unwrap();
    assert!(result.requires_order_id);
    assert!(!result.db_updated);
    assert_eq!(result.transaction_id, "PP-ORDER");
}

#[tokio::test]
async fn webhook_and_repeat_marking_are_idempotent() {
    let db = setup_db().await;
    pending_order(&db, "order_hook").await;

    let event = json!({
        "event_type": "PAYMENT.CAPTURE.COMPLETED",
        "resource": { "id": "CAP-77", "custom_id": "order_hook" },
    });
    assert!(apply_webhook(&db, &webhook_action(&event), NOW).await);
    assert!(apply_webhook(&db, &webhook_action(&event), NOW + 1).await);

    let order = find_order(&db, "order_hook").await.unwrap();
    assert!(order.is_paid());
    assert_eq!(order.transaction_id.as_deref(), Some("CAP-77"));

    let ignored = json!({ "event_type": "CHECKOUT.ORDER.APPROVED", "resource": {} });
    assert!(!apply_webhook(&db, &webhook_action(&ignored), NOW).await);

    let missing = mark_order_paid(&db, "order_nope", Some("X"), None, NOW).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn order_history_is_newest_first_with_items() {
    let db = setup_db().await;
    let buyer = insert_user(&db, "history@example.com", "user").await;
    let a = insert_resource(&db, "First Pack", "Pack", 100, None).await;
    let b = insert_resource(&db, "Second Pack", "Pack", 200, Some("7")).await;
    let claims = Claims::for_user(&buyer, NOW, 3600);

    for (i, id) in [a.id, b.id].into_iter().enumerate() {
        checkout(
            &db,
            CheckoutInput {
                name: "History".to_string(),
                cart: cart(&[id]),
                order_id: Some(format!("order_{i}")),
                ..Default::default()
            },
            Some(&claims),
            true,
            NOW + i as i64 * 100,
        )
        .await
        .unwrap();
    }

    let history = list_orders(&db, buyer.id).await.unwrap();
    let ids: Vec<&str> = history.iter().map(|o| o.order_id.as_str()).collect();
    assert_eq!(ids, vec!["order_1", "order_0"]);
    assert_eq!(history[0].items.len(), 1);
    assert_eq!(history[0].items[0].title.as_deref(), Some("Second Pack"));
    assert_eq!(history[0].items[0].chapter.as_deref(), Some("7"));
    assert_eq!(history[0].total_price, 2.0);

    let summaries = order_summaries(&db, buyer.id).await.unwrap();
    assert_eq!(summaries[1].products, vec!["First Pack".to_string()]);
    assert_eq!(summaries[0].date.len(), 10);

    assert!(list_orders(&db, 9999).await.unwrap().is_empty());
}
