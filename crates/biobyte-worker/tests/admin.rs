mod common;

use pretty_assertions::assert_eq;
use rstest::rstest;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;

use biobyte_worker::services::admin::{
    grant_membership, grant_resource, search_users, GrantMembershipInput, GrantResourceInput, UserRef,
};
use biobyte_worker::services::entitlements::{active_membership, can_access};
use entity::{membership, order, order_item};

use common::{insert_resource, insert_user, setup_db, NOW};

fn by_email(email: &str) -> UserRef {
    UserRef {
        user_id: None,
        user_email: Some(email.to_string()),
    }
}

#[tokio::test]
async fn user_search_by_id_or_email_fragment() {
    let db = setup_db().await;
    let alice = insert_user(&db, "alice@example.com", "admin").await;
    insert_user(&db, "bob@sample.org", "user").await;

    let by_id = search_users(&db, Some(&alice.id.to_string())).await.unwrap();
    assert_eq!(by_id.len(), 1);
    assert_eq!(by_id[0].email, "alice@example.com");
    assert_eq!(by_id[0].role, "admin");

    let fragment = search_users(&db, Some("SAMPLE")).await.unwrap();
    let emails: Vec<&str> = fragment.iter().map(|u| u.email.as_str()).collect();
    assert_eq!(emails, vec!["bob@sample.org"]);

    // Guest row plus the two inserted users.
    assert_eq!(search_users(&db, None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn lifetime_grant_has_no_expiry() {
    let db = setup_db().await;
    let user = insert_user(&db, "life@example.com", "user").await;

    let granted = grant_membership(
        &db,
        GrantMembershipInput {
            user: by_email("life@example.com"),
            membership_type: "lifetime".to_string(),
            days: None,
        },
        NOW,
    )
    .await
    .unwrap();

    assert_eq!(granted.expire_date, None);
    assert_eq!(granted.status, "active");
    assert!(active_membership(&db, user.id, NOW + 10 * 365 * 86_400)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn premium_grant_replaces_the_existing_row() {
    let db = setup_db().await;
    let user = insert_user(&db, "prem@example.com", "user").await;

    for (kind, days) in [("lifetime", None), ("premium", Some(30))] {
        grant_membership(
            &db,
            GrantMembershipInput {
                user: UserRef {
                    user_id: Some(json!(user.id)),
                    user_email: None,
                },
                membership_type: kind.to_string(),
                days,
            },
            NOW,
        )
        .await
        .unwrap();
    }

    let rows = membership::Entity::find()
        .filter(membership::Column::UserId.eq(user.id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].membership_type, "premium");
    assert_eq!(rows[0].expire_date, Some(NOW + 30 * 86_400));
    assert!(active_membership(&db, user.id, NOW + 31 * 86_400).await.unwrap().is_none());
}

#[rstest]
#[case::bad_type("gold", Some(30), Some("x@example.com"), 400)]
#[case::premium_without_days("premium", None, Some("x@example.com"), 400)]
#[case::premium_zero_days("premium", Some(0), Some("x@example.com"), 400)]
#[case::premium_overflowing_days("premium", Some(200_000_000_000_000), Some("x@example.com"), 400)]
#[case::premium_max_days("premium", Some(i64::MAX), Some("x@example.com"), 400)]
#[case::no_user("lifetime", None, None, 400)]
#[case::unknown_user("lifetime", None, Some("ghost@example.com"), 404)]
#[tokio::test]
async fn membership_grant_validation(
    #[case] kind: &str,
    #[case] days: Option<i64>,
    #[case] email: Option<&str>,
    #[case] status: u16,
) {
    let db = setup_db().await;
    insert_user(&db, "x@example.com", "user").await;

    let err = grant_membership(
        &db,
        GrantMembershipInput {
            user: UserRef {
                user_id: None,
                user_email: email.map(str::to_string),
            },
            membership_type: kind.to_string(),
            days,
        },
        NOW,
    )
    .await
    .unwrap_err();
    assert_eq!(err.status(), status);
}

#[tokio::test]
async fn resource_grant_creates_a_free_paid_order() {
    let db = setup_db().await;
    let user = insert_user(&db, "granted@example.com", "user").await;
    let pack = insert_resource(&db, "Pack", "Pack", 1500, None).await;

    assert!(!can_access(&db, Some(user.id), &pack, NOW).await.unwrap());

    let grant = grant_resource(
        &db,
        GrantResourceInput {
            user: by_email("granted@example.com"),
            resource_id: Some(json!(pack.id.to_string())),
        },
        NOW,
    )
    .await
    .unwrap();

    assert!(grant.order.order_id.starts_with("admin_grant_"));
    assert_eq!(grant.order.status, "PAID");
    assert_eq!(grant.order.payment_method, "free");
    assert_eq!(grant.order.total_cents, 0);

    let item = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(grant.order.order_id.as_str()))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.unit_price_cents, 1500);
    assert_eq!(item.total_cents, 0);

    assert!(can_access(&db, Some(user.id), &pack, NOW).await.unwrap());
}

#[tokio::test]
async fn resource_grant_validation() {
    let db = setup_db().await;
    insert_user(&db, "granted@example.com", "user").await;
    let pack = insert_resource(&db, "Pack", "Pack", 1500, None).await;

    let missing_resource = grant_resource(
        &db,
        GrantResourceInput {
            user: by_email("granted@example.com"),
            resource_id: None,
        },
        NOW,
    )
    .await
    .unwrap_err();
    assert_eq!(missing_resource.status(), 400);

    let unknown_resource = grant_resource(
        &db,
        GrantResourceInput {
            user: by_email("granted@example.com"),
            resource_id: Some(json!(9999)),
        },
        NOW,
    )
    .await
    .unwrap_err();
    assert_eq!(unknown_resource.status(), 404);

    let unknown_user = grant_resource(
        &db,
        GrantResourceInput {
            user: by_email("ghost@example.com"),
            resource_id: Some(json!(pack.id)),
        },
        NOW,
    )
    .await
    .unwrap_err();
    assert_eq!(unknown_user.status(), 404);

    assert!(order::Entity::find().all(&db).await.unwrap().is_empty());
}
