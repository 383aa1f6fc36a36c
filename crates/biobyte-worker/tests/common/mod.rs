#![allow(dead_code)]

use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};

use biobyte_worker::crypto::hash_password_phc_with;
use entity::membership::{MembershipStatus, MembershipType};
use entity::{membership, study_resource, user};
use migration::{Migrator, MigratorTrait};

pub const NOW: i64 = 1_767_225_600;
pub const SECRET: &[u8] = b"test-secret";
pub const PASSWORD: &str = "correct horse";

/// Fresh in-memory database with every migration applied.
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.expect("connect sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    db
}

pub async fn insert_user(db: &DatabaseConnection, email: &str, role: &str) -> user::Model {
    user::ActiveModel {
        email: Set(email.to_string()),
        name: Set(Some("Test User".to_string())),
        password_hash: Set(Some(hash_password_phc_with(PASSWORD, 1_000).expect("hash password"))),
        role: Set(role.to_string()),
        created_at: Set(NOW),
        updated_at: Set(NOW),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert user")
}

pub async fn insert_resource(
    db: &DatabaseConnection,
    title: &str,
    kind: &str,
    price_cents: i64,
    chapter: Option<&str>,
) -> study_resource::Model {
    study_resource::ActiveModel {
        title: Set(title.to_string()),
        description: Set(Some(format!("{title} description"))),
        price_cents: Set(price_cents),
        r#type: Set(kind.to_string()),
        level: Set("AS".to_string()),
        chapter: Set(chapter.map(str::to_string)),
        file_path: Set(Some(format!("files/{}.pdf", title.replace(' ', "_")))),
        image: Set(None),
        created_at: Set(NOW),
        updated_at: Set(NOW),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert resource")
}

pub async fn insert_membership(
    db: &DatabaseConnection,
    user_id: i32,
    kind: MembershipType,
    status: MembershipStatus,
    expire_date: Option<i64>,
) -> membership::Model {
    membership::ActiveModel {
        user_id: Set(user_id),
        membership_type: Set(kind.as_str().to_string()),
        start_date: Set(NOW - 86_400),
        expire_date: Set(expire_date),
        status: Set(status.as_str().to_string()),
        created_at: Set(NOW - 86_400),
        updated_at: Set(NOW - 86_400),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert membership")
}
