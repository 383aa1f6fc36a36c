use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Email of the placeholder row that guest checkouts are attributed to.
pub const GUEST_EMAIL: &str = "guest@example.com";

/// Storefront account.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub email: String,

    pub name: Option<String>,

    /// `pbkdf2_sha256$<iterations>$<salt hex>$<hash hex>`.
    ///
    /// `None` for the guest row, which can never log in.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    /// `user` or `admin`. Rows written by older deployments may say `member`.
    pub role: String,

    #[serde(skip_serializing)]
    pub reset_token: Option<String>,

    /// Unix timestamp (seconds).
    #[serde(skip_serializing)]
    pub reset_expires: Option<i64>,

    /// Unix timestamp (seconds).
    pub created_at: i64,

    /// Unix timestamp (seconds).
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn role(&self) -> Role {
        Role::parse(&self.role)
    }

    pub fn is_guest(&self) -> bool {
        self.email == GUEST_EMAIL
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "member")]
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Anything that is not `admin` is a regular user.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::User
        }
    }
}
