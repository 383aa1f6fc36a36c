use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// `price_cents` value that marks a membership-gated resource (`-1.00`).
pub const MEMBERSHIP_PRICE_CENTS: i64 = -100;

/// Catalog entry: a mindmap chapter, a syllabus analysis, a downloadable pack.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "study_resources")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,

    pub description: Option<String>,

    /// `0` free, `-100` membership-gated, positive values are paid.
    pub price_cents: i64,

    /// `Mindmap`, `Syllabus Analysis`, ...
    pub r#type: String,

    /// `AS`, `A2` or `Both`.
    pub level: String,

    /// `All` or a chapter number.
    pub chapter: Option<String>,

    /// Asset path of the deliverable attached to order emails.
    pub file_path: Option<String>,

    pub image: Option<String>,

    /// Unix timestamp (seconds).
    pub created_at: i64,

    /// Unix timestamp (seconds).
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_membership_gated(&self) -> bool {
        self.price_cents == MEMBERSHIP_PRICE_CENTS
    }

    /// Chapter label, treating a missing chapter as `All`.
    pub fn chapter_or_all(&self) -> &str {
        self.chapter.as_deref().unwrap_or("All")
    }
}
