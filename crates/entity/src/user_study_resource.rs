use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-user library entry, refreshed whenever an order for the resource is paid.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_study_resources")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i32,

    #[sea_orm(primary_key, auto_increment = false)]
    pub study_resource_id: i32,

    /// Unix timestamp (seconds).
    pub purchase_date: i64,

    pub order_id: Option<String>,

    /// `PENDING` or `PAID`.
    pub status: String,

    pub transaction_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
