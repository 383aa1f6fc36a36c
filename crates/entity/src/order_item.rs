use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order line; the price is a snapshot taken when the order was written.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub order_id: String,

    pub study_resource_id: i32,

    pub quantity: i32,

    pub unit_price_cents: i64,

    pub total_cents: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::OrderId",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::study_resource::Entity",
        from = "Column::StudyResourceId",
        to = "super::study_resource::Column::Id"
    )]
    StudyResource,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::study_resource::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StudyResource.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
