use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Email verification codes for the registration flow, one live code per address.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "verification_codes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub email: String,

    /// Six decimal digits.
    pub code: String,

    /// Unix timestamp (seconds).
    pub expires_at: i64,

    /// Unix timestamp (seconds). Drives the resend cooldown.
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
