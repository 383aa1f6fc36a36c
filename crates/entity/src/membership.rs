use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One membership row per user; grants replace the previous row in place.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "membership")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub user_id: i32,

    /// `premium` or `lifetime`.
    pub membership_type: String,

    /// Unix timestamp (seconds).
    pub start_date: i64,

    /// Unix timestamp (seconds); `None` never expires.
    pub expire_date: Option<i64>,

    /// `active`, `expired` or `cancelled`.
    pub status: String,

    /// Unix timestamp (seconds).
    pub created_at: i64,

    /// Unix timestamp (seconds).
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Active and not past its expiry at `now`.
    pub fn is_effective_at(&self, now: i64) -> bool {
        self.status == MembershipStatus::Active.as_str()
            && self.expire_date.map_or(true, |exp| exp > now)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipType {
    Premium,
    Lifetime,
}

impl MembershipType {
    pub fn as_str(self) -> &'static str {
        match self {
            MembershipType::Premium => "premium",
            MembershipType::Lifetime => "lifetime",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "premium" => Some(MembershipType::Premium),
            "lifetime" => Some(MembershipType::Lifetime),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    Expired,
    Cancelled,
}

impl MembershipStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MembershipStatus::Active => "active",
            MembershipStatus::Expired => "expired",
            MembershipStatus::Cancelled => "cancelled",
        }
    }
}
