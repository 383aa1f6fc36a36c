pub use sea_orm_migration::prelude::*;

mod m20260301_000001_users;
mod m20260301_000002_study_resources;
mod m20260301_000003_orders;
mod m20260301_000004_membership;
mod m20260301_000005_verification_and_rate_limits;

pub struct Migrator;

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_users::Migration),
            Box::new(m20260301_000002_study_resources::Migration),
            Box::new(m20260301_000003_orders::Migration),
            Box::new(m20260301_000004_membership::Migration),
            Box::new(m20260301_000005_verification_and_rate_limits::Migration),
        ]
    }
}
