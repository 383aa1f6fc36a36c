use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StudyResources::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StudyResources::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StudyResources::Title).string().not_null())
                    .col(ColumnDef::new(StudyResources::Description).text())
                    .col(
                        ColumnDef::new(StudyResources::PriceCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(StudyResources::Type).string().not_null())
                    .col(
                        ColumnDef::new(StudyResources::Level)
                            .string()
                            .not_null()
                            .default("Both"),
                    )
                    .col(ColumnDef::new(StudyResources::Chapter).string())
                    .col(ColumnDef::new(StudyResources::FilePath).string())
                    .col(ColumnDef::new(StudyResources::Image).string())
                    .col(ColumnDef::new(StudyResources::CreatedAt).big_integer().not_null())
                    .col(ColumnDef::new(StudyResources::UpdatedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_study_resources_type_level")
                    .table(StudyResources::Table)
                    .col(StudyResources::Type)
                    .col(StudyResources::Level)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_study_resources_title")
                    .table(StudyResources::Table)
                    .col(StudyResources::Title)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let _ = manager
            .drop_index(Index::drop().name("idx_study_resources_title").to_owned())
            .await;
        let _ = manager
            .drop_index(
                Index::drop()
                    .name("idx_study_resources_type_level")
                    .to_owned(),
            )
            .await;

        manager
            .drop_table(Table::drop().table(StudyResources::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum StudyResources {
    Table,
    Id,
    Title,
    Description,
    PriceCents,
    Type,
    Level,
    Chapter,
    FilePath,
    Image,
    CreatedAt,
    UpdatedAt,
}
