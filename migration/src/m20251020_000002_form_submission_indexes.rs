use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Recent-first listing and retention purges both scan by upload time
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_form_submissions_uploaded_at")
                    .table(FormSubmissions::Table)
                    .col(FormSubmissions::UploadedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_form_submissions_status")
                    .table(FormSubmissions::Table)
                    .col(FormSubmissions::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_form_submissions_relay_line")
                    .table(FormSubmissions::Table)
                    .col(FormSubmissions::RelayLocation)
                    .col(FormSubmissions::LineNumber)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [
            "idx_form_submissions_relay_line",
            "idx_form_submissions_status",
            "idx_form_submissions_uploaded_at",
        ] {
            manager
                .drop_index(
                    Index::drop()
                        .name(name)
                        .table(FormSubmissions::Table)
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum FormSubmissions {
    Table,
    UploadedAt,
    Status,
    RelayLocation,
    LineNumber,
}
