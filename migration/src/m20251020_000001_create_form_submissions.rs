use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FormSubmissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FormSubmissions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FormSubmissions::RelayLocation).string_len(255))
                    .col(ColumnDef::new(FormSubmissions::LineNumber).string_len(255))
                    .col(ColumnDef::new(FormSubmissions::RemoteLocation).string_len(255))
                    .col(ColumnDef::new(FormSubmissions::NominalSystemVoltage).string())
                    .col(ColumnDef::new(FormSubmissions::BreakerRating).string())
                    .col(ColumnDef::new(FormSubmissions::ConductorRating).string())
                    .col(ColumnDef::new(FormSubmissions::FormDataJson).text())
                    .col(ColumnDef::new(FormSubmissions::CsvFileName).string())
                    .col(
                        ColumnDef::new(FormSubmissions::UploadedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(FormSubmissions::GeneratedFileName).string())
                    .col(
                        ColumnDef::new(FormSubmissions::Status)
                            .string_len(50)
                            .not_null()
                            .default("processing"),
                    )
                    .col(ColumnDef::new(FormSubmissions::ErrorMessage).text())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FormSubmissions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum FormSubmissions {
    Table,
    Id,
    RelayLocation,
    LineNumber,
    RemoteLocation,
    NominalSystemVoltage,
    BreakerRating,
    ConductorRating,
    FormDataJson,
    CsvFileName,
    UploadedAt,
    GeneratedFileName,
    Status,
    ErrorMessage,
}
