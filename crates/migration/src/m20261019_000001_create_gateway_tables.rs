//! Creates the identity store consumed by the auth handshake:
//! - gateway_user: one row per person
//! - gateway_identity: external accounts, unique per (provider, subject)
//! - gateway_api_key: hashed long-lived API keys, many per user

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GatewayUser::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GatewayUser::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(GatewayUser::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GatewayUser::LastLoginAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GatewayIdentity::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GatewayIdentity::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GatewayIdentity::UserId).string().not_null())
                    .col(ColumnDef::new(GatewayIdentity::Provider).string().not_null())
                    .col(ColumnDef::new(GatewayIdentity::Subject).string().not_null())
                    .col(ColumnDef::new(GatewayIdentity::Login).string().not_null())
                    .col(ColumnDef::new(GatewayIdentity::DisplayName).string().null())
                    .col(ColumnDef::new(GatewayIdentity::AvatarUrl).text().null())
                    .col(ColumnDef::new(GatewayIdentity::ProfileUrl).text().null())
                    .col(
                        ColumnDef::new(GatewayIdentity::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GatewayIdentity::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_gateway_identity_user")
                            .from(GatewayIdentity::Table, GatewayIdentity::UserId)
                            .to(GatewayUser::Table, GatewayUser::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_gateway_identity_provider_subject")
                    .table(GatewayIdentity::Table)
                    .col(GatewayIdentity::Provider)
                    .col(GatewayIdentity::Subject)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GatewayApiKey::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GatewayApiKey::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GatewayApiKey::UserId).string().not_null())
                    .col(ColumnDef::new(GatewayApiKey::KeyPrefix).string().not_null())
                    .col(ColumnDef::new(GatewayApiKey::KeyHash).text().not_null())
                    .col(
                        ColumnDef::new(GatewayApiKey::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GatewayApiKey::LastUsedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_gateway_api_key_user")
                            .from(GatewayApiKey::Table, GatewayApiKey::UserId)
                            .to(GatewayUser::Table, GatewayUser::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_gateway_api_key_prefix")
                    .table(GatewayApiKey::Table)
                    .col(GatewayApiKey::KeyPrefix)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GatewayApiKey::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GatewayIdentity::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GatewayUser::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum GatewayUser {
    Table,
    Id,
    CreatedAt,
    LastLoginAt,
}

#[derive(DeriveIden)]
enum GatewayIdentity {
    Table,
    Id,
    UserId,
    Provider,
    Subject,
    Login,
    DisplayName,
    AvatarUrl,
    ProfileUrl,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum GatewayApiKey {
    Table,
    Id,
    UserId,
    KeyPrefix,
    KeyHash,
    CreatedAt,
    LastUsedAt,
}
