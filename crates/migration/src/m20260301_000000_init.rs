//! Initial schema migration.
//!
//! - `stations`: fuel outlets
//! - `users`: moderators, operators and customers (with liter balance)
//! - `checks`: fuel vouchers
//! - `balance_entries`: append-only balance ledger
//! - `messages` / `message_recipients`: broadcasts to customers
//! - `sessions`: bearer tokens of logged-in staff

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Stations {
    Table,
    Id,
    Name,
    Address,
    Phone,
    IsActive,
    CreatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Role,
    Username,
    PasswordHash,
    FullName,
    Phone,
    TelegramId,
    TelegramUsername,
    BalanceMinor,
    StationId,
    IsActive,
    CreatedAt,
}

#[derive(Iden)]
enum Checks {
    Table,
    Id,
    Code,
    QrCode,
    AmountMinor,
    Status,
    IsPrinted,
    OperatorId,
    StationId,
    CustomerId,
    CustomerName,
    CustomerPhone,
    CustomerAddress,
    CreatedAt,
    UsedAt,
    ExpiresAt,
}

#[derive(Iden)]
enum BalanceEntries {
    Table,
    Id,
    CustomerId,
    CheckId,
    Kind,
    AmountMinor,
    BalanceAfterMinor,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum Messages {
    Table,
    Id,
    Title,
    Content,
    SenderId,
    IsGlobal,
    CreatedAt,
}

#[derive(Iden)]
enum MessageRecipients {
    Table,
    MessageId,
    UserId,
    DeliveredAt,
}

#[derive(Iden)]
enum Sessions {
    Table,
    Token,
    UserId,
    CreatedAt,
    ExpiresAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Stations
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Stations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Stations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Stations::Name).string().not_null())
                    .col(ColumnDef::new(Stations::Address).string())
                    .col(ColumnDef::new(Stations::Phone).string())
                    .col(
                        ColumnDef::new(Stations::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Stations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Role).string().not_null())
                    .col(ColumnDef::new(Users::Username).string())
                    .col(ColumnDef::new(Users::PasswordHash).string())
                    .col(ColumnDef::new(Users::FullName).string())
                    .col(ColumnDef::new(Users::Phone).string())
                    .col(ColumnDef::new(Users::TelegramId).string())
                    .col(ColumnDef::new(Users::TelegramUsername).string())
                    .col(
                        ColumnDef::new(Users::BalanceMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Users::StationId).integer())
                    .col(
                        ColumnDef::new(Users::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-users-station_id")
                            .from(Users::Table, Users::StationId)
                            .to(Stations::Table, Stations::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-users-username-unique")
                    .table(Users::Table)
                    .col(Users::Username)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-users-role-phone")
                    .table(Users::Table)
                    .col(Users::Role)
                    .col(Users::Phone)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-users-role-balance")
                    .table(Users::Table)
                    .col(Users::Role)
                    .col(Users::BalanceMinor)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Checks
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Checks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Checks::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Checks::Code).string().not_null())
                    .col(ColumnDef::new(Checks::QrCode).string().not_null())
                    .col(ColumnDef::new(Checks::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(Checks::Status).string().not_null())
                    .col(
                        ColumnDef::new(Checks::IsPrinted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Checks::OperatorId).integer().not_null())
                    .col(ColumnDef::new(Checks::StationId).integer().not_null())
                    .col(ColumnDef::new(Checks::CustomerId).integer())
                    .col(ColumnDef::new(Checks::CustomerName).string())
                    .col(ColumnDef::new(Checks::CustomerPhone).string())
                    .col(ColumnDef::new(Checks::CustomerAddress).string())
                    .col(
                        ColumnDef::new(Checks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Checks::UsedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Checks::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-checks-operator_id")
                            .from(Checks::Table, Checks::OperatorId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-checks-station_id")
                            .from(Checks::Table, Checks::StationId)
                            .to(Stations::Table, Stations::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-checks-customer_id")
                            .from(Checks::Table, Checks::CustomerId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-checks-code-unique")
                    .table(Checks::Table)
                    .col(Checks::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-checks-station_id-created_at")
                    .table(Checks::Table)
                    .col(Checks::StationId)
                    .col(Checks::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-checks-operator_id-created_at")
                    .table(Checks::Table)
                    .col(Checks::OperatorId)
                    .col(Checks::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-checks-customer_id")
                    .table(Checks::Table)
                    .col(Checks::CustomerId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Balance ledger
        // ───────────────────────────────────────────────────────────────────
        // `check_id` has no foreign key: entries outlive deleted checks.
        manager
            .create_table(
                Table::create()
                    .table(BalanceEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BalanceEntries::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(BalanceEntries::CustomerId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BalanceEntries::CheckId).integer())
                    .col(ColumnDef::new(BalanceEntries::Kind).string().not_null())
                    .col(
                        ColumnDef::new(BalanceEntries::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BalanceEntries::BalanceAfterMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BalanceEntries::CreatedBy)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BalanceEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-balance_entries-customer_id")
                            .from(BalanceEntries::Table, BalanceEntries::CustomerId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-balance_entries-customer_id")
                    .table(BalanceEntries::Table)
                    .col(BalanceEntries::CustomerId)
                    .col(BalanceEntries::Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-balance_entries-check_id")
                    .table(BalanceEntries::Table)
                    .col(BalanceEntries::CheckId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Messages
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Messages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Messages::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Messages::Title).string().not_null())
                    .col(ColumnDef::new(Messages::Content).text().not_null())
                    .col(ColumnDef::new(Messages::SenderId).integer().not_null())
                    .col(
                        ColumnDef::new(Messages::IsGlobal)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Messages::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MessageRecipients::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MessageRecipients::MessageId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MessageRecipients::UserId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MessageRecipients::DeliveredAt).timestamp_with_time_zone())
                    .primary_key(
                        Index::create()
                            .col(MessageRecipients::MessageId)
                            .col(MessageRecipients::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-message_recipients-message_id")
                            .from(MessageRecipients::Table, MessageRecipients::MessageId)
                            .to(Messages::Table, Messages::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-message_recipients-user_id")
                            .from(MessageRecipients::Table, MessageRecipients::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Sessions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Sessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Sessions::Token)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Sessions::UserId).integer().not_null())
                    .col(
                        ColumnDef::new(Sessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Sessions::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-sessions-user_id")
                            .from(Sessions::Table, Sessions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(Sessions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MessageRecipients::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Messages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BalanceEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Checks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Stations::Table).to_owned())
            .await?;
        Ok(())
    }
}
