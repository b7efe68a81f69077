use sea_orm_migration::{prelude::*, schema::*};

use super::m20250601_000001_create_users::User;
use super::m20250601_000002_create_movies::Movie;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Booking::Table)
                    .if_not_exists()
                    .col(uuid(Booking::Id).primary_key())
                    .col(uuid(Booking::MovieId).not_null())
                    .col(string_len(Booking::MovieTitle, 255).not_null())
                    .col(uuid_null(Booking::UserId))
                    .col(
                        ColumnDef::new(Booking::SelectedSeats)
                            .array(ColumnType::Text)
                            .not_null(),
                    )
                    .col(string_len(Booking::Showtime, 50).not_null())
                    .col(big_integer(Booking::TotalAmount).not_null())
                    .col(string_len(Booking::PaymentStatus, 20).not_null())
                    .col(string_len_null(Booking::GatewayRefId, 255))
                    .col(uuid(Booking::TransactionUuid).not_null().unique_key())
                    .col(
                        timestamp_with_time_zone(Booking::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_movie")
                            .from(Booking::Table, Booking::MovieId)
                            .to(Movie::Table, Movie::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_user")
                            .from(Booking::Table, Booking::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Booking::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Booking {
    Table,
    Id,
    MovieId,
    MovieTitle,
    UserId,
    SelectedSeats,
    Showtime,
    TotalAmount,
    PaymentStatus,
    GatewayRefId,
    TransactionUuid,
    CreatedAt,
}
