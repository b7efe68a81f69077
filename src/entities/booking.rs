use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment lifecycle of a booking. Transitions only move forward:
/// Pending -> Completed or Pending -> Failed. Cancelled is reserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Completed")]
    Completed,
    #[sea_orm(string_value = "Failed")]
    Failed,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "booking")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub movie_id: Uuid,
    /// Denormalized so the ticket survives catalog edits.
    pub movie_title: String,
    /// None for guest bookings.
    pub user_id: Option<Uuid>,
    pub selected_seats: Vec<String>,
    pub showtime: String,
    pub total_amount: i64,
    pub payment_status: PaymentStatus,
    /// Gateway's own reference, set once payment is confirmed.
    pub gateway_ref_id: Option<String>,
    /// Correlation key echoed by the gateway; unique across all bookings.
    #[sea_orm(unique)]
    pub transaction_uuid: Uuid,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::movie::Entity",
        from = "Column::MovieId",
        to = "super::movie::Column::Id"
    )]
    Movie,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::movie::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Movie.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
