use std::collections::BTreeSet;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{self, PaymentStatus};
use crate::entities::movie;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::MaybeUser;
use crate::utils::card;
use crate::AppState;

/// Simulated processing time for the in-house card flow.
const CARD_PROCESSING_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Esewa,
}

impl PaymentMethod {
    /// Card is the trusted synchronous method and completes immediately;
    /// gateway payments stay Pending until the callback settles them.
    pub fn initial_status(self) -> PaymentStatus {
        match self {
            PaymentMethod::Card => PaymentStatus::Completed,
            PaymentMethod::Esewa => PaymentStatus::Pending,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub movie_id: Uuid,
    pub movie_title: String,
    pub selected_seats: Vec<String>,
    pub showtime: String,
    pub total_amount: i64,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub movie_title: String,
    pub user_id: Option<Uuid>,
    pub selected_seats: Vec<String>,
    pub showtime: String,
    pub total_amount: i64,
    pub payment_status: PaymentStatus,
    pub gateway_ref_id: Option<String>,
    pub transaction_uuid: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<booking::Model> for BookingResponse {
    fn from(b: booking::Model) -> Self {
        BookingResponse {
            id: b.id,
            movie_id: b.movie_id,
            movie_title: b.movie_title,
            user_id: b.user_id,
            selected_seats: b.selected_seats,
            showtime: b.showtime,
            total_amount: b.total_amount,
            payment_status: b.payment_status,
            gateway_ref_id: b.gateway_ref_id,
            transaction_uuid: b.transaction_uuid,
            created_at: b.created_at.with_timezone(&Utc),
        }
    }
}

/// Create a booking
///
/// Card bookings are committed as Completed and must pass the seat-conflict
/// check; gateway bookings are committed as Pending and hold no seats until
/// the callback confirms payment.
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(MaybeUser(user)): Extension<MaybeUser>,
    Json(payload): Json<CreateBookingRequest>,
) -> AppResult<Json<BookingResponse>> {
    if payload.selected_seats.is_empty() {
        return Err(AppError::BadRequest(
            "At least one seat must be selected".to_string(),
        ));
    }

    let distinct = distinct_seats(&payload.selected_seats);
    if distinct.len() != payload.selected_seats.len() {
        return Err(AppError::BadRequest(
            "Seat list contains duplicates".to_string(),
        ));
    }

    if payload.total_amount < 0 {
        return Err(AppError::BadRequest(
            "Total amount must not be negative".to_string(),
        ));
    }

    // Validate movie reference
    movie::Entity::find_by_id(payload.movie_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::BadRequest("Movie not found".to_string()))?;

    let status = payload.payment_method.initial_status();

    if status == PaymentStatus::Completed {
        let reserved = reserved_for(&state.db, payload.movie_id, &payload.showtime).await?;
        let conflicting = conflicting_seats(&payload.selected_seats, &reserved);
        if !conflicting.is_empty() {
            return Err(AppError::SeatConflict(conflicting));
        }
    }

    let new_booking = booking::ActiveModel {
        id: Set(Uuid::new_v4()),
        movie_id: Set(payload.movie_id),
        movie_title: Set(payload.movie_title.clone()),
        user_id: Set(user.map(|claims| claims.sub)),
        selected_seats: Set(payload.selected_seats.clone()),
        showtime: Set(payload.showtime.clone()),
        total_amount: Set(payload.total_amount),
        payment_status: Set(status),
        gateway_ref_id: Set(None),
        transaction_uuid: Set(Uuid::new_v4()),
        ..Default::default()
    };

    let booking = new_booking.insert(&state.db).await?;

    tracing::info!(
        booking_id = %booking.id,
        status = ?booking.payment_status,
        "Booking created"
    );

    Ok(Json(booking.into()))
}

/// Get a booking (ticket view)
pub async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let booking = booking::Entity::find_by_id(booking_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    Ok(Json(booking.into()))
}

#[derive(Debug, Serialize)]
pub struct ReservedSeatsResponse {
    pub reserved_seats: Vec<String>,
}

/// Reserved seats for a (movie, showtime) pair: the de-duplicated union of
/// seat codes across Completed bookings. Read fresh on every call since
/// gateway callbacks change seat state asynchronously.
pub async fn reserved_seats(
    State(state): State<AppState>,
    Path((movie_id, showtime)): Path<(Uuid, String)>,
) -> AppResult<Json<ReservedSeatsResponse>> {
    let reserved = reserved_for(&state.db, movie_id, &showtime).await?;

    Ok(Json(ReservedSeatsResponse {
        reserved_seats: reserved.into_iter().collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct CardPaymentRequest {
    pub card_number: String,
    pub card_holder: String,
    pub expiry_date: String,
    pub cvv: String,
    pub gateway_ref_id: Option<String>,
}

/// Complete a booking via the simulated card network. Validation happens
/// here at the boundary; past it the finalization is unconditional and
/// never contacts a real network.
pub async fn complete_card_payment(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<CardPaymentRequest>,
) -> AppResult<Json<BookingResponse>> {
    if !card::is_valid_card_number(&payload.card_number) {
        return Err(AppError::BadRequest(
            "Card number must be 15 to 19 digits".to_string(),
        ));
    }
    if payload.card_holder.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Cardholder name is required".to_string(),
        ));
    }
    if !card::is_valid_expiry(&payload.expiry_date) {
        return Err(AppError::BadRequest(
            "Expiry date must be in MM/YY format".to_string(),
        ));
    }
    if !card::is_valid_cvv(&payload.cvv) {
        return Err(AppError::BadRequest(
            "CVV must be 3 or 4 digits".to_string(),
        ));
    }

    // Stand-in for a real card network round trip. Suspends only this
    // request; nothing else is blocked.
    tokio::time::sleep(CARD_PROCESSING_DELAY).await;

    let booking = booking::Entity::find_by_id(booking_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found to complete".to_string()))?;

    let gateway_ref = payload
        .gateway_ref_id
        .unwrap_or_else(|| format!("CARD_SIM_{}", Utc::now().timestamp_millis()));

    let mut active: booking::ActiveModel = booking.into();
    active.payment_status = Set(PaymentStatus::Completed);
    active.gateway_ref_id = Set(Some(gateway_ref));
    let updated = active.update(&state.db).await?;

    tracing::info!(booking_id = %updated.id, "Card payment booking completed");

    Ok(Json(updated.into()))
}

/// Seats held by Completed bookings for a (movie, showtime) pair.
pub(crate) async fn reserved_for(
    db: &DatabaseConnection,
    movie_id: Uuid,
    showtime: &str,
) -> AppResult<BTreeSet<String>> {
    let bookings = booking::Entity::find()
        .filter(booking::Column::MovieId.eq(movie_id))
        .filter(booking::Column::Showtime.eq(showtime))
        .filter(booking::Column::PaymentStatus.eq(PaymentStatus::Completed))
        .all(db)
        .await?;

    Ok(bookings
        .into_iter()
        .flat_map(|b| b.selected_seats)
        .collect())
}

fn distinct_seats(seats: &[String]) -> BTreeSet<&str> {
    seats.iter().map(String::as_str).collect()
}

fn conflicting_seats(requested: &[String], reserved: &BTreeSet<String>) -> Vec<String> {
    requested
        .iter()
        .filter(|seat| reserved.contains(*seat))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status_by_method() {
        assert_eq!(
            PaymentMethod::Card.initial_status(),
            PaymentStatus::Completed
        );
        assert_eq!(
            PaymentMethod::Esewa.initial_status(),
            PaymentStatus::Pending
        );
    }

    #[test]
    fn test_conflicting_seats() {
        let reserved: BTreeSet<String> =
            ["A1", "A2", "B5"].iter().map(|s| s.to_string()).collect();
        let requested = vec!["A2".to_string(), "C1".to_string(), "B5".to_string()];

        assert_eq!(
            conflicting_seats(&requested, &reserved),
            vec!["A2".to_string(), "B5".to_string()]
        );

        let free = vec!["C1".to_string(), "C2".to_string()];
        assert!(conflicting_seats(&free, &reserved).is_empty());
    }

    #[test]
    fn test_distinct_seats_detects_duplicates() {
        let seats = vec!["A1".to_string(), "A2".to_string(), "A1".to_string()];
        assert_eq!(distinct_seats(&seats).len(), 2);

        let unique = vec!["A1".to_string(), "A2".to_string()];
        assert_eq!(distinct_seats(&unique).len(), unique.len());
    }
}
