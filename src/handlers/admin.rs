use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{self, PaymentStatus};
use crate::entities::{movie, user};
use crate::error::{AppError, AppResult};
use crate::AppState;

// ============ Movie Catalog Management ============

#[derive(Debug, Deserialize)]
pub struct CreateMovieRequest {
    pub title: String,
    pub description: Option<String>,
    pub showtimes: Vec<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMovieRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub showtimes: Option<Vec<String>>,
    pub image_url: Option<String>,
}

/// Add a movie to the catalog (admin)
pub async fn create_movie(
    State(state): State<AppState>,
    Json(payload): Json<CreateMovieRequest>,
) -> AppResult<Json<movie::Model>> {
    if payload.title.trim().is_empty() {
        return Err(AppError::BadRequest("Title is required".to_string()));
    }
    if payload.showtimes.is_empty() {
        return Err(AppError::BadRequest(
            "At least one showtime is required".to_string(),
        ));
    }

    let new_movie = movie::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(payload.title.clone()),
        description: Set(payload.description.clone()),
        showtimes: Set(payload.showtimes.clone()),
        image_url: Set(payload.image_url.clone()),
        ..Default::default()
    };

    let result = new_movie.insert(&state.db).await?;
    Ok(Json(result))
}

/// Update a movie (admin)
pub async fn update_movie(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMovieRequest>,
) -> AppResult<Json<movie::Model>> {
    let movie = movie::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Movie not found".to_string()))?;

    let mut active: movie::ActiveModel = movie.into();

    if let Some(title) = payload.title {
        if title.trim().is_empty() {
            return Err(AppError::BadRequest("Title must not be empty".to_string()));
        }
        active.title = Set(title);
    }

    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }

    if let Some(showtimes) = payload.showtimes {
        if showtimes.is_empty() {
            return Err(AppError::BadRequest(
                "At least one showtime is required".to_string(),
            ));
        }
        active.showtimes = Set(showtimes);
    }

    if let Some(image_url) = payload.image_url {
        active.image_url = Set(Some(image_url));
    }

    let result = active.update(&state.db).await?;
    Ok(Json(result))
}

/// Delete a movie (admin). Movies with bookings cannot be removed: booking
/// records are payment history and outlive catalog churn.
pub async fn delete_movie(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    movie::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Movie not found".to_string()))?;

    let has_bookings = booking::Entity::find()
        .filter(booking::Column::MovieId.eq(id))
        .one(&state.db)
        .await?
        .is_some();

    if has_bookings {
        return Err(AppError::Conflict(
            "Movie has bookings and cannot be deleted".to_string(),
        ));
    }

    movie::Entity::delete_by_id(id).exec(&state.db).await?;

    Ok(Json(serde_json::json!({ "message": "Movie deleted" })))
}

// ============ Bookings (Admin) ============

#[derive(Debug, Serialize)]
pub struct BookingInfo {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub movie_title: String,
    pub user_email: Option<String>,
    pub selected_seats: Vec<String>,
    pub showtime: String,
    pub total_amount: i64,
    pub payment_status: PaymentStatus,
    pub gateway_ref_id: Option<String>,
    pub transaction_uuid: Uuid,
    pub created_at: DateTime<Utc>,
}

/// List all bookings, newest first (admin)
pub async fn list_all_bookings(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<BookingInfo>>> {
    let bookings = booking::Entity::find()
        .order_by_desc(booking::Column::CreatedAt)
        .all(&state.db)
        .await?;
    let users = user::Entity::find().all(&state.db).await?;

    let responses: Vec<BookingInfo> = bookings
        .into_iter()
        .map(|b| {
            let email = b
                .user_id
                .and_then(|uid| users.iter().find(|u| u.id == uid))
                .map(|u| u.email.clone());
            BookingInfo {
                id: b.id,
                movie_id: b.movie_id,
                movie_title: b.movie_title,
                user_email: email,
                selected_seats: b.selected_seats,
                showtime: b.showtime,
                total_amount: b.total_amount,
                payment_status: b.payment_status,
                gateway_ref_id: b.gateway_ref_id,
                transaction_uuid: b.transaction_uuid,
                created_at: b.created_at.with_timezone(&Utc),
            }
        })
        .collect();

    Ok(Json(responses))
}
