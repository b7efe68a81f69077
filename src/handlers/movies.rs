use axum::{
    extract::{Path, State},
    Json,
};
use sea_orm::EntityTrait;
use uuid::Uuid;

use crate::entities::movie;
use crate::error::{AppError, AppResult};
use crate::AppState;

/// List the movie catalog
pub async fn list_movies(State(state): State<AppState>) -> AppResult<Json<Vec<movie::Model>>> {
    let movies = movie::Entity::find().all(&state.db).await?;
    Ok(Json(movies))
}

/// Get a single movie with its showtimes
pub async fn get_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<Uuid>,
) -> AppResult<Json<movie::Model>> {
    let movie = movie::Entity::find_by_id(movie_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Movie not found".to_string()))?;

    Ok(Json(movie))
}
