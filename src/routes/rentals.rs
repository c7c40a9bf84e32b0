use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::db::models::Rental;
use crate::error::AppResult;
use crate::extractors::{CurrentUser, JsonBody};
use crate::rentals::NewRental;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rentals", post(create_rental))
        .route("/rentals/me", get(my_rentals))
        .route("/rentals/{id}/return", post(return_rental))
}

/// POST /api/rentals
async fn create_rental(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(new): JsonBody<NewRental>,
) -> AppResult<(StatusCode, Json<Rental>)> {
    new.validate()?;
    let rental = state.rentals.create(user.id(), &new)?;
    Ok((StatusCode::CREATED, Json(rental)))
}

/// GET /api/rentals/me
async fn my_rentals(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<Rental>>> {
    Ok(Json(state.rentals.list_by_renter(user.id())?))
}

/// POST /api/rentals/{id}/return
async fn return_rental(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Rental>> {
    Ok(Json(state.rentals.mark_returned(user.id(), id)?))
}
