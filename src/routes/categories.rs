use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::models::Category;
use crate::error::AppResult;
use crate::extractors::JsonBody;
use crate::state::AppState;
use crate::validation::{validate_text, MAX_CATEGORY_NAME};

#[derive(Deserialize)]
struct NewCategory {
    name: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/{id}", get(get_category))
}

async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(state.categories.list()?))
}

async fn create_category(
    State(state): State<AppState>,
    JsonBody(new): JsonBody<NewCategory>,
) -> AppResult<(StatusCode, Json<Category>)> {
    validate_text("name", &new.name, MAX_CATEGORY_NAME)?;
    let category = state.categories.create(new.name.trim())?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Category>> {
    Ok(Json(state.categories.get(id)?))
}
