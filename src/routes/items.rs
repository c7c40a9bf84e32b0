use axum::extract::{OriginalUri, Path, RawQuery, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::db::models::Item;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, JsonBody};
use crate::items::{ItemPatch, ItemQuery, ItemReplacement, NewItem};
use crate::pagination::Pagination;
use crate::state::AppState;

const X_TOTAL_COUNT: &str = "x-total-count";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/me", get(my_items))
        .route(
            "/items/{id}",
            get(get_item)
                .patch(patch_item)
                .put(replace_item)
                .delete(delete_item),
        )
}

/// Absolute URL of the listing endpoint, used as the base of `Link` targets.
fn listing_url(state: &AppState, headers: &HeaderMap, path: &str) -> String {
    if let Some(public) = state.config.server.public_url.as_deref() {
        return format!("{}{}", public.trim_end_matches('/'), path);
    }
    match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => format!("http://{host}{path}"),
        None => path.to_string(),
    }
}

/// GET /api/items
async fn list_items(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> AppResult<Response> {
    let query = ItemQuery::from_query_str(raw.as_deref().unwrap_or_default())?;
    let page = state.items.list(&query)?;

    let pagination = Pagination::new(u64::from(query.skip), u64::from(query.limit), page.total);
    let link = pagination.link_header(
        &listing_url(&state, &headers, uri.path()),
        &query.filter_params(),
    );

    let mut response = Json(page.items).into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(X_TOTAL_COUNT, HeaderValue::from(page.total));
    if !link.is_empty() {
        let value =
            HeaderValue::from_str(&link).map_err(|e| AppError::Internal(e.to_string()))?;
        response_headers.insert(header::LINK, value);
    }
    Ok(response)
}

/// GET /api/items/me
async fn my_items(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Vec<Item>>> {
    Ok(Json(state.items.list_by_owner(user.id())?))
}

/// GET /api/items/{id}
async fn get_item(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Item>> {
    Ok(Json(state.items.get(id)?))
}

/// POST /api/items
async fn create_item(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(new): JsonBody<NewItem>,
) -> AppResult<(StatusCode, Json<Item>)> {
    new.validate()?;
    let item = state.items.create(user.id(), &new)?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PATCH /api/items/{id}
async fn patch_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    JsonBody(patch): JsonBody<ItemPatch>,
) -> AppResult<Json<Item>> {
    patch.validate()?;
    Ok(Json(state.items.update(user.id(), id, &patch)?))
}

/// PUT /api/items/{id}
async fn replace_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    JsonBody(replacement): JsonBody<ItemReplacement>,
) -> AppResult<Json<Item>> {
    let patch = ItemPatch::from(replacement);
    patch.validate()?;
    Ok(Json(state.items.update(user.id(), id, &patch)?))
}

/// DELETE /api/items/{id}
async fn delete_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.items.delete(user.id(), id)?;
    Ok(StatusCode::NO_CONTENT)
}
