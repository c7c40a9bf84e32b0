use axum::extract::State;
use axum::http::StatusCode;
use axum::{Form, Json};
use serde::{Deserialize, Serialize};

use crate::auth::service::NewUser;
use crate::db::models::User;
use crate::error::AppResult;
use crate::extractors::JsonBody;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    JsonBody(new): JsonBody<NewUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    new.validate()?;
    let user = state.auth.signup(&new)?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/auth/token (form-encoded, OAuth2 password flow)
pub async fn token(
    State(state): State<AppState>,
    Form(req): Form<TokenRequest>,
) -> AppResult<Json<TokenResponse>> {
    let user = state.auth.verify(&req.username, &req.password)?;
    let access_token = state.auth.issue_token(user.id)?;
    tracing::info!(user_id = user.id, "Token issued");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}
