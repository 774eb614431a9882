use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

use super::{error::AppError, ServerState};
use crate::api::{LoginRequest, MessageResponse, SaveUserRequest};

pub async fn save_user_handler(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<SaveUserRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    info!(username = %payload.username, "saving user");

    state.users.save(&payload).map_err(AppError::SaveFailed)?;
    Ok(Json(MessageResponse::new("User saved")))
}

pub async fn login_handler(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let valid = state
        .users
        .verify(&payload.username, &payload.password)
        .map_err(AppError::LoginFailed)?;

    if valid {
        info!(username = %payload.username, "login succeeded");
        Ok((StatusCode::OK, Json(MessageResponse::new("Login succeeded"))))
    } else {
        info!(username = %payload.username, "login rejected");
        Ok((
            StatusCode::UNAUTHORIZED,
            Json(MessageResponse::new("Invalid username or password")),
        ))
    }
}
