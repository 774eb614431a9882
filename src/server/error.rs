use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::api::MessageResponse;
use crate::error::WalkError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to save user")]
    SaveFailed(#[source] WalkError),

    #[error("Login failed")]
    LoginFailed(#[source] WalkError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let cause = match &self {
            AppError::SaveFailed(e) | AppError::LoginFailed(e) => e,
        };
        error!("{self}: {cause}");

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(MessageResponse::new(self.to_string())),
        )
            .into_response()
    }
}
