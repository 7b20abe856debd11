use axum::{
    extract::{rejection::PathRejection, DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{CreatedResponse, MessageResponse, UpdatedResponse, UserResponse},
    form::UserForm,
    services,
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

/// Room for the text fields and multipart framing on top of the photo itself.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn user_routes(max_photo_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/usuarios", post(create_user))
        .route(
            "/usuarios/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .layer(DefaultBodyLimit::max(max_photo_bytes + FORM_OVERHEAD_BYTES))
}

fn user_id(path: Result<Path<i64>, PathRejection>) -> AppResult<i64> {
    path.map(|Path(id)| id)
        .map_err(|e| AppError::validation(format!("Invalid user id: {}", e.body_text())))
}

/// POST /usuarios (multipart or JSON)
#[instrument(skip(state, form))]
pub async fn create_user(
    State(state): State<AppState>,
    form: UserForm,
) -> AppResult<(StatusCode, Json<CreatedResponse>)> {
    let (input, photo) = form.into_create()?;
    let id = services::create_user(&state, input, photo).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "User registered successfully.",
            id,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<UserResponse>> {
    let id = user_id(path)?;
    Ok(Json(services::get_user(&state, id).await?))
}

/// PUT /usuarios/:id (multipart or JSON, every field optional)
#[instrument(skip(state, form))]
pub async fn update_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    form: UserForm,
) -> AppResult<Json<UpdatedResponse>> {
    let id = user_id(path)?;
    let (patch, photo) = form.into_patch()?;
    let photo_url = services::update_user(&state, id, patch, photo).await?;
    Ok(Json(UpdatedResponse {
        message: "User updated successfully.",
        photo_url,
    }))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<MessageResponse>> {
    let id = user_id(path)?;
    services::delete_user(&state, id).await?;
    Ok(Json(MessageResponse {
        message: "User and profile photo deleted successfully.",
    }))
}
