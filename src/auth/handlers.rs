use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::{instrument, warn};

use super::{
    dto::{LoginRequest, LoginResponse},
    services::authenticate,
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let Json(payload) = payload.map_err(|e| {
        warn!(error = %e, "invalid login body");
        AppError::validation("Full name and password are required.")
    })?;

    let (full_name, password) = match (payload.full_name, payload.password) {
        (Some(n), Some(p)) if !n.is_empty() && !p.is_empty() => (n, p),
        _ => return Err(AppError::validation("Full name and password are required.")),
    };

    let id = authenticate(&state, &full_name, &password).await?;
    Ok(Json(LoginResponse {
        message: "Login successful.",
        id,
    }))
}
