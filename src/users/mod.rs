mod dto;
pub mod form;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router(max_photo_bytes: usize) -> Router<AppState> {
    handlers::user_routes(max_photo_bytes)
}
