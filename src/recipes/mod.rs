pub mod cache;
mod dto;
pub mod handlers;
pub mod memory;
pub mod postgres;
pub mod repo;
pub mod repo_types;
pub mod seed;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::recipe_routes()
}
