use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{dto::MessageResponse, extractors::AuthUser},
    error::AppResult,
    recipes::{
        dto::SearchQuery,
        repo_types::{parse_recipe_id, Recipe, RecipeDraft},
    },
    state::AppState,
};

/// Only listing is open to anonymous callers; every other handler extracts
/// `AuthUser` and stops at 401 before touching the store.
pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route("/recipes/search", get(search_recipes))
        .route(
            "/recipes/:id",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_recipes(State(state): State<AppState>) -> AppResult<Json<Vec<Recipe>>> {
    Ok(Json(state.recipes.list_all().await?))
}

#[instrument(skip(state, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    payload: Result<Json<RecipeDraft>, JsonRejection>,
) -> AppResult<Json<Recipe>> {
    let Json(draft) = payload?;
    let recipe = state.recipes.create(draft).await?;
    info!(id = %recipe.id, %username, "recipe created");
    Ok(Json(recipe))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    AuthUser(_username): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Recipe>> {
    let id = parse_recipe_id(&id)?;
    Ok(Json(state.recipes.get_by_id(id).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<RecipeDraft>, JsonRejection>,
) -> AppResult<Json<Recipe>> {
    let id = parse_recipe_id(&id)?;
    let Json(draft) = payload?;
    let recipe = state.recipes.update(id, draft).await?;
    info!(%id, %username, "recipe updated");
    Ok(Json(recipe))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_recipe_id(&id)?;
    state.recipes.delete(id).await?;
    info!(%id, %username, "recipe deleted");
    Ok(Json(MessageResponse {
        message: "Recipe has been deleted",
    }))
}

#[instrument(skip(state))]
pub async fn search_recipes(
    State(state): State<AppState>,
    AuthUser(_username): AuthUser,
    Query(q): Query<SearchQuery>,
) -> AppResult<Json<Vec<Recipe>>> {
    Ok(Json(state.recipes.find_by_tag(&q.tag).await?))
}
