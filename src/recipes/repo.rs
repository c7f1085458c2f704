use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::recipes::repo_types::{Recipe, RecipeDraft};

/// Persistence and query operations over the recipe collection.
///
/// Every backing (memory, Postgres, cache-fronted) sits behind this trait and
/// is picked once when the application state is built.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Validate the draft, assign a fresh id and timestamps, persist it.
    async fn create(&self, draft: RecipeDraft) -> AppResult<Recipe>;

    async fn list_all(&self) -> AppResult<Vec<Recipe>>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Recipe>;

    /// Replace name, tags, ingredients and instructions; refresh `updated_at`.
    async fn update(&self, id: Uuid, draft: RecipeDraft) -> AppResult<Recipe>;

    /// Remove the record. Deleting an absent id is `NotFound`, not a no-op.
    async fn delete(&self, id: Uuid) -> AppResult<()>;

    /// Case-insensitive exact match on any tag. Empty when nothing matches.
    async fn find_by_tag(&self, tag: &str) -> AppResult<Vec<Recipe>>;
}
