use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::recipes::repo::RecipeStore;
use crate::recipes::repo_types::{Recipe, RecipeDraft};

/// In-process backing. Keeps insertion order; lookups are linear scans.
#[derive(Default)]
pub struct MemoryRecipeStore {
    recipes: RwLock<Vec<Recipe>>,
}

impl MemoryRecipeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecipeStore for MemoryRecipeStore {
    async fn create(&self, draft: RecipeDraft) -> AppResult<Recipe> {
        draft.validate()?;
        let recipe = Recipe::new(draft, OffsetDateTime::now_utc());
        self.recipes.write().await.push(recipe.clone());
        debug!(id = %recipe.id, "recipe stored in memory");
        Ok(recipe)
    }

    async fn list_all(&self) -> AppResult<Vec<Recipe>> {
        Ok(self.recipes.read().await.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Recipe> {
        self.recipes
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(AppError::NotFound("recipe"))
    }

    async fn update(&self, id: Uuid, draft: RecipeDraft) -> AppResult<Recipe> {
        draft.validate()?;
        let mut recipes = self.recipes.write().await;
        let recipe = recipes
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(AppError::NotFound("recipe"))?;
        recipe.apply(draft, OffsetDateTime::now_utc());
        Ok(recipe.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut recipes = self.recipes.write().await;
        let idx = recipes
            .iter()
            .position(|r| r.id == id)
            .ok_or(AppError::NotFound("recipe"))?;
        recipes.remove(idx);
        Ok(())
    }

    async fn find_by_tag(&self, tag: &str) -> AppResult<Vec<Recipe>> {
        Ok(self
            .recipes
            .read()
            .await
            .iter()
            .filter(|r| r.has_tag(tag))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::recipes::repo::contract;

    #[tokio::test]
    async fn create_assigns_fresh_ids() {
        contract::create_assigns_fresh_ids(&MemoryRecipeStore::new()).await;
    }

    #[tokio::test]
    async fn create_rejects_invalid_draft() {
        contract::create_rejects_invalid_draft(&MemoryRecipeStore::new()).await;
    }

    #[tokio::test]
    async fn soup_lifecycle() {
        contract::soup_lifecycle(&MemoryRecipeStore::new()).await;
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        contract::missing_ids_are_not_found(&MemoryRecipeStore::new()).await;
    }

    #[tokio::test]
    async fn find_by_tag_returns_exact_subset() {
        contract::find_by_tag_returns_exact_subset(&MemoryRecipeStore::new()).await;
    }

    #[tokio::test]
    async fn list_keeps_insertion_order() {
        let store = MemoryRecipeStore::new();
        let mut ids = Vec::new();
        for name in ["a", "b", "c"] {
            ids.push(store.create(contract::draft(name, &[])).await.unwrap().id);
        }
        store.delete(ids[1]).await.unwrap();
        let listed: Vec<Uuid> = store.list_all().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(listed, vec![ids[0], ids[2]]);
    }

    #[tokio::test]
    async fn concurrent_creates_are_all_kept() {
        let store = Arc::new(MemoryRecipeStore::new());
        let mut tasks = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.create(contract::draft(&format!("r{i}"), &[])).await
            }));
        }
        for t in tasks {
            t.await.unwrap().unwrap();
        }
        assert_eq!(store.list_all().await.unwrap().len(), 32);
    }
}
