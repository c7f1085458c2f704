use std::path::Path;

use anyhow::Context;
use tracing::info;

use crate::recipes::repo::RecipeStore;
use crate::recipes::repo_types::RecipeDraft;

/// Read a JSON array of recipes. Store-owned fields in the file are ignored.
pub fn load_seed_file(path: impl AsRef<Path>) -> anyhow::Result<Vec<RecipeDraft>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read seed file {}", path.display()))?;
    let drafts: Vec<RecipeDraft> = serde_json::from_str(&raw)
        .with_context(|| format!("parse seed file {}", path.display()))?;
    Ok(drafts)
}

/// Insert `drafts` only when the store holds no recipes yet.
/// Returns how many records were created.
pub async fn seed_if_empty(store: &dyn RecipeStore, drafts: Vec<RecipeDraft>) -> anyhow::Result<usize> {
    if !store.list_all().await?.is_empty() {
        info!("recipe store already populated; skipping seed");
        return Ok(0);
    }
    let mut created = 0;
    for draft in drafts {
        store
            .create(draft)
            .await
            .with_context(|| format!("seed recipe #{created}"))?;
        created += 1;
    }
    info!(created, "recipe store seeded");
    Ok(created)
}
