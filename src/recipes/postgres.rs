use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::recipes::repo::RecipeStore;
use crate::recipes::repo_types::{Recipe, RecipeDraft};

/// Postgres backing over the `recipes` table (see `migrations/`).
/// `lower()` follows the column collation; pinning ICU keeps non-ASCII
/// case folding the same as `str::to_lowercase` under a `C` database.
const FIND_BY_TAG_SQL: &str = r#"
    SELECT id, name, tags, ingredients, instructions, published_at, updated_at
    FROM recipes
    WHERE EXISTS (
        SELECT 1 FROM unnest(tags) AS t
        WHERE lower(t COLLATE "und-x-icu") = lower($1 COLLATE "und-x-icu")
    )
    ORDER BY published_at
"#;

#[derive(Clone)]
pub struct PgRecipeStore {
    db: PgPool,
}

impl PgRecipeStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecipeStore for PgRecipeStore {
    async fn create(&self, draft: RecipeDraft) -> AppResult<Recipe> {
        draft.validate()?;
        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            INSERT INTO recipes (id, name, tags, ingredients, instructions, published_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING id, name, tags, ingredients, instructions, published_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&draft.name)
        .bind(&draft.tags)
        .bind(&draft.ingredients)
        .bind(&draft.instructions)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db)
        .await?;
        Ok(recipe)
    }

    async fn list_all(&self) -> AppResult<Vec<Recipe>> {
        let rows = sqlx::query_as::<_, Recipe>(
            r#"
            SELECT id, name, tags, ingredients, instructions, published_at, updated_at
            FROM recipes
            ORDER BY published_at
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Recipe> {
        sqlx::query_as::<_, Recipe>(
            r#"
            SELECT id, name, tags, ingredients, instructions, published_at, updated_at
            FROM recipes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("recipe"))
    }

    async fn update(&self, id: Uuid, draft: RecipeDraft) -> AppResult<Recipe> {
        draft.validate()?;
        sqlx::query_as::<_, Recipe>(
            r#"
            UPDATE recipes
               SET name = $2,
                   tags = $3,
                   ingredients = $4,
                   instructions = $5,
                   updated_at = GREATEST($6, updated_at)
             WHERE id = $1
            RETURNING id, name, tags, ingredients, instructions, published_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&draft.name)
        .bind(&draft.tags)
        .bind(&draft.ingredients)
        .bind(&draft.instructions)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("recipe"))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let res = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::NotFound("recipe"));
        }
        Ok(())
    }

    async fn find_by_tag(&self, tag: &str) -> AppResult<Vec<Recipe>> {
        let rows = sqlx::query_as::<_, Recipe>(FIND_BY_TAG_SQL)
        .bind(tag)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}
