use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::auth::repo::{CredentialStore, MemoryCredentialStore, PgCredentialStore};
use crate::config::{AppConfig, CacheBackend, CacheConfig, StoreBackend};
use crate::db;
use crate::recipes::cache::{CachedRecipeStore, MemoryRecipeCache, RecipeCache, RedisRecipeCache};
use crate::recipes::memory::MemoryRecipeStore;
use crate::recipes::postgres::PgRecipeStore;
use crate::recipes::repo::RecipeStore;
use crate::recipes::seed;

#[derive(Clone)]
pub struct AppState {
    pub recipes: Arc<dyn RecipeStore>,
    pub users: Arc<dyn CredentialStore>,
    pub config: Arc<AppConfig>,
    /// Set for the Postgres backing; sessions persist there too.
    pub db: Option<PgPool>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let mut pg = None;
        let (recipes, users): (Arc<dyn RecipeStore>, Arc<dyn CredentialStore>) = match config.store {
            StoreBackend::Memory => {
                tracing::info!("using in-memory stores");
                (
                    Arc::new(MemoryRecipeStore::new()),
                    Arc::new(MemoryCredentialStore::new()),
                )
            }
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;
                let pool = db::connect(url).await?;
                db::migrate(&pool).await?;
                tracing::info!("using postgres stores");
                pg = Some(pool.clone());
                (
                    Arc::new(PgRecipeStore::new(pool.clone())),
                    Arc::new(PgCredentialStore::new(pool)),
                )
            }
        };

        let recipes = match build_cache(&config.cache).await {
            Some(cache) => Arc::new(CachedRecipeStore::new(recipes, cache)) as Arc<dyn RecipeStore>,
            None => recipes,
        };

        if let Some(path) = &config.seed_file {
            let drafts = seed::load_seed_file(path)?;
            seed::seed_if_empty(recipes.as_ref(), drafts).await?;
        }

        Ok(Self {
            db: pg,
            ..Self::from_parts(recipes, users, config)
        })
    }

    pub fn from_parts(
        recipes: Arc<dyn RecipeStore>,
        users: Arc<dyn CredentialStore>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            recipes,
            users,
            config,
            db: None,
        }
    }

    /// Memory-backed state with fixed JWT settings, for tests.
    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            store: StoreBackend::Memory,
            database_url: None,
            cache: CacheConfig {
                backend: CacheBackend::None,
                redis_url: String::new(),
                ttl_seconds: 60,
                max_entries: 16,
            },
            seed_file: None,
            session_cookie: "recipes_api".into(),
            session_ttl_minutes: 60,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 10,
                refresh_window_seconds: 30,
                refresh_extend_minutes: 5,
            },
        });
        Self::from_parts(
            Arc::new(MemoryRecipeStore::new()),
            Arc::new(MemoryCredentialStore::new()),
            config,
        )
    }
}

/// The cache is optional: an unreachable Redis only costs the cache.
async fn build_cache(cfg: &CacheConfig) -> Option<Arc<dyn RecipeCache>> {
    let ttl = Duration::from_secs(cfg.ttl_seconds);
    match cfg.backend {
        CacheBackend::None => None,
        CacheBackend::Memory => {
            tracing::info!(ttl_seconds = cfg.ttl_seconds, "using in-memory recipe cache");
            Some(Arc::new(MemoryRecipeCache::new(ttl, cfg.max_entries)))
        }
        CacheBackend::Redis => match RedisRecipeCache::connect(&cfg.redis_url, cfg.ttl_seconds).await {
            Ok(cache) => {
                tracing::info!(url = %cfg.redis_url, "using redis recipe cache");
                Some(Arc::new(cache))
            }
            Err(e) => {
                tracing::warn!(error = %e, "redis unavailable; running without cache");
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_cache_wraps_the_store() {
        let cfg = CacheConfig {
            backend: CacheBackend::Memory,
            redis_url: String::new(),
            ttl_seconds: 5,
            max_entries: 8,
        };
        assert!(build_cache(&cfg).await.is_some());
        let cfg = CacheConfig {
            backend: CacheBackend::None,
            ..cfg
        };
        assert!(build_cache(&cfg).await.is_none());
    }

    #[tokio::test]
    async fn unreachable_redis_means_no_cache() {
        let cfg = CacheConfig {
            backend: CacheBackend::Redis,
            redis_url: "redis://127.0.0.1:1".into(),
            ttl_seconds: 5,
            max_entries: 8,
        };
        assert!(build_cache(&cfg).await.is_none());
    }
}
