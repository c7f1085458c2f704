use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppResult;
use crate::recipes::repo::RecipeStore;
use crate::recipes::repo_types::{Recipe, RecipeDraft};

const ALL_RECIPES_KEY: &str = "recipes";
const REDIS_TIMEOUT: Duration = Duration::from_millis(100);

fn recipe_key(id: Uuid) -> String {
    format!("recipe:{id}")
}

/// Key/value cache holding JSON-encoded recipe payloads.
#[async_trait]
pub trait RecipeCache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> anyhow::Result<()>;
    async fn invalidate(&self, keys: &[String]) -> anyhow::Result<()>;
}

struct Entry {
    body: String,
    created_at: Instant,
}

/// In-process cache with a per-entry TTL and a bounded entry count.
pub struct MemoryRecipeCache {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryRecipeCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RecipeCache for MemoryRecipeCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, e| e.created_at.elapsed() <= self.ttl);
        Ok(entries.get(key).map(|e| e.body.clone()))
    }

    async fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, e| e.created_at.elapsed() <= self.ttl);
        if entries.len() >= self.max_entries && !entries.contains_key(key) {
            if let Some(victim) = entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&victim);
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                body: value,
                created_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn invalidate(&self, keys: &[String]) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().await;
        for k in keys {
            entries.remove(k);
        }
        Ok(())
    }
}

/// Redis-backed cache; every call is bounded by a short timeout.
#[derive(Clone)]
pub struct RedisRecipeCache {
    conn: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisRecipeCache {
    pub async fn connect(url: &str, ttl_seconds: u64) -> anyhow::Result<Self> {
        let client = redis::Client::open(url).context("parse redis url")?;
        let conn = timeout(Duration::from_secs(2), ConnectionManager::new(client))
            .await
            .context("redis connect timeout")?
            .context("redis connect")?;
        Ok(Self {
            conn,
            ttl_seconds: ttl_seconds.max(1),
        })
    }
}

#[async_trait]
impl RecipeCache for RedisRecipeCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = timeout(REDIS_TIMEOUT, conn.get(key))
            .await
            .context("redis get timeout")??;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        timeout(REDIS_TIMEOUT, conn.set_ex::<_, _, ()>(key, value, self.ttl_seconds))
            .await
            .context("redis set timeout")??;
        Ok(())
    }

    async fn invalidate(&self, keys: &[String]) -> anyhow::Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        timeout(REDIS_TIMEOUT, conn.del::<_, ()>(keys))
            .await
            .context("redis del timeout")??;
        Ok(())
    }
}

/// Read-through, write-invalidate decorator over any recipe store.
///
/// Cache faults are logged and skipped; the inner store stays authoritative.
/// `generation` moves on every successful write so a read that raced one
/// never leaves its snapshot behind in the cache.
pub struct CachedRecipeStore {
    inner: Arc<dyn RecipeStore>,
    cache: Arc<dyn RecipeCache>,
    generation: AtomicU64,
}

impl CachedRecipeStore {
    pub fn new(inner: Arc<dyn RecipeStore>, cache: Arc<dyn RecipeCache>) -> Self {
        Self {
            inner,
            cache,
            generation: AtomicU64::new(0),
        }
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(body)) => match serde_json::from_str(&body) {
                Ok(v) => {
                    debug!(key, "cache hit");
                    Some(v)
                }
                Err(e) => {
                    warn!(error = %e, key, "undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, key, "cache read failed");
                None
            }
        }
    }

    /// Store `value` unless a write finished since `seen` was read.
    async fn fill<T: Serialize>(&self, key: &str, value: &T, seen: u64) {
        if self.generation() != seen {
            debug!(key, "skipping fill after concurrent write");
            return;
        }
        let body = match serde_json::to_string(value) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, key, "cache encode failed");
                return;
            }
        };
        if let Err(e) = self.cache.set(key, body).await {
            warn!(error = %e, key, "cache write failed");
            return;
        }
        // a write may have evicted between the check and the set
        if self.generation() != seen {
            if let Err(e) = self.cache.invalidate(&[key.to_string()]).await {
                warn!(error = %e, key, "cache invalidation failed");
            }
        }
    }

    async fn evict(&self, id: Option<Uuid>) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut keys = vec![ALL_RECIPES_KEY.to_string()];
        keys.extend(id.map(recipe_key));
        if let Err(e) = self.cache.invalidate(&keys).await {
            warn!(error = %e, ?keys, "cache invalidation failed");
        }
    }
}

#[async_trait]
impl RecipeStore for CachedRecipeStore {
    async fn create(&self, draft: RecipeDraft) -> AppResult<Recipe> {
        let recipe = self.inner.create(draft).await?;
        self.evict(None).await;
        Ok(recipe)
    }

    async fn list_all(&self) -> AppResult<Vec<Recipe>> {
        if let Some(hit) = self.lookup(ALL_RECIPES_KEY).await {
            return Ok(hit);
        }
        let seen = self.generation();
        let recipes = self.inner.list_all().await?;
        self.fill(ALL_RECIPES_KEY, &recipes, seen).await;
        Ok(recipes)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Recipe> {
        let key = recipe_key(id);
        if let Some(hit) = self.lookup(&key).await {
            return Ok(hit);
        }
        let seen = self.generation();
        let recipe = self.inner.get_by_id(id).await?;
        self.fill(&key, &recipe, seen).await;
        Ok(recipe)
    }

    async fn update(&self, id: Uuid, draft: RecipeDraft) -> AppResult<Recipe> {
        let recipe = self.inner.update(id, draft).await?;
        self.evict(Some(id)).await;
        Ok(recipe)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.inner.delete(id).await?;
        self.evict(Some(id)).await;
        Ok(())
    }

    async fn find_by_tag(&self, tag: &str) -> AppResult<Vec<Recipe>> {
        self.inner.find_by_tag(tag).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    use tokio::sync::Notify;

    use super::*;
    use crate::recipes::memory::MemoryRecipeStore;
    use crate::recipes::repo::contract;

    fn cached() -> CachedRecipeStore {
        CachedRecipeStore::new(
            Arc::new(MemoryRecipeStore::new()),
            Arc::new(MemoryRecipeCache::new(Duration::from_secs(60), 16)),
        )
    }

    /// Cache that fails every call.
    struct BrokenCache;

    #[async_trait]
    impl RecipeCache for BrokenCache {
        async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("cache down")
        }
        async fn set(&self, _key: &str, _value: String) -> anyhow::Result<()> {
            anyhow::bail!("cache down")
        }
        async fn invalidate(&self, _keys: &[String]) -> anyhow::Result<()> {
            anyhow::bail!("cache down")
        }
    }

    /// Counts how often the inner store is asked for the full list.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryRecipeStore,
        lists: AtomicUsize,
    }

    #[async_trait]
    impl RecipeStore for CountingStore {
        async fn create(&self, draft: RecipeDraft) -> AppResult<Recipe> {
            self.inner.create(draft).await
        }
        async fn list_all(&self) -> AppResult<Vec<Recipe>> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            self.inner.list_all().await
        }
        async fn get_by_id(&self, id: Uuid) -> AppResult<Recipe> {
            self.inner.get_by_id(id).await
        }
        async fn update(&self, id: Uuid, draft: RecipeDraft) -> AppResult<Recipe> {
            self.inner.update(id, draft).await
        }
        async fn delete(&self, id: Uuid) -> AppResult<()> {
            self.inner.delete(id).await
        }
        async fn find_by_tag(&self, tag: &str) -> AppResult<Vec<Recipe>> {
            self.inner.find_by_tag(tag).await
        }
    }

    /// Parks the first `list_all`/`get_by_id` after it has read the store,
    /// until the test releases it.
    #[derive(Default)]
    struct ParkedReadStore {
        inner: MemoryRecipeStore,
        parked: AtomicBool,
        read_done: Notify,
        release: Notify,
    }

    impl ParkedReadStore {
        async fn park_first(&self) {
            if !self.parked.swap(true, Ordering::SeqCst) {
                self.read_done.notify_one();
                self.release.notified().await;
            }
        }
    }

    #[async_trait]
    impl RecipeStore for ParkedReadStore {
        async fn create(&self, draft: RecipeDraft) -> AppResult<Recipe> {
            self.inner.create(draft).await
        }
        async fn list_all(&self) -> AppResult<Vec<Recipe>> {
            let recipes = self.inner.list_all().await?;
            self.park_first().await;
            Ok(recipes)
        }
        async fn get_by_id(&self, id: Uuid) -> AppResult<Recipe> {
            let recipe = self.inner.get_by_id(id).await?;
            self.park_first().await;
            Ok(recipe)
        }
        async fn update(&self, id: Uuid, draft: RecipeDraft) -> AppResult<Recipe> {
            self.inner.update(id, draft).await
        }
        async fn delete(&self, id: Uuid) -> AppResult<()> {
            self.inner.delete(id).await
        }
        async fn find_by_tag(&self, tag: &str) -> AppResult<Vec<Recipe>> {
            self.inner.find_by_tag(tag).await
        }
    }

    fn cached_over(inner: Arc<ParkedReadStore>) -> Arc<CachedRecipeStore> {
        Arc::new(CachedRecipeStore::new(
            inner,
            Arc::new(MemoryRecipeCache::new(Duration::from_secs(60), 16)),
        ))
    }

    #[tokio::test]
    async fn list_read_racing_a_create_is_not_cached() {
        let inner = Arc::new(ParkedReadStore::default());
        let store = cached_over(inner.clone());

        let reader = tokio::spawn({
            let store = store.clone();
            async move { store.list_all().await.unwrap() }
        });
        inner.read_done.notified().await;
        store.create(contract::draft("Soup", &[])).await.unwrap();
        inner.release.notify_one();

        assert!(reader.await.unwrap().is_empty());
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_read_racing_a_delete_is_not_cached() {
        let inner = Arc::new(ParkedReadStore::default());
        let store = cached_over(inner.clone());
        let r = store.create(contract::draft("Soup", &[])).await.unwrap();

        let reader = tokio::spawn({
            let store = store.clone();
            async move { store.get_by_id(r.id).await.unwrap() }
        });
        inner.read_done.notified().await;
        store.delete(r.id).await.unwrap();
        inner.release.notify_one();

        assert_eq!(reader.await.unwrap().id, r.id);
        assert!(matches!(
            store.get_by_id(r.id).await,
            Err(crate::error::AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn cached_store_keeps_store_contract() {
        contract::create_assigns_fresh_ids(&cached()).await;
        contract::create_rejects_invalid_draft(&cached()).await;
        contract::soup_lifecycle(&cached()).await;
        contract::missing_ids_are_not_found(&cached()).await;
        contract::find_by_tag_returns_exact_subset(&cached()).await;
    }

    #[tokio::test]
    async fn list_is_served_from_cache_until_a_write() {
        let inner = Arc::new(CountingStore::default());
        let store = CachedRecipeStore::new(
            inner.clone(),
            Arc::new(MemoryRecipeCache::new(Duration::from_secs(60), 16)),
        );

        store.create(contract::draft("a", &[])).await.unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 1);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
        assert_eq!(inner.lists.load(Ordering::SeqCst), 1);

        store.create(contract::draft("b", &[])).await.unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 2);
        assert_eq!(inner.lists.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn update_is_visible_through_cached_get() {
        let store = cached();
        let r = store.create(contract::draft("Soup", &["dinner"])).await.unwrap();
        assert_eq!(store.get_by_id(r.id).await.unwrap().name, "Soup");

        store.update(r.id, contract::draft("Stew", &[])).await.unwrap();
        assert_eq!(store.get_by_id(r.id).await.unwrap().name, "Stew");
    }

    #[tokio::test]
    async fn broken_cache_never_blocks_answers() {
        let store = CachedRecipeStore::new(Arc::new(MemoryRecipeStore::new()), Arc::new(BrokenCache));
        contract::soup_lifecycle(&store).await;
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_cache_expires_entries() {
        let cache = MemoryRecipeCache::new(Duration::from_millis(20), 16);
        cache.set("k", "v".into()).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_cache_evicts_oldest_when_full() {
        let cache = MemoryRecipeCache::new(Duration::from_secs(60), 2);
        cache.set("a", "1".into()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        cache.set("b", "2".into()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        cache.set("c", "3".into()).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), None);
        assert_eq!(cache.get("b").await.unwrap().as_deref(), Some("2"));
        assert_eq!(cache.get("c").await.unwrap().as_deref(), Some("3"));
    }
}
