use std::str::FromStr;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_window_seconds: i64,
    pub refresh_extend_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => anyhow::bail!("unknown RECIPE_STORE {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    None,
    Memory,
    Redis,
}

impl FromStr for CacheBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "off" => Ok(Self::None),
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => anyhow::bail!("unknown CACHE_BACKEND {other:?}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub redis_url: String,
    pub ttl_seconds: u64,
    pub max_entries: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub cache: CacheConfig,
    pub seed_file: Option<String>,
    pub session_cookie: String,
    pub session_ttl_minutes: i64,
    pub jwt: JwtConfig,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok();
        let store = match std::env::var("RECIPE_STORE") {
            Ok(v) => v.parse()?,
            Err(_) if database_url.is_some() => StoreBackend::Postgres,
            Err(_) => StoreBackend::Memory,
        };
        if store == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("RECIPE_STORE=postgres requires DATABASE_URL");
        }

        let cache = CacheConfig {
            backend: match std::env::var("CACHE_BACKEND") {
                Ok(v) => v.parse()?,
                Err(_) => CacheBackend::None,
            },
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            ttl_seconds: env_or("CACHE_TTL_SECONDS", 60),
            max_entries: env_or("CACHE_MAX_ENTRIES", 1024),
        };

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "recipes".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "recipes-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 10),
            refresh_window_seconds: env_or("JWT_REFRESH_WINDOW_SECONDS", 30),
            refresh_extend_minutes: env_or("JWT_REFRESH_EXTEND_MINUTES", 5),
        };

        Ok(Self {
            store,
            database_url,
            cache,
            seed_file: std::env::var("RECIPES_SEED_FILE").ok(),
            session_cookie: std::env::var("SESSION_COOKIE")
                .unwrap_or_else(|_| "recipes_api".into()),
            session_ttl_minutes: env_or("SESSION_TTL_MINUTES", 24 * 60),
            jwt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_names() {
        assert_eq!("Memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("postgresql".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert!("mongo".parse::<StoreBackend>().is_err());

        assert_eq!("".parse::<CacheBackend>().unwrap(), CacheBackend::None);
        assert_eq!("REDIS".parse::<CacheBackend>().unwrap(), CacheBackend::Redis);
        assert!("memcached".parse::<CacheBackend>().is_err());
    }
}
