pub mod analyzer;
pub mod domain;
pub mod error;
pub mod numeric;
pub mod storage;
pub mod verdict;

pub mod config {
    use crate::analyzer::PageLimits;
    use anyhow::Context;
    use std::time::Duration;

    const DEFAULT_LIMIT: u32 = 25;
    const MAX_LIMIT: u32 = 100;
    const CACHE_TTL_SECS: u64 = 15;
    const PORT: u16 = 3000;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub page_limits: PageLimits,
        pub cache_ttl: Duration,
        pub port: u16,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|k| std::env::var(k).ok())
        }

        pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
            let default_limit = parse_or(&get, "ANALYZER_DEFAULT_LIMIT", DEFAULT_LIMIT)?;
            let max_limit = parse_or(&get, "ANALYZER_MAX_LIMIT", MAX_LIMIT)?;
            anyhow::ensure!(max_limit >= 1, "ANALYZER_MAX_LIMIT must be >= 1");
            anyhow::ensure!(
                (1..=max_limit).contains(&default_limit),
                "ANALYZER_DEFAULT_LIMIT must be within 1..={max_limit} (got {default_limit})"
            );
            let cache_ttl_secs = parse_or(&get, "ANALYZER_CACHE_TTL_SECS", CACHE_TTL_SECS)?;
            let port = parse_or(&get, "PORT", PORT)?;

            Ok(Self {
                database_url: get("DATABASE_URL").filter(|s| !s.trim().is_empty()),
                sentry_dsn: get("SENTRY_DSN").filter(|s| !s.trim().is_empty()),
                page_limits: PageLimits {
                    default_limit,
                    max_limit,
                },
                cache_ttl: Duration::from_secs(cache_ttl_secs),
                port,
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }
    }

    fn parse_or<T: std::str::FromStr>(
        get: &impl Fn(&str) -> Option<String>,
        key: &str,
        default: T,
    ) -> anyhow::Result<T>
    where
        T::Err: std::fmt::Display,
    {
        match get(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
            Some(raw) => raw
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("invalid {key}={raw:?}: {e}")),
            None => Ok(default),
        }
    }

}
