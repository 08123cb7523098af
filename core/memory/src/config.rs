use std::path::PathBuf;
use tracing::debug;

pub const DEFAULT_DB_FILE: &str = "velyra_memory.db";
const IN_MEMORY: &str = ":memory:";

/// Row limits applied by the read paths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub strategies: usize,
    pub patterns: usize,
    pub insights: usize,
    pub errors: usize,
    pub niche_rankings: usize,
    pub recent_campaigns: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            strategies: 5,
            patterns: 10,
            insights: 5,
            errors: 5,
            niche_rankings: 5,
            recent_campaigns: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryConfig {
    pub db_path: PathBuf,
    pub limits: QueryLimits,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            limits: QueryLimits::default(),
        }
    }
}

impl MemoryConfig {
    pub fn new<P: Into<PathBuf>>(db_path: P) -> Self {
        Self {
            db_path: db_path.into(),
            ..Default::default()
        }
    }

    /// Non-persistent store, mostly for tests
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY)
    }

    /// Read `VELYRA_DB_PATH` and `VELYRA_RECENT_LIMIT`, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("VELYRA_DB_PATH") {
            if !path.trim().is_empty() {
                config.db_path = PathBuf::from(path);
            }
        }

        if let Some(raw) = lookup("VELYRA_RECENT_LIMIT") {
            match raw.trim().parse::<usize>() {
                Ok(limit) if limit > 0 => config.limits.recent_campaigns = limit,
                _ => debug!("Ignoring invalid VELYRA_RECENT_LIMIT '{}'", raw),
            }
        }

        config
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path.as_os_str() == IN_MEMORY
    }
}
