pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod memory;
pub mod scoring;

pub use cache::NicheStatsCache;
pub use config::{MemoryConfig, QueryLimits, DEFAULT_DB_FILE};
pub use database::Database;
pub use error::{MemoryError, Result};
pub use memory::{error_key, pattern_key, strategy_key, VelyraMemory, SERVICE_NAME, SERVICE_VERSION};
pub use scoring::{success_score, CampaignMetrics};
