use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use velyra_schemas::{
    generate_campaign_id, AccountHistory, AccountId, CampaignInput,
    CampaignRecord, CampaignStatus, ErrorHint, ErrorId, ErrorRecordOutcome, ErrorReport,
    HistoricalError, InsightHint, LearnOutcome, LearnedPattern, MemoryStatus, NicheIntelligence,
    NicheStatistics, PatternHint, PatternId, PatternType, RecommendationContext,
    RecommendedStrategy, Recommendations, SimilarCampaign, SimilarQuery, StrategyId,
    WinningStrategy,
};

use crate::cache::NicheStatsCache;
use crate::config::MemoryConfig;
use crate::database::{now_rfc3339, Database};
use crate::error::{MemoryError, Result};
use crate::scoring::{
    budget_recommendation, data_quality, extract_learnings, recommendation_confidence,
    success_score, CampaignMetrics,
};

pub const SERVICE_NAME: &str = "Velyra Memory";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Confidence every new pattern starts with
pub const INITIAL_PATTERN_CONFIDENCE: f64 = 0.5;

const KEY_HASH_LEN: usize = 12;

/// Long-lived memory of campaign outcomes.
///
/// Owns its database connection and the niche statistics cache. Construct one
/// per process at the entry point and pass it where it is needed.
pub struct VelyraMemory {
    db: Database,
    config: MemoryConfig,
    niche_cache: NicheStatsCache,
}

impl VelyraMemory {
    pub fn open(config: MemoryConfig) -> Result<Self> {
        let db = if config.is_in_memory() {
            Database::open_in_memory()?
        } else {
            if let Some(parent) = config.db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Database::new(&config.db_path)?
        };

        info!(
            "{} v{} ready at {}",
            SERVICE_NAME,
            SERVICE_VERSION,
            config.db_path.display()
        );

        Ok(Self {
            db,
            config,
            niche_cache: NicheStatsCache::new(),
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // ========== INGESTION ==========

    /// Score a finished campaign, store it and update accumulated knowledge
    pub fn learn_from_campaign(&mut self, input: CampaignInput) -> Result<LearnOutcome> {
        validate_campaign(&input)?;

        let campaign_id = input.id.clone().unwrap_or_else(generate_campaign_id);
        let metrics = CampaignMetrics::from_input(&input);
        let score = success_score(&metrics);
        let status = CampaignStatus::from_score(score);
        let learnings = extract_learnings(&input, &metrics, status);

        let now = now_rfc3339();
        let record = CampaignRecord {
            id: campaign_id.clone(),
            account_id: input.account_id.clone(),
            niche: input.niche.clone(),
            country: input.country.clone(),
            product_type: input.product_type.clone(),
            platform: input.platform.clone(),
            strategy: input.strategy.clone(),
            budget: input.budget,
            spend: input.spend,
            revenue: input.revenue,
            roas: metrics.derived_roas,
            cpa: metrics.derived_cpa,
            conversions: input.conversions,
            status,
            success_score: score,
            created_at: input.created_at.clone().unwrap_or_else(|| now.clone()),
            ended_at: now.clone(),
            learnings: learnings.clone(),
        };

        self.db.insert_campaign(&record)?;
        self.niche_cache.invalidate(&record.niche);

        if status == CampaignStatus::Winner {
            self.record_winning_strategy(&input, &metrics, &now)?;
        }

        self.record_patterns(&input, &metrics, status, &now)?;

        info!(
            "Learned campaign {} in {}/{}: {} (score {:.1})",
            campaign_id, record.niche, record.country, status, score
        );

        Ok(LearnOutcome {
            campaign_id,
            status,
            success_score: score,
            patterns_recorded: learnings.patterns.len(),
            insights_generated: learnings.insights.len(),
            learnings,
            memory_updated: true,
        })
    }

    fn record_winning_strategy(
        &self,
        input: &CampaignInput,
        metrics: &CampaignMetrics,
        now: &str,
    ) -> Result<WinningStrategy> {
        let observed = WinningStrategy {
            id: strategy_key(&input.strategy)?,
            niche: input.niche.clone(),
            country: input.country.clone(),
            platform: input.platform.clone(),
            strategy_type: input.strategy_type(),
            strategy_details: input.strategy.clone(),
            success_rate: 100.0,
            avg_roas: metrics.roas,
            times_used: 1,
            times_succeeded: 1,
            created_at: now.to_string(),
            last_used: now.to_string(),
        };

        self.db.record_winning_strategy(&observed)
    }

    fn record_patterns(
        &self,
        input: &CampaignInput,
        metrics: &CampaignMetrics,
        status: CampaignStatus,
        now: &str,
    ) -> Result<()> {
        let observations = [
            (
                PatternType::NicheCountry,
                format!("{}_{}", input.niche, input.country),
                json!({ "roas": metrics.roas }),
            ),
            (
                PatternType::PlatformStrategy,
                format!("{}_{}", input.platform, input.strategy_type()),
                json!({ "cpa": metrics.cpa }),
            ),
        ];

        for (pattern_type, key, context) in observations {
            let observed = LearnedPattern {
                id: pattern_key(pattern_type, &key),
                pattern_type: pattern_type.as_str().to_string(),
                pattern_key: key,
                pattern_value: status.as_str().to_string(),
                confidence: INITIAL_PATTERN_CONFIDENCE,
                occurrences: 1,
                last_seen: now.to_string(),
                context,
            };
            self.db.record_pattern(&observed)?;
        }

        Ok(())
    }

    /// Remember an error so later recommendations can warn about it
    pub fn record_error(&self, report: &ErrorReport) -> Result<ErrorRecordOutcome> {
        let observed = HistoricalError {
            id: error_key(&report.error_type, &report.context),
            error_type: report.error_type.clone(),
            context: report.context.clone(),
            cause: report.cause.clone(),
            solution: report.solution.clone(),
            prevention: report.prevention.clone(),
            occurrences: 1,
            last_occurred: now_rfc3339(),
        };

        let merged = self.db.record_error(&observed)?;

        Ok(ErrorRecordOutcome {
            error_id: merged.id,
            recorded: true,
            is_new: merged.occurrences == 1,
        })
    }

    // ========== QUERIES ==========

    /// Everything the memory knows about a niche/country/platform context
    pub fn get_recommendations(
        &self,
        niche: &str,
        country: &str,
        platform: &str,
        budget: f64,
    ) -> Result<Recommendations> {
        if !budget.is_finite() {
            return Err(MemoryError::InvalidInput(format!(
                "budget must be a finite number, got {}",
                budget
            )));
        }

        let limits = self.config.limits;

        let strategies = self
            .db
            .top_strategies(niche, country, platform, limits.strategies)?;
        let patterns = self.db.patterns_matching(niche, country, limits.patterns)?;
        let insights = self.db.niche_insights(niche, limits.insights)?;
        let errors = self.db.errors_matching(niche, platform, limits.errors)?;
        let avg_budget = self.db.avg_winner_budget(niche, country)?;

        let confidence_level =
            recommendation_confidence(strategies.len(), patterns.len(), insights.len());

        debug!(
            "Recommendations for {}/{}/{}: {} strategies, {} patterns, {} errors ({} confidence)",
            niche,
            country,
            platform,
            strategies.len(),
            patterns.len(),
            errors.len(),
            confidence_level.as_str()
        );

        Ok(Recommendations {
            timestamp: now_rfc3339(),
            context: RecommendationContext {
                niche: niche.to_string(),
                country: country.to_string(),
                platform: platform.to_string(),
                budget,
            },
            recommended_strategies: strategies
                .into_iter()
                .map(|s| RecommendedStrategy {
                    strategy_type: s.strategy_type,
                    details: s.strategy_details,
                    success_rate: s.success_rate,
                    avg_roas: s.avg_roas,
                    proven_times: s.times_succeeded,
                })
                .collect(),
            patterns_to_follow: patterns
                .into_iter()
                .map(|p| PatternHint {
                    pattern_type: p.pattern_type,
                    key: p.pattern_key,
                    value: p.pattern_value,
                    confidence: p.confidence,
                })
                .collect(),
            niche_insights: insights
                .into_iter()
                .map(|i| InsightHint {
                    insight_type: i.insight_type,
                    value: i.insight_value,
                    confidence: i.confidence,
                })
                .collect(),
            errors_to_avoid: errors
                .into_iter()
                .map(|e| ErrorHint {
                    error_type: e.error_type,
                    cause: e.cause,
                    prevention: e.prevention,
                })
                .collect(),
            budget_recommendation: budget_recommendation(avg_budget, budget),
            confidence_level,
        })
    }

    pub fn get_niche_intelligence(&mut self, niche: &str) -> Result<NicheIntelligence> {
        let db = &self.db;
        let statistics = self
            .niche_cache
            .get_or_load(niche, || db.niche_statistics(niche))?;

        let limit = self.config.limits.niche_rankings;
        let best_strategies = self.db.best_niche_strategies(niche, limit)?;
        let best_countries = self.db.best_niche_countries(niche, limit)?;

        Ok(NicheIntelligence {
            niche: niche.to_string(),
            timestamp: now_rfc3339(),
            data_quality: data_quality(statistics.total_campaigns),
            statistics,
            best_strategies,
            best_countries,
        })
    }

    pub fn get_account_history(&self, account_id: &AccountId) -> Result<AccountHistory> {
        let statistics = self.db.account_statistics(account_id)?;
        let recent_campaigns = self
            .db
            .recent_campaigns(account_id, self.config.limits.recent_campaigns)?;

        Ok(AccountHistory {
            account_id: account_id.clone(),
            statistics,
            recent_campaigns,
        })
    }

    pub fn get_similar_campaigns(&self, query: &SimilarQuery, limit: usize) -> Result<Vec<SimilarCampaign>> {
        if limit == 0 {
            return Err(MemoryError::InvalidInput("limit must be at least 1".to_string()));
        }
        self.db.similar_campaigns(query, limit)
    }

    /// Cached aggregates for a niche, without touching the database
    pub fn cached_niche_stats(&self, niche: &str) -> Option<&NicheStatistics> {
        self.niche_cache.get(niche)
    }

    pub fn system_status(&self) -> Result<MemoryStatus> {
        Ok(MemoryStatus {
            name: SERVICE_NAME.to_string(),
            version: SERVICE_VERSION.to_string(),
            db_path: self.config.db_path.display().to_string(),
            tables: self.db.table_counts()?,
            cached_niches: self.niche_cache.len(),
            timestamp: now_rfc3339(),
        })
    }
}

fn validate_campaign(input: &CampaignInput) -> Result<()> {
    let metrics = [
        ("budget", Some(input.budget)),
        ("spend", Some(input.spend)),
        ("revenue", Some(input.revenue)),
        ("roas", input.roas),
        ("cpa", input.cpa),
        ("target_cpa", input.target_cpa),
    ];

    for (name, value) in metrics {
        if let Some(value) = value {
            if !value.is_finite() {
                return Err(MemoryError::InvalidInput(format!(
                    "{} must be a finite number, got {}",
                    name, value
                )));
            }
        }
    }

    Ok(())
}

// ========== KEYS ==========

/// First 12 hex chars of the SHA-256 of `input`
fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(KEY_HASH_LEN);
    hex
}

/// Object keys serialize sorted, so equal strategies share a key
pub fn strategy_key(strategy: &Value) -> Result<StrategyId> {
    let canonical = serde_json::to_string(strategy)?;
    Ok(StrategyId(short_hash(&canonical)))
}

pub fn pattern_key(pattern_type: PatternType, key: &str) -> PatternId {
    PatternId(short_hash(&format!("{}_{}", pattern_type.as_str(), key)))
}

pub fn error_key(error_type: &str, context: &str) -> ErrorId {
    ErrorId(short_hash(&format!("{}_{}", error_type, context)))
}
