use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::{debug, info};
use velyra_schemas::{
    AccountId, AccountStatistics, CampaignId, CampaignRecord, CampaignStatus, CampaignSummary,
    CountryPerformance, ErrorId, HistoricalError, LearnedPattern, Learnings, NicheInsight,
    NicheStatistics, NicheStrategy, PatternId, SimilarCampaign, SimilarQuery, StrategyId,
    TableCounts, WinningStrategy,
};

use crate::error::{MemoryError, Result};
use crate::scoring::{percentage, round_to};

const CAMPAIGN_COLUMNS: &str = "id, account_id, niche, country, product_type, platform, strategy,
     budget, spend, revenue, roas, cpa, conversions, status, success_score,
     created_at, ended_at, learnings";

const STRATEGY_COLUMNS: &str = "id, niche, country, platform, strategy_type, strategy_details,
     success_rate, avg_roas, times_used, times_succeeded, created_at, last_used";

const PATTERN_COLUMNS: &str =
    "id, pattern_type, pattern_key, pattern_value, confidence, occurrences, last_seen, context";

const ERROR_COLUMNS: &str =
    "id, error_type, context, cause, solution, prevention, occurrences, last_occurred";

/// SQLite store behind Velyra Memory
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database file and make sure the schema exists
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        let db = Self { conn };
        db.init_schema()?;

        info!("Memory database initialized");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Create all tables and indexes
    fn init_schema(&self) -> Result<()> {
        // One row per finished campaign
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS campaigns_history (
                id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL,
                niche TEXT NOT NULL,
                country TEXT NOT NULL,
                product_type TEXT NOT NULL,
                platform TEXT NOT NULL,
                strategy TEXT NOT NULL,
                budget REAL NOT NULL DEFAULT 0,
                spend REAL NOT NULL DEFAULT 0,
                revenue REAL NOT NULL DEFAULT 0,
                roas REAL NOT NULL DEFAULT 0,
                cpa REAL NOT NULL DEFAULT 0,
                conversions INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                success_score REAL NOT NULL,
                created_at TEXT NOT NULL,
                ended_at TEXT NOT NULL,
                learnings TEXT NOT NULL
            )",
            [],
        )?;

        // Strategies that produced at least one winner, keyed by strategy hash
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS winning_strategies (
                id TEXT PRIMARY KEY,
                niche TEXT NOT NULL,
                country TEXT NOT NULL,
                platform TEXT NOT NULL,
                strategy_type TEXT NOT NULL,
                strategy_details TEXT NOT NULL,
                success_rate REAL NOT NULL,
                avg_roas REAL NOT NULL,
                times_used INTEGER NOT NULL DEFAULT 0,
                times_succeeded INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                last_used TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS learned_patterns (
                id TEXT PRIMARY KEY,
                pattern_type TEXT NOT NULL,
                pattern_key TEXT NOT NULL,
                pattern_value TEXT NOT NULL,
                confidence REAL NOT NULL,
                occurrences INTEGER NOT NULL DEFAULT 0,
                last_seen TEXT NOT NULL,
                context TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS historical_errors (
                id TEXT PRIMARY KEY,
                error_type TEXT NOT NULL,
                context TEXT NOT NULL,
                cause TEXT NOT NULL,
                solution TEXT NOT NULL,
                prevention TEXT NOT NULL,
                occurrences INTEGER NOT NULL DEFAULT 0,
                last_occurred TEXT NOT NULL
            )",
            [],
        )?;

        // Read by recommendations, never written
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS niche_insights (
                id TEXT PRIMARY KEY,
                niche TEXT,
                insight_type TEXT,
                insight_value TEXT,
                confidence REAL,
                data_points INTEGER,
                created_at TEXT,
                updated_at TEXT
            )",
            [],
        )?;

        // Indexes for the lookup columns
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_campaigns_niche ON campaigns_history(niche)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_campaigns_account ON campaigns_history(account_id, created_at DESC)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_campaigns_context ON campaigns_history(niche, country, platform)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_strategies_context ON winning_strategies(niche, country, platform)",
            [],
        )?;

        debug!("Memory schema initialized");
        Ok(())
    }

    // ========== CAMPAIGNS ==========

    /// Store a finished campaign. Re-learning the same id replaces the row.
    pub fn insert_campaign(&self, record: &CampaignRecord) -> Result<()> {
        let strategy_json = serde_json::to_string(&record.strategy)?;
        let learnings_json = serde_json::to_string(&record.learnings)?;

        self.conn.execute(
            "INSERT OR REPLACE INTO campaigns_history
                (id, account_id, niche, country, product_type, platform, strategy,
                 budget, spend, revenue, roas, cpa, conversions, status, success_score,
                 created_at, ended_at, learnings)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                record.id.0,
                record.account_id.0,
                record.niche,
                record.country,
                record.product_type,
                record.platform,
                strategy_json,
                record.budget,
                record.spend,
                record.revenue,
                record.roas,
                record.cpa,
                record.conversions,
                record.status.as_str(),
                record.success_score,
                record.created_at,
                record.ended_at,
                learnings_json,
            ],
        )?;

        debug!(
            "Inserted campaign: {} (status: {}, score: {})",
            record.id, record.status, record.success_score
        );
        Ok(())
    }

    pub fn get_campaign(&self, id: &CampaignId) -> Result<Option<CampaignRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM campaigns_history WHERE id = ?1", CAMPAIGN_COLUMNS),
                params![id.0],
                row_to_campaign,
            )
            .optional()?;

        Ok(record)
    }

    /// Best-scoring campaigns run in exactly the same context
    pub fn similar_campaigns(&self, query: &SimilarQuery, limit: usize) -> Result<Vec<SimilarCampaign>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, niche, country, platform, strategy, roas, cpa, status, learnings
             FROM campaigns_history
             WHERE niche = ?1 AND country = ?2 AND platform = ?3
             ORDER BY success_score DESC
             LIMIT ?4",
        )?;

        let campaigns = stmt
            .query_map(
                params![query.niche, query.country, query.platform, limit],
                |row| {
                    Ok(SimilarCampaign {
                        id: CampaignId(row.get(0)?),
                        niche: row.get(1)?,
                        country: row.get(2)?,
                        platform: row.get(3)?,
                        strategy: json_column(row, 4)?,
                        roas: round_to(row.get(5)?, 2),
                        cpa: round_to(row.get(6)?, 2),
                        status: status_column(row, 7)?,
                        learnings: json_column(row, 8)?,
                    })
                },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(campaigns)
    }

    // ========== WINNING STRATEGIES ==========

    /// Record one more win for a strategy and return the merged row.
    ///
    /// `observed` carries this campaign's values; counters, the running ROAS
    /// average and the success rate are merged in a single statement.
    pub fn record_winning_strategy(&self, observed: &WinningStrategy) -> Result<WinningStrategy> {
        let details_json = serde_json::to_string(&observed.strategy_details)?;

        let merged = self.conn.query_row(
            &format!(
                "INSERT INTO winning_strategies
                    (id, niche, country, platform, strategy_type, strategy_details,
                     success_rate, avg_roas, times_used, times_succeeded, created_at, last_used)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 100.0, ?7, 1, 1, ?8, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                    niche = excluded.niche,
                    country = excluded.country,
                    platform = excluded.platform,
                    strategy_type = excluded.strategy_type,
                    strategy_details = excluded.strategy_details,
                    avg_roas = (avg_roas * times_succeeded + excluded.avg_roas) / (times_succeeded + 1),
                    success_rate = 100.0 * (times_succeeded + 1) / (times_used + 1),
                    times_used = times_used + 1,
                    times_succeeded = times_succeeded + 1,
                    last_used = excluded.last_used
                 RETURNING {}",
                STRATEGY_COLUMNS
            ),
            params![
                observed.id.0,
                observed.niche,
                observed.country,
                observed.platform,
                observed.strategy_type,
                details_json,
                observed.avg_roas,
                observed.last_used,
            ],
            row_to_strategy,
        )?;

        debug!(
            "Recorded winning strategy: {} (used {} times)",
            merged.id, merged.times_used
        );
        Ok(merged)
    }

    pub fn get_winning_strategy(&self, id: &StrategyId) -> Result<Option<WinningStrategy>> {
        let strategy = self
            .conn
            .query_row(
                &format!("SELECT {} FROM winning_strategies WHERE id = ?1", STRATEGY_COLUMNS),
                params![id.0],
                row_to_strategy,
            )
            .optional()?;

        Ok(strategy)
    }

    pub fn top_strategies(
        &self,
        niche: &str,
        country: &str,
        platform: &str,
        limit: usize,
    ) -> Result<Vec<WinningStrategy>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {}
             FROM winning_strategies
             WHERE niche = ?1 AND country = ?2 AND platform = ?3
             ORDER BY success_rate DESC, avg_roas DESC
             LIMIT ?4",
            STRATEGY_COLUMNS
        ))?;

        let strategies = stmt
            .query_map(params![niche, country, platform, limit], row_to_strategy)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(strategies)
    }

    // ========== LEARNED PATTERNS ==========

    /// Upsert a pattern observation. Confidence keeps its first value.
    pub fn record_pattern(&self, observed: &LearnedPattern) -> Result<LearnedPattern> {
        let context_json = serde_json::to_string(&observed.context)?;

        let merged = self.conn.query_row(
            &format!(
                "INSERT INTO learned_patterns
                    (id, pattern_type, pattern_key, pattern_value, confidence, occurrences, last_seen, context)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    pattern_value = excluded.pattern_value,
                    occurrences = occurrences + 1,
                    last_seen = excluded.last_seen,
                    context = excluded.context
                 RETURNING {}",
                PATTERN_COLUMNS
            ),
            params![
                observed.id.0,
                observed.pattern_type,
                observed.pattern_key,
                observed.pattern_value,
                observed.confidence,
                observed.last_seen,
                context_json,
            ],
            row_to_pattern,
        )?;

        debug!(
            "Recorded pattern: {} {} -> {} (x{})",
            merged.pattern_type, merged.pattern_key, merged.pattern_value, merged.occurrences
        );
        Ok(merged)
    }

    pub fn get_pattern(&self, id: &PatternId) -> Result<Option<LearnedPattern>> {
        let pattern = self
            .conn
            .query_row(
                &format!("SELECT {} FROM learned_patterns WHERE id = ?1", PATTERN_COLUMNS),
                params![id.0],
                row_to_pattern,
            )
            .optional()?;

        Ok(pattern)
    }

    /// Patterns whose key contains either fragment
    pub fn patterns_matching(&self, first: &str, second: &str, limit: usize) -> Result<Vec<LearnedPattern>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {}
             FROM learned_patterns
             WHERE pattern_key LIKE ?1 OR pattern_key LIKE ?2
             ORDER BY confidence DESC, occurrences DESC
             LIMIT ?3",
            PATTERN_COLUMNS
        ))?;

        let patterns = stmt
            .query_map(
                params![contains(first), contains(second), limit],
                row_to_pattern,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(patterns)
    }

    // ========== NICHE INSIGHTS ==========

    pub fn niche_insights(&self, niche: &str, limit: usize) -> Result<Vec<NicheInsight>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, niche, insight_type, insight_value, confidence, data_points, created_at, updated_at
             FROM niche_insights
             WHERE niche = ?1
             ORDER BY confidence DESC
             LIMIT ?2",
        )?;

        let insights = stmt
            .query_map(params![niche, limit], |row| {
                Ok(NicheInsight {
                    id: row.get(0)?,
                    niche: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    insight_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    insight_value: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    confidence: row.get::<_, Option<f64>>(4)?.unwrap_or_default(),
                    data_points: row.get::<_, Option<u64>>(5)?.unwrap_or_default(),
                    created_at: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                    updated_at: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(insights)
    }

    // ========== HISTORICAL ERRORS ==========

    /// Insert a new error or bump the occurrence count of a known one.
    /// Details of a known error are left as first reported.
    pub fn record_error(&self, observed: &HistoricalError) -> Result<HistoricalError> {
        let merged = self.conn.query_row(
            &format!(
                "INSERT INTO historical_errors
                    (id, error_type, context, cause, solution, prevention, occurrences, last_occurred)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    occurrences = occurrences + 1,
                    last_occurred = excluded.last_occurred
                 RETURNING {}",
                ERROR_COLUMNS
            ),
            params![
                observed.id.0,
                observed.error_type,
                observed.context,
                observed.cause,
                observed.solution,
                observed.prevention,
                observed.last_occurred,
            ],
            row_to_error,
        )?;

        debug!("Recorded error: {} (x{})", merged.id, merged.occurrences);
        Ok(merged)
    }

    pub fn get_error(&self, id: &ErrorId) -> Result<Option<HistoricalError>> {
        let error = self
            .conn
            .query_row(
                &format!("SELECT {} FROM historical_errors WHERE id = ?1", ERROR_COLUMNS),
                params![id.0],
                row_to_error,
            )
            .optional()?;

        Ok(error)
    }

    /// Errors whose context mentions either fragment, most frequent first
    pub fn errors_matching(&self, first: &str, second: &str, limit: usize) -> Result<Vec<HistoricalError>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {}
             FROM historical_errors
             WHERE context LIKE ?1 OR context LIKE ?2
             ORDER BY occurrences DESC
             LIMIT ?3",
            ERROR_COLUMNS
        ))?;

        let errors = stmt
            .query_map(
                params![contains(first), contains(second), limit],
                row_to_error,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(errors)
    }

    // ========== AGGREGATES ==========

    pub fn niche_statistics(&self, niche: &str) -> Result<NicheStatistics> {
        let stats = self.conn.query_row(
            "SELECT
                COUNT(*),
                AVG(roas),
                AVG(cpa),
                SUM(CASE WHEN status = 'winner' THEN 1 ELSE 0 END),
                SUM(spend),
                SUM(revenue)
             FROM campaigns_history
             WHERE niche = ?1",
            params![niche],
            |row| {
                let total: u64 = row.get(0)?;
                let winners: Option<u64> = row.get(3)?;
                Ok(NicheStatistics {
                    total_campaigns: total,
                    avg_roas: round_to(row.get::<_, Option<f64>>(1)?.unwrap_or(0.0), 2),
                    avg_cpa: round_to(row.get::<_, Option<f64>>(2)?.unwrap_or(0.0), 2),
                    winner_rate: percentage(winners.unwrap_or(0), total),
                    total_spend: round_to(row.get::<_, Option<f64>>(4)?.unwrap_or(0.0), 2),
                    total_revenue: round_to(row.get::<_, Option<f64>>(5)?.unwrap_or(0.0), 2),
                })
            },
        )?;

        Ok(stats)
    }

    /// Winning strategy blobs of a niche ranked by average ROAS
    pub fn best_niche_strategies(&self, niche: &str, limit: usize) -> Result<Vec<NicheStrategy>> {
        let mut stmt = self.conn.prepare(
            "SELECT strategy, AVG(roas) AS avg_roas, COUNT(*) AS uses
             FROM campaigns_history
             WHERE niche = ?1 AND status = 'winner'
             GROUP BY strategy
             ORDER BY avg_roas DESC
             LIMIT ?2",
        )?;

        let strategies = stmt
            .query_map(params![niche, limit], |row| {
                Ok(NicheStrategy {
                    strategy: json_column(row, 0)?,
                    avg_roas: round_to(row.get(1)?, 2),
                    times_used: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(strategies)
    }

    pub fn best_niche_countries(&self, niche: &str, limit: usize) -> Result<Vec<CountryPerformance>> {
        let mut stmt = self.conn.prepare(
            "SELECT country, AVG(roas) AS avg_roas, COUNT(*) AS campaigns
             FROM campaigns_history
             WHERE niche = ?1
             GROUP BY country
             ORDER BY avg_roas DESC
             LIMIT ?2",
        )?;

        let countries = stmt
            .query_map(params![niche, limit], |row| {
                Ok(CountryPerformance {
                    country: row.get(0)?,
                    avg_roas: round_to(row.get(1)?, 2),
                    campaigns: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(countries)
    }

    pub fn account_statistics(&self, account_id: &AccountId) -> Result<AccountStatistics> {
        let stats = self.conn.query_row(
            "SELECT
                COUNT(*),
                AVG(roas),
                SUM(spend),
                SUM(revenue),
                SUM(conversions),
                SUM(CASE WHEN status = 'winner' THEN 1 ELSE 0 END)
             FROM campaigns_history
             WHERE account_id = ?1",
            params![account_id.0],
            |row| {
                let total: u64 = row.get(0)?;
                let winners: Option<u64> = row.get(5)?;
                Ok(AccountStatistics {
                    total_campaigns: total,
                    avg_roas: round_to(row.get::<_, Option<f64>>(1)?.unwrap_or(0.0), 2),
                    total_spend: round_to(row.get::<_, Option<f64>>(2)?.unwrap_or(0.0), 2),
                    total_revenue: round_to(row.get::<_, Option<f64>>(3)?.unwrap_or(0.0), 2),
                    total_conversions: row.get::<_, Option<u64>>(4)?.unwrap_or(0),
                    success_rate: percentage(winners.unwrap_or(0), total),
                })
            },
        )?;

        Ok(stats)
    }

    pub fn recent_campaigns(&self, account_id: &AccountId, limit: usize) -> Result<Vec<CampaignSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, niche, roas, status, created_at
             FROM campaigns_history
             WHERE account_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;

        let campaigns = stmt
            .query_map(params![account_id.0, limit], |row| {
                Ok(CampaignSummary {
                    id: CampaignId(row.get(0)?),
                    niche: row.get(1)?,
                    roas: round_to(row.get(2)?, 2),
                    status: status_column(row, 3)?,
                    date: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(campaigns)
    }

    /// Average budget of winners in a niche and country, if any
    pub fn avg_winner_budget(&self, niche: &str, country: &str) -> Result<Option<f64>> {
        let avg = self.conn.query_row(
            "SELECT AVG(budget)
             FROM campaigns_history
             WHERE niche = ?1 AND country = ?2 AND status = 'winner'",
            params![niche, country],
            |row| row.get::<_, Option<f64>>(0),
        )?;

        Ok(avg)
    }

    pub fn table_counts(&self) -> Result<TableCounts> {
        Ok(TableCounts {
            campaigns_history: self.count_rows("campaigns_history")?,
            winning_strategies: self.count_rows("winning_strategies")?,
            learned_patterns: self.count_rows("learned_patterns")?,
            historical_errors: self.count_rows("historical_errors")?,
            niche_insights: self.count_rows("niche_insights")?,
        })
    }

    fn count_rows(&self, table: &str) -> Result<u64> {
        let count: u64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Current time in the format every timestamp column uses
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn contains(fragment: &str) -> String {
    format!("%{}%", fragment)
}

fn row_to_campaign(row: &Row) -> rusqlite::Result<CampaignRecord> {
    let learnings: Learnings = json_column(row, 17)?;

    Ok(CampaignRecord {
        id: CampaignId(row.get(0)?),
        account_id: AccountId(row.get(1)?),
        niche: row.get(2)?,
        country: row.get(3)?,
        product_type: row.get(4)?,
        platform: row.get(5)?,
        strategy: json_column(row, 6)?,
        budget: row.get(7)?,
        spend: row.get(8)?,
        revenue: row.get(9)?,
        roas: row.get(10)?,
        cpa: row.get(11)?,
        conversions: row.get(12)?,
        status: status_column(row, 13)?,
        success_score: row.get(14)?,
        created_at: row.get(15)?,
        ended_at: row.get(16)?,
        learnings,
    })
}

fn row_to_strategy(row: &Row) -> rusqlite::Result<WinningStrategy> {
    Ok(WinningStrategy {
        id: StrategyId(row.get(0)?),
        niche: row.get(1)?,
        country: row.get(2)?,
        platform: row.get(3)?,
        strategy_type: row.get(4)?,
        strategy_details: json_column(row, 5)?,
        success_rate: row.get(6)?,
        avg_roas: row.get(7)?,
        times_used: row.get(8)?,
        times_succeeded: row.get(9)?,
        created_at: row.get(10)?,
        last_used: row.get(11)?,
    })
}

fn row_to_pattern(row: &Row) -> rusqlite::Result<LearnedPattern> {
    Ok(LearnedPattern {
        id: PatternId(row.get(0)?),
        pattern_type: row.get(1)?,
        pattern_key: row.get(2)?,
        pattern_value: row.get(3)?,
        confidence: row.get(4)?,
        occurrences: row.get(5)?,
        last_seen: row.get(6)?,
        context: json_column(row, 7)?,
    })
}

fn row_to_error(row: &Row) -> rusqlite::Result<HistoricalError> {
    Ok(HistoricalError {
        id: ErrorId(row.get(0)?),
        error_type: row.get(1)?,
        context: row.get(2)?,
        cause: row.get(3)?,
        solution: row.get(4)?,
        prevention: row.get(5)?,
        occurrences: row.get(6)?,
        last_occurred: row.get(7)?,
    })
}

/// Decode a JSON text column; NULL or empty text reads as the default
fn json_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    let raw: Option<String> = row.get(idx)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(T::default()),
        Some(text) => serde_json::from_str(text).map_err(|e| json_error(idx, e)),
    }
}

fn status_column(row: &Row, idx: usize) -> rusqlite::Result<CampaignStatus> {
    let raw: String = row.get(idx)?;
    CampaignStatus::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            Box::new(MemoryError::UnknownStatus(raw)),
        )
    })
}

fn json_error(idx: usize, err: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::NamedTempFile;
    use velyra_schemas::generate_campaign_id;

    fn campaign(account: &str, niche: &str, status: CampaignStatus, roas: f64) -> CampaignRecord {
        let now = now_rfc3339();
        CampaignRecord {
            id: generate_campaign_id(),
            account_id: AccountId(account.to_string()),
            niche: niche.to_string(),
            country: "BR".to_string(),
            product_type: "digital".to_string(),
            platform: "facebook".to_string(),
            strategy: json!({"type": "broad"}),
            budget: 1000.0,
            spend: 1000.0,
            revenue: 1000.0 * roas,
            roas,
            cpa: 20.0,
            conversions: 50,
            status,
            success_score: 75.0,
            created_at: now.clone(),
            ended_at: now,
            learnings: Learnings::default(),
        }
    }

    fn strategy(id: &str, roas: f64) -> WinningStrategy {
        let now = now_rfc3339();
        WinningStrategy {
            id: StrategyId(id.to_string()),
            niche: "ecommerce".into(),
            country: "BR".into(),
            platform: "facebook".into(),
            strategy_type: "broad".into(),
            strategy_details: json!({"type": "broad"}),
            success_rate: 100.0,
            avg_roas: roas,
            times_used: 1,
            times_succeeded: 1,
            created_at: now.clone(),
            last_used: now,
        }
    }

    #[test]
    fn test_database_creation() {
        let temp = NamedTempFile::new().unwrap();
        let db = Database::new(temp.path()).unwrap();

        let counts = db.table_counts().unwrap();
        assert_eq!(counts.campaigns_history, 0);
        assert_eq!(counts.niche_insights, 0);

        // Reopening keeps the schema idempotent
        drop(db);
        Database::new(temp.path()).unwrap();
    }

    #[test]
    fn test_campaign_insert_and_retrieve() {
        let db = Database::open_in_memory().unwrap();
        let record = campaign("acc_1", "ecommerce", CampaignStatus::Winner, 3.2);

        db.insert_campaign(&record).unwrap();
        db.insert_campaign(&record).unwrap();
        assert_eq!(db.table_counts().unwrap().campaigns_history, 1);

        let stored = db.get_campaign(&record.id).unwrap().unwrap();
        assert_eq!(stored.status, CampaignStatus::Winner);
        assert_eq!(stored.strategy, json!({"type": "broad"}));
        assert_eq!(stored.conversions, 50);
    }

    #[test]
    fn test_unknown_status_is_reported() {
        let db = Database::open_in_memory().unwrap();
        let record = campaign("acc_1", "ecommerce", CampaignStatus::Average, 1.6);
        db.insert_campaign(&record).unwrap();

        db.conn
            .execute(
                "UPDATE campaigns_history SET status = 'scaled' WHERE id = ?1",
                params![record.id.0],
            )
            .unwrap();

        match db.get_campaign(&record.id) {
            Err(MemoryError::UnknownStatus(raw)) => assert_eq!(raw, "scaled"),
            other => panic!("expected unknown status, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_winning_strategy_merges_counters() {
        let db = Database::open_in_memory().unwrap();

        let first = db.record_winning_strategy(&strategy("abc123def456", 3.0)).unwrap();
        assert_eq!(first.times_used, 1);
        assert_eq!(first.avg_roas, 3.0);

        let second = db.record_winning_strategy(&strategy("abc123def456", 5.0)).unwrap();
        assert_eq!(second.times_used, 2);
        assert_eq!(second.times_succeeded, 2);
        assert_eq!(second.avg_roas, 4.0);
        assert_eq!(second.success_rate, 100.0);
        assert_eq!(second.created_at, first.created_at);

        let top = db.top_strategies("ecommerce", "BR", "facebook", 5).unwrap();
        assert_eq!(top.len(), 1);
        assert!(db.top_strategies("ecommerce", "US", "facebook", 5).unwrap().is_empty());
    }

    #[test]
    fn test_pattern_confidence_is_sticky() {
        let db = Database::open_in_memory().unwrap();
        let mut observed = LearnedPattern {
            id: PatternId("p1".into()),
            pattern_type: "niche_country".into(),
            pattern_key: "ecommerce_BR".into(),
            pattern_value: "winner".into(),
            confidence: 0.5,
            occurrences: 1,
            last_seen: now_rfc3339(),
            context: json!({"roas": 3.0}),
        };

        db.record_pattern(&observed).unwrap();
        observed.pattern_value = "loser".into();
        observed.confidence = 0.9;
        let merged = db.record_pattern(&observed).unwrap();

        assert_eq!(merged.occurrences, 2);
        assert_eq!(merged.confidence, 0.5);
        assert_eq!(merged.pattern_value, "loser");

        assert_eq!(db.patterns_matching("ecommerce", "US", 10).unwrap().len(), 1);
        assert_eq!(db.patterns_matching("BR", "zzz", 10).unwrap().len(), 1);
        assert!(db.patterns_matching("saas", "US", 10).unwrap().is_empty());
    }

    #[test]
    fn test_error_dedup() {
        let db = Database::open_in_memory().unwrap();
        let observed = HistoricalError {
            id: ErrorId("e1".into()),
            error_type: "pixel".into(),
            context: "ecommerce facebook".into(),
            cause: "missing event".into(),
            solution: "reinstall".into(),
            prevention: "verify events".into(),
            occurrences: 1,
            last_occurred: now_rfc3339(),
        };

        assert_eq!(db.record_error(&observed).unwrap().occurrences, 1);
        assert_eq!(db.record_error(&observed).unwrap().occurrences, 2);

        let matching = db.errors_matching("ecommerce", "tiktok", 5).unwrap();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].cause, "missing event");
    }

    #[test]
    fn test_aggregates_on_empty_store() {
        let db = Database::open_in_memory().unwrap();

        let stats = db.niche_statistics("nothing").unwrap();
        assert_eq!(stats, NicheStatistics::default());

        let account = db.account_statistics(&AccountId("ghost".into())).unwrap();
        assert_eq!(account, AccountStatistics::default());

        assert!(db.avg_winner_budget("nothing", "BR").unwrap().is_none());
        assert!(db.niche_insights("nothing", 5).unwrap().is_empty());
    }

    #[test]
    fn test_niche_aggregates() {
        let db = Database::open_in_memory().unwrap();
        db.insert_campaign(&campaign("a", "ecommerce", CampaignStatus::Winner, 4.0)).unwrap();
        db.insert_campaign(&campaign("a", "ecommerce", CampaignStatus::Loser, 0.5)).unwrap();
        db.insert_campaign(&campaign("b", "saas", CampaignStatus::Winner, 3.0)).unwrap();

        let stats = db.niche_statistics("ecommerce").unwrap();
        assert_eq!(stats.total_campaigns, 2);
        assert_eq!(stats.avg_roas, 2.25);
        assert_eq!(stats.winner_rate, 50.0);
        assert_eq!(stats.total_spend, 2000.0);

        let strategies = db.best_niche_strategies("ecommerce", 5).unwrap();
        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].times_used, 1);

        let countries = db.best_niche_countries("ecommerce", 5).unwrap();
        assert_eq!(countries[0].country, "BR");
        assert_eq!(countries[0].campaigns, 2);

        assert_eq!(db.avg_winner_budget("ecommerce", "BR").unwrap(), Some(1000.0));
    }
}
