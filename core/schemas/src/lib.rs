use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ============================================================================
// ID Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CampaignId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorId(pub String);

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ErrorId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Defaults shared by inputs
// ============================================================================

pub const DEFAULT_ACCOUNT: &str = "default";
pub const DEFAULT_NICHE: &str = "geral";
pub const DEFAULT_COUNTRY: &str = "BR";
pub const DEFAULT_PRODUCT_TYPE: &str = "digital";
pub const DEFAULT_PLATFORM: &str = "facebook";
pub const DEFAULT_STRATEGY_TYPE: &str = "default";

fn default_account() -> AccountId {
    AccountId(DEFAULT_ACCOUNT.to_string())
}

fn default_niche() -> String {
    DEFAULT_NICHE.to_string()
}

fn default_country() -> String {
    DEFAULT_COUNTRY.to_string()
}

fn default_product_type() -> String {
    DEFAULT_PRODUCT_TYPE.to_string()
}

fn default_platform() -> String {
    DEFAULT_PLATFORM.to_string()
}

fn default_strategy() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_error_type() -> String {
    "unknown".to_string()
}

// ============================================================================
// Campaign Schema
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignStatus {
    #[serde(rename = "winner")]
    Winner,
    #[serde(rename = "average")]
    Average,
    #[serde(rename = "loser")]
    Loser,
}

impl CampaignStatus {
    pub const WINNER_CUTOFF: f64 = 70.0;
    pub const AVERAGE_CUTOFF: f64 = 50.0;

    /// Bucket a 0-100 success score
    pub fn from_score(score: f64) -> Self {
        if score >= Self::WINNER_CUTOFF {
            CampaignStatus::Winner
        } else if score >= Self::AVERAGE_CUTOFF {
            CampaignStatus::Average
        } else {
            CampaignStatus::Loser
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "winner" => Some(CampaignStatus::Winner),
            "average" => Some(CampaignStatus::Average),
            "loser" => Some(CampaignStatus::Loser),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Winner => "winner",
            CampaignStatus::Average => "average",
            CampaignStatus::Loser => "loser",
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Campaign outcome as reported by the caller when a campaign ends.
///
/// Every field is optional on the wire. `roas` and `cpa` override the values
/// derived from spend/revenue/conversions when scoring; the derived values are
/// what gets stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignInput {
    #[serde(default)]
    pub id: Option<CampaignId>,
    #[serde(default = "default_account")]
    pub account_id: AccountId,
    #[serde(default = "default_niche")]
    pub niche: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_product_type")]
    pub product_type: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_strategy")]
    pub strategy: Value,
    #[serde(default)]
    pub budget: f64,
    #[serde(default)]
    pub spend: f64,
    #[serde(default)]
    pub revenue: f64,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub conversions: u64,
    #[serde(default)]
    pub roas: Option<f64>,
    #[serde(default)]
    pub cpa: Option<f64>,
    #[serde(default)]
    pub target_cpa: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>, // RFC3339
}

impl Default for CampaignInput {
    fn default() -> Self {
        Self {
            id: None,
            account_id: default_account(),
            niche: default_niche(),
            country: default_country(),
            product_type: default_product_type(),
            platform: default_platform(),
            strategy: default_strategy(),
            budget: 0.0,
            spend: 0.0,
            revenue: 0.0,
            conversions: 0,
            roas: None,
            cpa: None,
            target_cpa: None,
            created_at: None,
        }
    }
}

impl CampaignInput {
    /// `strategy.type`, or "default" when the blob carries none
    pub fn strategy_type(&self) -> String {
        strategy_type_of(&self.strategy)
    }
}

/// Counts may arrive as `50` or `50.0`. Fractional or negative counts are
/// rejected rather than truncated.
fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Null => Ok(0),
        Value::Number(n) => match (n.as_u64(), n.as_f64()) {
            (Some(count), _) => Ok(count),
            (None, Some(f)) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
                Ok(f as u64)
            }
            _ => Err(serde::de::Error::custom(format!(
                "expected a whole non-negative count, got {}",
                value
            ))),
        },
        other => Err(serde::de::Error::custom(format!(
            "expected a whole non-negative count, got {}",
            other
        ))),
    }
}

pub fn strategy_type_of(strategy: &Value) -> String {
    strategy
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_STRATEGY_TYPE)
        .to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub id: CampaignId,
    pub account_id: AccountId,
    pub niche: String,
    pub country: String,
    pub product_type: String,
    pub platform: String,
    pub strategy: Value,
    pub budget: f64,
    pub spend: f64,
    pub revenue: f64,
    pub roas: f64,
    pub cpa: f64,
    pub conversions: u64,
    pub status: CampaignStatus,
    pub success_score: f64,
    pub created_at: String, // RFC3339
    pub ended_at: String,   // RFC3339
    pub learnings: Learnings,
}

// ============================================================================
// Learnings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternKind {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "failure")]
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPattern {
    #[serde(rename = "type")]
    pub kind: PatternKind,
    pub factor: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Learnings {
    pub patterns: Vec<LearningPattern>,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
}

// ============================================================================
// Accumulated Knowledge
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinningStrategy {
    pub id: StrategyId,
    pub niche: String,
    pub country: String,
    pub platform: String,
    pub strategy_type: String,
    pub strategy_details: Value,
    pub success_rate: f64,
    pub avg_roas: f64,
    pub times_used: u64,
    pub times_succeeded: u64,
    pub created_at: String, // RFC3339
    pub last_used: String,  // RFC3339
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternType {
    #[serde(rename = "niche_country")]
    NicheCountry,
    #[serde(rename = "platform_strategy")]
    PlatformStrategy,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::NicheCountry => "niche_country",
            PatternType::PlatformStrategy => "platform_strategy",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub id: PatternId,
    pub pattern_type: String,
    pub pattern_key: String,
    pub pattern_value: String,
    pub confidence: f64,
    pub occurrences: u64,
    pub last_seen: String, // RFC3339
    pub context: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalError {
    pub id: ErrorId,
    pub error_type: String,
    pub context: String,
    pub cause: String,
    pub solution: String,
    pub prevention: String,
    pub occurrences: u64,
    pub last_occurred: String, // RFC3339
}

/// Declared in the store but never written by any ingestion path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NicheInsight {
    pub id: String,
    pub niche: String,
    pub insight_type: String,
    pub insight_value: String,
    pub confidence: f64,
    pub data_points: u64,
    pub created_at: String,
    pub updated_at: String,
}

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    #[serde(rename = "type", default = "default_error_type")]
    pub error_type: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub cause: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub prevention: String,
}

impl Default for ErrorReport {
    fn default() -> Self {
        Self {
            error_type: default_error_type(),
            context: String::new(),
            cause: String::new(),
            solution: String::new(),
            prevention: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecordOutcome {
    pub error_id: ErrorId,
    pub recorded: bool,
    pub is_new: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnOutcome {
    pub campaign_id: CampaignId,
    pub status: CampaignStatus,
    pub success_score: f64,
    pub learnings: Learnings,
    pub memory_updated: bool,
    pub patterns_recorded: usize,
    pub insights_generated: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarQuery {
    #[serde(default = "default_niche")]
    pub niche: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_platform")]
    pub platform: String,
}

impl Default for SimilarQuery {
    fn default() -> Self {
        Self {
            niche: default_niche(),
            country: default_country(),
            platform: default_platform(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarCampaign {
    pub id: CampaignId,
    pub niche: String,
    pub country: String,
    pub platform: String,
    pub strategy: Value,
    pub roas: f64,
    pub cpa: f64,
    pub status: CampaignStatus,
    pub learnings: Learnings,
}

// Recommendations

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationContext {
    pub niche: String,
    pub country: String,
    pub platform: String,
    pub budget: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedStrategy {
    #[serde(rename = "type")]
    pub strategy_type: String,
    pub details: Value,
    pub success_rate: f64,
    pub avg_roas: f64,
    pub proven_times: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternHint {
    #[serde(rename = "type")]
    pub pattern_type: String,
    pub key: String,
    pub value: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightHint {
    #[serde(rename = "type")]
    pub insight_type: String,
    pub value: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorHint {
    #[serde(rename = "type")]
    pub error_type: String,
    pub cause: String,
    pub prevention: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetAction {
    #[serde(rename = "increase")]
    Increase,
    #[serde(rename = "decrease")]
    Decrease,
    #[serde(rename = "maintain")]
    Maintain,
    #[serde(rename = "test")]
    Test,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetRecommendation {
    pub recommendation: BudgetAction,
    pub suggested_budget: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    #[serde(rename = "high")]
    High,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "very_low")]
    VeryLow,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::VeryLow => "very_low",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendations {
    pub timestamp: String, // RFC3339
    pub context: RecommendationContext,
    pub recommended_strategies: Vec<RecommendedStrategy>,
    pub patterns_to_follow: Vec<PatternHint>,
    pub niche_insights: Vec<InsightHint>,
    pub errors_to_avoid: Vec<ErrorHint>,
    pub budget_recommendation: BudgetRecommendation,
    pub confidence_level: ConfidenceLevel,
}

// Niche intelligence

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataQuality {
    #[serde(rename = "high")]
    High,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "low")]
    Low,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NicheStatistics {
    pub total_campaigns: u64,
    pub avg_roas: f64,
    pub avg_cpa: f64,
    pub winner_rate: f64,
    pub total_spend: f64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NicheStrategy {
    pub strategy: Value,
    pub avg_roas: f64,
    pub times_used: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryPerformance {
    pub country: String,
    pub avg_roas: f64,
    pub campaigns: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NicheIntelligence {
    pub niche: String,
    pub timestamp: String, // RFC3339
    pub statistics: NicheStatistics,
    pub best_strategies: Vec<NicheStrategy>,
    pub best_countries: Vec<CountryPerformance>,
    pub data_quality: DataQuality,
}

// Account history

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountStatistics {
    pub total_campaigns: u64,
    pub avg_roas: f64,
    pub total_spend: f64,
    pub total_revenue: f64,
    pub total_conversions: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub id: CampaignId,
    pub niche: String,
    pub roas: f64,
    pub status: CampaignStatus,
    pub date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountHistory {
    pub account_id: AccountId,
    pub statistics: AccountStatistics,
    pub recent_campaigns: Vec<CampaignSummary>,
}

// Service reflection

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCounts {
    pub campaigns_history: u64,
    pub winning_strategies: u64,
    pub learned_patterns: u64,
    pub historical_errors: u64,
    pub niche_insights: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStatus {
    pub name: String,
    pub version: String,
    pub db_path: String,
    pub tables: TableCounts,
    pub cached_niches: usize,
    pub timestamp: String, // RFC3339
}

// ============================================================================
// Helper Functions
// ============================================================================

pub fn generate_campaign_id() -> CampaignId {
    CampaignId(format!("camp_{}", ulid::Ulid::new()))
}
