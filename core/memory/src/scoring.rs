use velyra_schemas::{
    BudgetAction, BudgetRecommendation, CampaignInput, CampaignStatus, ConfidenceLevel,
    DataQuality, LearningPattern, Learnings, PatternKind,
};

pub const BASE_SCORE: f64 = 50.0;
pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Metrics a campaign is judged on, plus the values derived from its totals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CampaignMetrics {
    pub roas: f64,
    pub cpa: f64,
    pub target_cpa: f64,
    pub conversions: u64,
    /// revenue / spend, 0 without spend. This is what gets stored.
    pub derived_roas: f64,
    /// spend / conversions, 0 without conversions. This is what gets stored.
    pub derived_cpa: f64,
}

impl CampaignMetrics {
    /// Explicit `roas`/`cpa` win over the derived values when scoring. A
    /// missing target CPA falls back to the explicit CPA only, otherwise 0,
    /// which skips the CPA bucket.
    pub fn from_input(input: &CampaignInput) -> Self {
        let derived_roas = if input.spend > 0.0 {
            input.revenue / input.spend
        } else {
            0.0
        };
        let derived_cpa = if input.conversions > 0 {
            input.spend / input.conversions as f64
        } else {
            0.0
        };

        Self {
            roas: input.roas.unwrap_or(derived_roas),
            cpa: input.cpa.unwrap_or(derived_cpa),
            target_cpa: input.target_cpa.or(input.cpa).unwrap_or(0.0),
            conversions: input.conversions,
            derived_roas,
            derived_cpa,
        }
    }
}

/// Weighted bucket score in [0, 100]
pub fn success_score(metrics: &CampaignMetrics) -> f64 {
    let mut score = BASE_SCORE;

    let roas = metrics.roas;
    if roas >= 3.0 {
        score += 30.0;
    } else if roas >= 2.0 {
        score += 20.0;
    } else if roas >= 1.5 {
        score += 10.0;
    } else if roas < 1.0 {
        score -= 20.0;
    }

    let target = metrics.target_cpa;
    if target > 0.0 {
        if metrics.cpa <= target * 0.8 {
            score += 15.0;
        } else if metrics.cpa <= target {
            score += 10.0;
        } else if metrics.cpa > target * 1.5 {
            score -= 15.0;
        }
    }

    if metrics.conversions >= 100 {
        score += 10.0;
    } else if metrics.conversions >= 50 {
        score += 5.0;
    }

    score.clamp(MIN_SCORE, MAX_SCORE)
}

pub fn extract_learnings(
    input: &CampaignInput,
    metrics: &CampaignMetrics,
    status: CampaignStatus,
) -> Learnings {
    let mut learnings = Learnings::default();

    match status {
        CampaignStatus::Winner => {
            learnings.patterns.push(LearningPattern {
                kind: PatternKind::Success,
                factor: "strategy".to_string(),
                value: input.strategy.clone(),
            });
            learnings
                .insights
                .push(format!("Winning strategy in niche {}", input.niche));
        }
        CampaignStatus::Loser => {
            learnings.patterns.push(LearningPattern {
                kind: PatternKind::Failure,
                factor: "strategy".to_string(),
                value: input.strategy.clone(),
            });
            learnings
                .recommendations
                .push("Avoid this strategy combination in the future".to_string());
        }
        CampaignStatus::Average => {}
    }

    if metrics.roas > 0.0 {
        learnings.insights.push(format!(
            "ROAS of {:.2} in country {}",
            metrics.roas, input.country
        ));
    }

    learnings
}

/// Compare a proposed budget with the average budget of past winners
pub fn budget_recommendation(avg_winner_budget: Option<f64>, proposed: f64) -> BudgetRecommendation {
    match avg_winner_budget.filter(|avg| *avg > 0.0) {
        Some(avg) if proposed < avg * 0.5 => BudgetRecommendation {
            recommendation: BudgetAction::Increase,
            suggested_budget: round_to(avg, 2),
            reason: format!("Winning campaigns spend {:.2} on average", avg),
        },
        Some(avg) if proposed > avg * 2.0 => BudgetRecommendation {
            recommendation: BudgetAction::Decrease,
            suggested_budget: round_to(avg * 1.5, 2),
            reason: "Budget far above the average of winning campaigns".to_string(),
        },
        Some(_) => BudgetRecommendation {
            recommendation: BudgetAction::Maintain,
            suggested_budget: proposed,
            reason: "Budget within the winning range".to_string(),
        },
        None => BudgetRecommendation {
            recommendation: BudgetAction::Test,
            suggested_budget: proposed,
            reason: "Not enough data, test before scaling".to_string(),
        },
    }
}

pub fn recommendation_confidence(strategies: usize, patterns: usize, insights: usize) -> ConfidenceLevel {
    match strategies + patterns + insights {
        n if n >= 20 => ConfidenceLevel::High,
        n if n >= 10 => ConfidenceLevel::Medium,
        n if n >= 5 => ConfidenceLevel::Low,
        _ => ConfidenceLevel::VeryLow,
    }
}

pub fn data_quality(total_campaigns: u64) -> DataQuality {
    if total_campaigns >= 50 {
        DataQuality::High
    } else if total_campaigns >= 10 {
        DataQuality::Medium
    } else {
        DataQuality::Low
    }
}

/// `part / total` as a percentage with one decimal, 0 when empty
pub fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round_to(part as f64 / total as f64 * 100.0, 1)
    }
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metrics(roas: f64, cpa: f64, target_cpa: f64, conversions: u64) -> CampaignMetrics {
        CampaignMetrics {
            roas,
            cpa,
            target_cpa,
            conversions,
            derived_roas: roas,
            derived_cpa: cpa,
        }
    }

    #[test]
    fn test_zero_spend_does_not_divide() {
        let input = CampaignInput {
            spend: 0.0,
            revenue: 500.0,
            conversions: 0,
            ..Default::default()
        };
        let m = CampaignMetrics::from_input(&input);
        assert_eq!(m.roas, 0.0);
        assert_eq!(m.cpa, 0.0);
        assert!(success_score(&m).is_finite());
    }

    #[test]
    fn test_derived_metrics() {
        let input = CampaignInput {
            spend: 1000.0,
            revenue: 2500.0,
            conversions: 40,
            ..Default::default()
        };
        let m = CampaignMetrics::from_input(&input);
        assert_eq!(m.roas, 2.5);
        assert_eq!(m.cpa, 25.0);
        assert_eq!(m.derived_roas, 2.5);
        assert_eq!(m.derived_cpa, 25.0);
        // no target and no explicit CPA: the CPA bucket is skipped
        assert_eq!(m.target_cpa, 0.0);
    }

    #[test]
    fn test_cpa_bucket_needs_a_target() {
        let derived_only = CampaignMetrics::from_input(&CampaignInput {
            spend: 1000.0,
            revenue: 1200.0,
            conversions: 10,
            ..Default::default()
        });
        assert_eq!(success_score(&derived_only), 50.0);

        let explicit_cpa = CampaignMetrics::from_input(&CampaignInput {
            spend: 1000.0,
            revenue: 1200.0,
            conversions: 10,
            cpa: Some(100.0),
            ..Default::default()
        });
        assert_eq!(explicit_cpa.target_cpa, 100.0);
        assert_eq!(success_score(&explicit_cpa), 60.0);
    }

    #[test]
    fn test_explicit_metrics_override_derived() {
        let input = CampaignInput {
            spend: 1000.0,
            revenue: 1000.0,
            conversions: 10,
            roas: Some(4.0),
            cpa: Some(20.0),
            target_cpa: Some(50.0),
            ..Default::default()
        };
        let m = CampaignMetrics::from_input(&input);
        assert_eq!(m.roas, 4.0);
        assert_eq!(m.cpa, 20.0);
        assert_eq!(m.target_cpa, 50.0);
        assert_eq!(m.derived_roas, 1.0);
        assert_eq!(m.derived_cpa, 100.0);
    }

    #[test]
    fn test_roas_buckets() {
        assert_eq!(success_score(&metrics(3.0, 0.0, 0.0, 0)), 80.0);
        assert_eq!(success_score(&metrics(2.0, 0.0, 0.0, 0)), 70.0);
        assert_eq!(success_score(&metrics(1.5, 0.0, 0.0, 0)), 60.0);
        assert_eq!(success_score(&metrics(1.2, 0.0, 0.0, 0)), 50.0);
        assert_eq!(success_score(&metrics(0.5, 0.0, 0.0, 0)), 30.0);
    }

    #[test]
    fn test_cpa_buckets() {
        // roas 1.2 keeps the base at 50
        assert_eq!(success_score(&metrics(1.2, 8.0, 10.0, 0)), 65.0);
        assert_eq!(success_score(&metrics(1.2, 10.0, 10.0, 0)), 60.0);
        assert_eq!(success_score(&metrics(1.2, 12.0, 10.0, 0)), 50.0);
        assert_eq!(success_score(&metrics(1.2, 16.0, 10.0, 0)), 35.0);
    }

    #[test]
    fn test_volume_buckets() {
        assert_eq!(success_score(&metrics(1.2, 0.0, 0.0, 49)), 50.0);
        assert_eq!(success_score(&metrics(1.2, 0.0, 0.0, 50)), 55.0);
        assert_eq!(success_score(&metrics(1.2, 0.0, 0.0, 100)), 60.0);
    }

    #[test]
    fn test_score_is_clamped() {
        let best = success_score(&metrics(1e12, 0.01, 1e9, u64::MAX));
        assert_eq!(best, MAX_SCORE);

        let worst = success_score(&metrics(-1e12, 1e12, 1.0, 0));
        assert!(worst >= MIN_SCORE);
        assert_eq!(worst, 15.0);
    }

    #[test]
    fn test_reference_winner() {
        let input: CampaignInput = serde_json::from_value(json!({
            "roas": 4, "spend": 1000, "revenue": 4000, "conversions": 50,
            "niche": "ecommerce", "country": "BR"
        }))
        .unwrap();
        let m = CampaignMetrics::from_input(&input);
        let score = success_score(&m);
        assert!(score >= 70.0);
        assert_eq!(CampaignStatus::from_score(score), CampaignStatus::Winner);
    }

    #[test]
    fn test_learnings_by_status() {
        let input = CampaignInput {
            niche: "saas".into(),
            country: "US".into(),
            strategy: json!({"type": "lookalike"}),
            ..Default::default()
        };

        let win = extract_learnings(&input, &metrics(3.5, 0.0, 0.0, 0), CampaignStatus::Winner);
        assert_eq!(win.patterns.len(), 1);
        assert_eq!(win.patterns[0].kind, PatternKind::Success);
        assert_eq!(win.insights.len(), 2);
        assert!(win.insights[1].contains("3.50"));

        let lose = extract_learnings(&input, &metrics(0.0, 0.0, 0.0, 0), CampaignStatus::Loser);
        assert_eq!(lose.patterns[0].kind, PatternKind::Failure);
        assert_eq!(lose.recommendations.len(), 1);
        assert!(lose.insights.is_empty());

        let avg = extract_learnings(&input, &metrics(1.2, 0.0, 0.0, 0), CampaignStatus::Average);
        assert!(avg.patterns.is_empty());
        assert_eq!(avg.insights.len(), 1);
    }

    #[test]
    fn test_budget_recommendation() {
        let rec = budget_recommendation(Some(1000.0), 400.0);
        assert_eq!(rec.recommendation, BudgetAction::Increase);
        assert_eq!(rec.suggested_budget, 1000.0);

        let rec = budget_recommendation(Some(1000.0), 2500.0);
        assert_eq!(rec.recommendation, BudgetAction::Decrease);
        assert_eq!(rec.suggested_budget, 1500.0);

        let rec = budget_recommendation(Some(1000.0), 1200.0);
        assert_eq!(rec.recommendation, BudgetAction::Maintain);
        assert_eq!(rec.suggested_budget, 1200.0);

        let rec = budget_recommendation(None, 700.0);
        assert_eq!(rec.recommendation, BudgetAction::Test);
        assert_eq!(rec.suggested_budget, 700.0);

        let rec = budget_recommendation(Some(0.0), 700.0);
        assert_eq!(rec.recommendation, BudgetAction::Test);
    }

    #[test]
    fn test_confidence_buckets() {
        assert_eq!(recommendation_confidence(0, 0, 0), ConfidenceLevel::VeryLow);
        assert_eq!(recommendation_confidence(1, 3, 0), ConfidenceLevel::VeryLow);
        assert_eq!(recommendation_confidence(2, 3, 0), ConfidenceLevel::Low);
        assert_eq!(recommendation_confidence(5, 5, 0), ConfidenceLevel::Medium);
        assert_eq!(recommendation_confidence(5, 10, 5), ConfidenceLevel::High);
    }

    #[test]
    fn test_data_quality_and_rounding() {
        assert_eq!(data_quality(0), DataQuality::Low);
        assert_eq!(data_quality(10), DataQuality::Medium);
        assert_eq!(data_quality(50), DataQuality::High);

        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(round_to(2.34567, 2), 2.35);
    }
}
