use serde::Serialize;

/// Every constant the verdict engine reads, grouped under one version tag.
///
/// Downstream displays assume these exact boundaries, so `PUBLISHED` must only
/// change together with its `version`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerdictWeights {
    pub version: &'static str,

    pub base_score: f64,

    pub upside_weight: f64,
    pub upside_cap: f64,

    pub downside_weight: f64,
    pub downside_max_penalty: f64,

    pub risk_severe_at: f64,
    pub risk_severe_penalty: f64,
    pub risk_elevated_at: f64,
    pub risk_elevated_penalty: f64,
    pub risk_low_at: f64,
    pub risk_low_bonus: f64,

    pub overall_strong_at: f64,
    pub overall_strong_bonus: f64,
    pub overall_good_at: f64,
    pub overall_good_bonus: f64,
    pub overall_weak_at: f64,
    pub overall_weak_penalty: f64,

    pub consensus_strong_buy: f64,
    pub consensus_buy: f64,
    pub consensus_sell: f64,

    pub pe_missing_penalty: f64,
    pub pe_cheap_below: f64,
    pub pe_cheap_bonus: f64,
    pub pe_fair_below: f64,
    pub pe_fair_bonus: f64,
    pub pe_extreme_above: f64,
    pub pe_extreme_penalty: f64,
    pub pe_rich_above: f64,
    pub pe_rich_penalty: f64,

    pub veto_risk_at: f64,
    pub veto_score_below: f64,

    pub speculative_risk_at: f64,
    pub speculative_upside_at: f64,
    pub speculative_overall_at: f64,

    pub tier_strong_buy_at: f64,
    pub tier_buy_at: f64,
    pub tier_hold_at: f64,
}

impl VerdictWeights {
    pub const PUBLISHED: VerdictWeights = VerdictWeights {
        version: "v1",

        base_score: 50.0,

        upside_weight: 0.4,
        upside_cap: 100.0,

        downside_weight: 0.8,
        downside_max_penalty: 40.0,

        risk_severe_at: 8.0,
        risk_severe_penalty: 20.0,
        risk_elevated_at: 6.0,
        risk_elevated_penalty: 10.0,
        risk_low_at: 3.0,
        risk_low_bonus: 5.0,

        overall_strong_at: 8.0,
        overall_strong_bonus: 10.0,
        overall_good_at: 6.0,
        overall_good_bonus: 5.0,
        overall_weak_at: 4.0,
        overall_weak_penalty: 5.0,

        consensus_strong_buy: 10.0,
        consensus_buy: 5.0,
        consensus_sell: 10.0,

        pe_missing_penalty: 10.0,
        pe_cheap_below: 15.0,
        pe_cheap_bonus: 15.0,
        pe_fair_below: 30.0,
        pe_fair_bonus: 5.0,
        pe_extreme_above: 60.0,
        pe_extreme_penalty: 15.0,
        pe_rich_above: 40.0,
        pe_rich_penalty: 5.0,

        veto_risk_at: 9.0,
        veto_score_below: 70.0,

        speculative_risk_at: 8.0,
        speculative_upside_at: 100.0,
        speculative_overall_at: 7.5,

        tier_strong_buy_at: 80.0,
        tier_buy_at: 65.0,
        tier_hold_at: 45.0,
    };
}

impl Default for VerdictWeights {
    fn default() -> Self {
        Self::PUBLISHED
    }
}
