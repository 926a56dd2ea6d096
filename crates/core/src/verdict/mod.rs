//! Verdict engine: reduces a bundle of per-security metrics to a composite score and a
//! discrete rating. Pure and stateless; safe to call from any thread.

pub mod approximate;
pub mod weights;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use approximate::{approximate_rating, ApproximateRating};
pub use weights::VerdictWeights;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictInput {
    /// 0-10, lower is safer. Required on the wire: a missing risk must not read as 0.
    pub risk: f64,
    /// Percent distance to the bullish target. May be negative.
    #[serde(default)]
    pub upside: f64,
    /// Percent distance to the bearish target (<= 0). Absent means 0.
    #[serde(default)]
    pub downside: Option<f64>,
    #[serde(default)]
    pub consensus: Option<String>,
    /// 0-10 quality score. Zero is treated as absent.
    #[serde(default)]
    pub overall_score: Option<f64>,
    /// Missing and negative are penalized identically.
    #[serde(default)]
    pub pe_ratio: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rating {
    #[serde(rename = "Strong Buy")]
    StrongBuy,
    #[serde(rename = "Buy")]
    Buy,
    #[serde(rename = "Hold")]
    Hold,
    #[serde(rename = "Sell")]
    Sell,
    #[serde(rename = "Speculative Buy")]
    SpeculativeBuy,
}

impl Rating {
    pub const ALL: [Rating; 5] = [
        Rating::StrongBuy,
        Rating::Buy,
        Rating::Hold,
        Rating::Sell,
        Rating::SpeculativeBuy,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Rating::StrongBuy => "Strong Buy",
            Rating::Buy => "Buy",
            Rating::Hold => "Hold",
            Rating::Sell => "Sell",
            Rating::SpeculativeBuy => "Speculative Buy",
        }
    }

    pub fn variant(self) -> Variant {
        match self {
            Rating::StrongBuy => Variant::Success,
            Rating::Buy => Variant::Positive,
            Rating::Hold => Variant::Neutral,
            Rating::Sell => Variant::Destructive,
            Rating::SpeculativeBuy => Variant::Warning,
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown rating label: {0:?}")]
pub struct UnknownRating(pub String);

impl FromStr for Rating {
    type Err = UnknownRating;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| if c == '_' || c == '-' { ' ' } else { c })
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "strong buy" => Ok(Rating::StrongBuy),
            "buy" => Ok(Rating::Buy),
            "hold" => Ok(Rating::Hold),
            "sell" => Ok(Rating::Sell),
            "speculative buy" => Ok(Rating::SpeculativeBuy),
            _ => Err(UnknownRating(s.to_string())),
        }
    }
}

/// Presentation tag for a rating badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Success,
    Positive,
    Neutral,
    Destructive,
    Warning,
}

/// Which rule produced the rating. A vetoed Sell and a tiered Sell share a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictBasis {
    Tier,
    RiskVeto,
    SpeculativeOverride,
}

/// Signed contribution of each term to the composite score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub upside: f64,
    pub downside: f64,
    pub risk: f64,
    pub overall: f64,
    pub consensus: f64,
    pub valuation: f64,
}

impl ScoreBreakdown {
    fn total(&self) -> f64 {
        self.upside + self.downside + self.risk + self.overall + self.consensus + self.valuation
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictResult {
    pub rating: Rating,
    pub variant: Variant,
    /// Not clamped; tiers assume roughly 0..=100.
    pub score: f64,
    pub basis: VerdictBasis,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, Default)]
pub struct VerdictEngine {
    weights: VerdictWeights,
}

impl VerdictEngine {
    pub fn new(weights: VerdictWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &VerdictWeights {
        &self.weights
    }

    pub fn evaluate(&self, input: &VerdictInput) -> VerdictResult {
        let w = &self.weights;

        let risk = input.risk;
        let upside = finite_or_zero(input.upside);
        let downside = input.downside.map(finite_or_zero).unwrap_or(0.0);
        let overall = present(input.overall_score).filter(|s| *s != 0.0);

        let breakdown = ScoreBreakdown {
            upside: (upside.min(w.upside_cap) * w.upside_weight).max(0.0),
            downside: -(downside.abs() * w.downside_weight).min(w.downside_max_penalty),
            risk: risk_term(w, risk),
            overall: overall.map(|s| overall_term(w, s)).unwrap_or(0.0),
            consensus: input
                .consensus
                .as_deref()
                .map(|c| consensus_term(w, c))
                .unwrap_or(0.0),
            valuation: valuation_term(w, present(input.pe_ratio)),
        };
        let score = w.base_score + breakdown.total();

        let (rating, basis) = if risk >= w.veto_risk_at && score < w.veto_score_below {
            (Rating::Sell, VerdictBasis::RiskVeto)
        } else if risk >= w.speculative_risk_at
            && (upside >= w.speculative_upside_at
                || overall.is_some_and(|s| s >= w.speculative_overall_at))
        {
            (Rating::SpeculativeBuy, VerdictBasis::SpeculativeOverride)
        } else {
            (tier(w, score), VerdictBasis::Tier)
        };

        VerdictResult {
            rating,
            variant: rating.variant(),
            score,
            basis,
            breakdown,
        }
    }
}

/// Evaluates with the published weights.
pub fn evaluate(input: &VerdictInput) -> VerdictResult {
    VerdictEngine::new(VerdictWeights::PUBLISHED).evaluate(input)
}

fn present(v: Option<f64>) -> Option<f64> {
    v.filter(|x| !x.is_nan())
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v
    }
}

fn risk_term(w: &VerdictWeights, risk: f64) -> f64 {
    if risk >= w.risk_severe_at {
        -w.risk_severe_penalty
    } else if risk >= w.risk_elevated_at {
        -w.risk_elevated_penalty
    } else if risk <= w.risk_low_at {
        w.risk_low_bonus
    } else {
        0.0
    }
}

fn overall_term(w: &VerdictWeights, score: f64) -> f64 {
    if score >= w.overall_strong_at {
        w.overall_strong_bonus
    } else if score >= w.overall_good_at {
        w.overall_good_bonus
    } else if score <= w.overall_weak_at {
        -w.overall_weak_penalty
    } else {
        0.0
    }
}

fn consensus_term(w: &VerdictWeights, consensus: &str) -> f64 {
    let c = consensus.to_lowercase();
    // "strong buy" must win over its "buy" substring.
    if c.contains("strong buy") {
        w.consensus_strong_buy
    } else if c.contains("buy") {
        w.consensus_buy
    } else if c.contains("sell") {
        -w.consensus_sell
    } else {
        0.0
    }
}

fn valuation_term(w: &VerdictWeights, pe: Option<f64>) -> f64 {
    match pe {
        None => -w.pe_missing_penalty,
        Some(pe) if pe < 0.0 => -w.pe_missing_penalty,
        Some(pe) if pe < w.pe_cheap_below => w.pe_cheap_bonus,
        Some(pe) if pe < w.pe_fair_below => w.pe_fair_bonus,
        Some(pe) if pe > w.pe_extreme_above => -w.pe_extreme_penalty,
        Some(pe) if pe > w.pe_rich_above => -w.pe_rich_penalty,
        Some(_) => 0.0,
    }
}

fn tier(w: &VerdictWeights, score: f64) -> Rating {
    if score >= w.tier_strong_buy_at {
        Rating::StrongBuy
    } else if score >= w.tier_buy_at {
        Rating::Buy
    } else if score >= w.tier_hold_at {
        Rating::Hold
    } else {
        Rating::Sell
    }
}
