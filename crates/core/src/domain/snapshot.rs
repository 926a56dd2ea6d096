use crate::numeric::percent_distance;
use crate::verdict::{VerdictEngine, VerdictInput, VerdictResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub symbol: String,
    pub name: String,
    pub sector: Option<String>,
    pub exchange: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBar {
    pub close: f64,
    pub change_percent: Option<f64>,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fundamentals {
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub eps: Option<f64>,
    pub beta: Option<f64>,
    pub analyst_consensus: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    /// Composite 0-10 risk; this is the value the verdict engine reads.
    pub risk_score: Option<f64>,
    pub financial_risk: Option<f64>,
    pub market_risk: Option<f64>,
    pub competitive_risk: Option<f64>,
    pub regulatory_risk: Option<f64>,
    pub bull_target: Option<f64>,
    pub bear_target: Option<f64>,
    /// Producer-stored upside. Only read when the bull target cannot be used.
    pub upside_percent: Option<f64>,
    pub overall_score: Option<f64>,
    pub sentiment: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
}

/// Display-only counters; never scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engagement {
    pub research_count: i64,
    pub news_count: i64,
    pub social_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySnapshot {
    pub identity: Identity,
    pub price: Option<PriceBar>,
    pub fundamentals: Option<Fundamentals>,
    pub analysis: Option<AiAnalysis>,
    pub engagement: Option<Engagement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsideSource {
    /// Bull target against the latest close.
    Derived,
    /// The producer's stored percentage; the two are not guaranteed to agree.
    StoredFallback,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    pub upside: Option<f64>,
    pub downside: Option<f64>,
    pub upside_source: UpsideSource,
    pub verdict: Option<VerdictResult>,
}

impl SecuritySnapshot {
    pub fn bare(identity: Identity) -> Self {
        Self {
            identity,
            price: None,
            fundamentals: None,
            analysis: None,
            engagement: None,
        }
    }

    pub fn close(&self) -> Option<f64> {
        self.price.as_ref().map(|p| p.close)
    }

    pub fn risk(&self) -> Option<f64> {
        self.analysis
            .as_ref()
            .and_then(|a| a.risk_score)
            .filter(|r| r.is_finite())
    }

    pub fn market_cap(&self) -> Option<f64> {
        self.fundamentals.as_ref().and_then(|f| f.market_cap)
    }

    pub fn pe_ratio(&self) -> Option<f64> {
        self.fundamentals.as_ref().and_then(|f| f.pe_ratio)
    }

    pub fn dividend_yield(&self) -> Option<f64> {
        self.fundamentals.as_ref().and_then(|f| f.dividend_yield)
    }

    pub fn overall_score(&self) -> Option<f64> {
        self.analysis.as_ref().and_then(|a| a.overall_score)
    }

    pub fn upside(&self) -> (Option<f64>, UpsideSource) {
        let Some(analysis) = &self.analysis else {
            return (None, UpsideSource::Unavailable);
        };
        if let Some(v) = percent_distance(self.close(), analysis.bull_target) {
            return (Some(v), UpsideSource::Derived);
        }
        match analysis.upside_percent.filter(|v| v.is_finite()) {
            Some(v) => (Some(v), UpsideSource::StoredFallback),
            None => (None, UpsideSource::Unavailable),
        }
    }

    /// Percent distance to the bear target, capped at zero.
    pub fn downside(&self) -> Option<f64> {
        let bear = self.analysis.as_ref().and_then(|a| a.bear_target);
        percent_distance(self.close(), bear).map(|d| d.min(0.0))
    }

    /// `None` when the row lacks a risk score or any usable upside.
    pub fn verdict_input(&self) -> Option<VerdictInput> {
        let risk = self.risk()?;
        let upside = self.upside().0?;
        Some(VerdictInput {
            risk,
            upside,
            downside: self.downside(),
            consensus: self
                .fundamentals
                .as_ref()
                .and_then(|f| f.analyst_consensus.clone()),
            overall_score: self.overall_score(),
            pe_ratio: self.pe_ratio(),
        })
    }

    pub fn derive(&self, engine: &VerdictEngine) -> DerivedMetrics {
        let (upside, upside_source) = self.upside();
        DerivedMetrics {
            upside,
            downside: self.downside(),
            upside_source,
            verdict: self.verdict_input().map(|i| engine.evaluate(&i)),
        }
    }
}
