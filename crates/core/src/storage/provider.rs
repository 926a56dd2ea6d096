use crate::domain::snapshot::{AiAnalysis, Engagement, Fundamentals, Identity, PriceBar};
use anyhow::Result;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotSource {
    Identities,
    Prices,
    Fundamentals,
    Analyses,
    Engagement,
}

impl SnapshotSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identities => "identities",
            Self::Prices => "prices",
            Self::Fundamentals => "fundamentals",
            Self::Analyses => "ai_analyses",
            Self::Engagement => "engagement",
        }
    }
}

/// Read-only access to the point-in-time records the analyzer joins.
///
/// Enrichment lookups return only the symbols they have data for; a missing key means
/// "no data" for that row, not an error.
#[async_trait::async_trait]
pub trait SnapshotProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Identity universe, narrowed by a symbol/name search when given. Implementations may
    /// over-return; the analyzer re-applies the search predicate.
    async fn identities(&self, search: Option<&str>) -> Result<Vec<Identity>>;

    async fn latest_prices(&self, symbols: &[String]) -> Result<HashMap<String, PriceBar>>;

    async fn fundamentals(&self, symbols: &[String]) -> Result<HashMap<String, Fundamentals>>;

    async fn analyses(&self, symbols: &[String]) -> Result<HashMap<String, AiAnalysis>>;

    async fn engagement(&self, symbols: &[String]) -> Result<HashMap<String, Engagement>>;
}
