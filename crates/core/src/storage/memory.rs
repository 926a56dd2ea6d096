use crate::domain::snapshot::{AiAnalysis, Engagement, Fundamentals, Identity, PriceBar, SecuritySnapshot};
use crate::storage::provider::{SnapshotProvider, SnapshotSource};
use anyhow::{bail, Result};
use std::collections::{HashMap, HashSet};

/// In-memory provider over a fixed set of snapshots. Sources can be marked as failing to
/// exercise degraded reads.
#[derive(Debug, Clone, Default)]
pub struct StaticSnapshotProvider {
    snapshots: Vec<SecuritySnapshot>,
    failing: HashSet<SnapshotSource>,
}

impl StaticSnapshotProvider {
    pub fn new(snapshots: Vec<SecuritySnapshot>) -> Self {
        Self {
            snapshots,
            failing: HashSet::new(),
        }
    }

    pub fn failing(mut self, source: SnapshotSource) -> Self {
        self.failing.insert(source);
        self
    }

    fn check(&self, source: SnapshotSource) -> Result<()> {
        if self.failing.contains(&source) {
            bail!("{} source unavailable", source.as_str());
        }
        Ok(())
    }

    fn collect<T: Clone>(
        &self,
        source: SnapshotSource,
        symbols: &[String],
        pick: impl Fn(&SecuritySnapshot) -> Option<&T>,
    ) -> Result<HashMap<String, T>> {
        self.check(source)?;
        let wanted: HashSet<&str> = symbols.iter().map(String::as_str).collect();
        Ok(self
            .snapshots
            .iter()
            .filter(|s| wanted.contains(s.identity.symbol.as_str()))
            .filter_map(|s| pick(s).map(|v| (s.identity.symbol.clone(), v.clone())))
            .collect())
    }
}

#[async_trait::async_trait]
impl SnapshotProvider for StaticSnapshotProvider {
    fn provider_name(&self) -> &'static str {
        "static"
    }

    async fn identities(&self, search: Option<&str>) -> Result<Vec<Identity>> {
        self.check(SnapshotSource::Identities)?;
        let needle = search.map(|s| s.trim().to_lowercase());
        Ok(self
            .snapshots
            .iter()
            .map(|s| &s.identity)
            .filter(|id| match &needle {
                Some(q) => {
                    id.symbol.to_lowercase().contains(q) || id.name.to_lowercase().contains(q)
                }
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn latest_prices(&self, symbols: &[String]) -> Result<HashMap<String, PriceBar>> {
        self.collect(SnapshotSource::Prices, symbols, |s| s.price.as_ref())
    }

    async fn fundamentals(&self, symbols: &[String]) -> Result<HashMap<String, Fundamentals>> {
        self.collect(SnapshotSource::Fundamentals, symbols, |s| {
            s.fundamentals.as_ref()
        })
    }

    async fn analyses(&self, symbols: &[String]) -> Result<HashMap<String, AiAnalysis>> {
        self.collect(SnapshotSource::Analyses, symbols, |s| s.analysis.as_ref())
    }

    async fn engagement(&self, symbols: &[String]) -> Result<HashMap<String, Engagement>> {
        self.collect(SnapshotSource::Engagement, symbols, |s| {
            s.engagement.as_ref()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(symbol: &str, name: &str) -> SecuritySnapshot {
        SecuritySnapshot::bare(Identity {
            symbol: symbol.to_string(),
            name: name.to_string(),
            sector: None,
            exchange: None,
        })
    }

    #[tokio::test]
    async fn search_narrows_identities() {
        let p = StaticSnapshotProvider::new(vec![id("AAPL", "Apple"), id("MSFT", "Microsoft")]);
        let ids = p.identities(Some("micro")).await.unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].symbol, "MSFT");
    }

    #[tokio::test]
    async fn failing_source_errors() {
        let p = StaticSnapshotProvider::new(vec![id("AAPL", "Apple")])
            .failing(SnapshotSource::Fundamentals);
        assert!(p.fundamentals(&["AAPL".to_string()]).await.is_err());
        assert!(p.latest_prices(&["AAPL".to_string()]).await.unwrap().is_empty());
    }
}
