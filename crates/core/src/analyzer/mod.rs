//! Analyzer: the filterable, sortable, paginated catalog over security snapshots.
//!
//! A query runs in a fixed order: narrow identities by search, attach price, fundamentals,
//! AI analysis and engagement, derive verdicts and upside, apply structured filters, sort,
//! paginate. Totals are counted before pagination.

pub mod cache;
pub mod options;
pub mod pipeline;
pub mod stats;

use crate::domain::snapshot::SecuritySnapshot;
use crate::error::{AnalyzerError, AnalyzerResult};
use crate::storage::provider::{SnapshotProvider, SnapshotSource};
use crate::verdict::VerdictEngine;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub use cache::QueryCache;
pub use options::{AnalyzerOptions, AnalyzerParams, PageLimits, RiskBucket, SortDir, SortField};
pub use pipeline::{AnalyzerPage, AnalyzerRow, PageMeta};
pub use stats::{ApproximationDrift, RatingDistribution};

pub struct Analyzer {
    provider: Arc<dyn SnapshotProvider>,
    engine: VerdictEngine,
    cache: QueryCache<Arc<AnalyzerPage>>,
}

#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub page: Arc<AnalyzerPage>,
    pub cache_hit: bool,
}

impl Analyzer {
    pub fn new(provider: Arc<dyn SnapshotProvider>, engine: VerdictEngine, cache_ttl: Duration) -> Self {
        Self {
            provider,
            engine,
            cache: QueryCache::new(cache_ttl),
        }
    }

    pub fn engine(&self) -> &VerdictEngine {
        &self.engine
    }

    pub async fn query(&self, options: &AnalyzerOptions) -> AnalyzerResult<QueryOutcome> {
        let key = options.cache_key();
        if let Some(page) = self.cache.get(&key) {
            return Ok(QueryOutcome {
                page,
                cache_hit: true,
            });
        }

        let snapshots = self.load(options.search.as_deref()).await?;
        let page = Arc::new(pipeline::execute(snapshots, options, &self.engine));
        self.cache.insert(key, Arc::clone(&page));

        Ok(QueryOutcome {
            page,
            cache_hit: false,
        })
    }

    pub async fn rating_distribution(&self) -> AnalyzerResult<RatingDistribution> {
        let snapshots = self.load(None).await?;
        Ok(stats::rating_distribution(&snapshots, &self.engine))
    }

    pub async fn approximation_drift(&self) -> AnalyzerResult<ApproximationDrift> {
        let snapshots = self.load(None).await?;
        Ok(stats::approximation_drift(&snapshots, &self.engine))
    }

    /// Assembles snapshots for the identities matching `search`.
    ///
    /// Losing the identity source fails the request; losing any enrichment source only
    /// leaves that part of each row empty.
    pub async fn load(&self, search: Option<&str>) -> AnalyzerResult<Vec<SecuritySnapshot>> {
        let provider = self.provider.provider_name();

        let identities = self
            .provider
            .identities(search)
            .await
            .map_err(AnalyzerError::Upstream)?;
        let identities: Vec<_> = identities
            .into_iter()
            .filter(|id| search.map_or(true, |q| pipeline::matches_search(id, q)))
            .collect();

        let symbols: Vec<String> = identities.iter().map(|id| id.symbol.clone()).collect();
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let (prices, fundamentals, analyses, engagement) = tokio::join!(
            self.provider.latest_prices(&symbols),
            self.provider.fundamentals(&symbols),
            self.provider.analyses(&symbols),
            self.provider.engagement(&symbols),
        );
        let mut prices = degrade(provider, SnapshotSource::Prices, prices);
        let mut fundamentals = degrade(provider, SnapshotSource::Fundamentals, fundamentals);
        let mut analyses = degrade(provider, SnapshotSource::Analyses, analyses);
        let mut engagement = degrade(provider, SnapshotSource::Engagement, engagement);

        Ok(identities
            .into_iter()
            .map(|identity| {
                let symbol = identity.symbol.as_str();
                SecuritySnapshot {
                    price: prices.remove(symbol),
                    fundamentals: fundamentals.remove(symbol),
                    analysis: analyses.remove(symbol),
                    engagement: engagement.remove(symbol),
                    identity,
                }
            })
            .collect())
    }
}

fn degrade<T>(
    provider: &str,
    source: SnapshotSource,
    res: anyhow::Result<HashMap<String, T>>,
) -> HashMap<String, T> {
    match res {
        Ok(map) => map,
        Err(err) => {
            tracing::warn!(
                provider,
                source = source.as_str(),
                error = %format!("{err:#}"),
                "enrichment source unavailable; rows degrade to partial data"
            );
            HashMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::snapshot::{AiAnalysis, Fundamentals, Identity, PriceBar};
    use crate::numeric::UNAVAILABLE;
    use crate::storage::memory::StaticSnapshotProvider;
    use crate::verdict::{evaluate, Rating};
    use chrono::{TimeZone, Utc};

    fn snapshot(symbol: &str, name: &str, market_cap: f64) -> SecuritySnapshot {
        SecuritySnapshot {
            identity: Identity {
                symbol: symbol.to_string(),
                name: name.to_string(),
                sector: Some("Technology".to_string()),
                exchange: Some("NASDAQ".to_string()),
            },
            price: Some(PriceBar {
                close: 200.0,
                change_percent: Some(-0.4),
                as_of: Utc.with_ymd_and_hms(2026, 3, 2, 21, 0, 0).unwrap(),
            }),
            fundamentals: Some(Fundamentals {
                market_cap: Some(market_cap),
                pe_ratio: Some(28.0),
                analyst_consensus: Some("Buy".to_string()),
                ..Default::default()
            }),
            analysis: Some(AiAnalysis {
                risk_score: Some(4.0),
                bull_target: Some(260.0),
                bear_target: Some(180.0),
                overall_score: Some(7.0),
                ..Default::default()
            }),
            engagement: None,
        }
    }

    fn universe() -> Vec<SecuritySnapshot> {
        vec![
            snapshot("AAPL", "Apple Inc.", 3.1e12),
            snapshot("MSFT", "Microsoft Corp.", 3.3e12),
            snapshot("NVDA", "NVIDIA Corp.", 2.9e12),
            SecuritySnapshot::bare(Identity {
                symbol: "NEWCO".to_string(),
                name: "Newly Listed Co.".to_string(),
                sector: None,
                exchange: None,
            }),
        ]
    }

    fn analyzer(provider: StaticSnapshotProvider, ttl: Duration) -> Analyzer {
        Analyzer::new(Arc::new(provider), VerdictEngine::default(), ttl)
    }

    fn first_page() -> AnalyzerOptions {
        AnalyzerOptions::first_page(&PageLimits::default())
    }

    #[tokio::test]
    async fn default_query_orders_by_market_cap() {
        let a = analyzer(StaticSnapshotProvider::new(universe()), Duration::ZERO);
        let out = a.query(&first_page()).await.unwrap();
        let symbols: Vec<_> = out
            .page
            .items
            .iter()
            .map(|r| r.snapshot.identity.symbol.as_str())
            .collect();
        assert_eq!(symbols, vec!["MSFT", "AAPL", "NVDA", "NEWCO"]);
        assert_eq!(out.page.meta.total, 4);
        assert_eq!(out.page.meta.total_pages, 1);
    }

    #[tokio::test]
    async fn row_verdict_equals_standalone_verdict() {
        let a = analyzer(StaticSnapshotProvider::new(universe()), Duration::ZERO);
        let out = a.query(&first_page()).await.unwrap();
        let row = &out.page.items[0];
        let input = row.snapshot.verdict_input().unwrap();
        // 50 + 12 - 8 + 0 + 5 + 5 + 5
        assert_eq!(row.derived.verdict.as_ref(), Some(&evaluate(&input)));
        assert_eq!(row.derived.verdict.as_ref().unwrap().rating, Rating::Buy);
        assert_eq!(row.display.rating, "Buy");
    }

    #[tokio::test]
    async fn search_runs_before_enrichment() {
        let a = analyzer(StaticSnapshotProvider::new(universe()), Duration::ZERO);
        let options = AnalyzerOptions {
            search: Some("corp".to_string()),
            ..first_page()
        };
        let out = a.query(&options).await.unwrap();
        assert_eq!(out.page.meta.total, 2);
    }

    #[tokio::test]
    async fn failed_enrichment_degrades_rows_instead_of_failing() {
        let provider =
            StaticSnapshotProvider::new(universe()).failing(SnapshotSource::Analyses);
        let a = analyzer(provider, Duration::ZERO);
        let out = a.query(&first_page()).await.unwrap();
        assert_eq!(out.page.meta.total, 4);
        for row in &out.page.items {
            assert!(row.snapshot.analysis.is_none());
            assert!(row.derived.verdict.is_none());
            assert_eq!(row.display.rating, UNAVAILABLE);
        }
        // Price and fundamentals still attached.
        assert_eq!(out.page.items[0].display.market_cap, "$3.30T");
    }

    #[tokio::test]
    async fn identity_failure_is_a_request_failure() {
        let provider =
            StaticSnapshotProvider::new(universe()).failing(SnapshotSource::Identities);
        let a = analyzer(provider, Duration::ZERO);
        let err = a.query(&first_page()).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::Upstream(_)));
    }

    #[tokio::test]
    async fn identical_queries_share_a_cached_page() {
        let a = analyzer(StaticSnapshotProvider::new(universe()), Duration::from_secs(30));
        let first = a.query(&first_page()).await.unwrap();
        let second = a.query(&first_page()).await.unwrap();
        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert!(Arc::ptr_eq(&first.page, &second.page));

        let other = a
            .query(&AnalyzerOptions {
                sort_by: SortField::Symbol,
                sort_dir: SortDir::Asc,
                ..first_page()
            })
            .await
            .unwrap();
        assert!(!other.cache_hit);
        assert_eq!(other.page.items[0].snapshot.identity.symbol, "AAPL");
    }

    #[tokio::test]
    async fn concurrent_queries_do_not_interfere() {
        let a = Arc::new(analyzer(
            StaticSnapshotProvider::new(universe()),
            Duration::from_secs(30),
        ));
        let mut handles = Vec::new();
        for limit in 1..=4u32 {
            let a = Arc::clone(&a);
            handles.push(tokio::spawn(async move {
                let out = a
                    .query(&AnalyzerOptions {
                        limit,
                        ..first_page()
                    })
                    .await
                    .unwrap();
                (limit, out.page.items.len(), out.page.meta.total)
            }));
        }
        for h in handles {
            let (limit, len, total) = h.await.unwrap();
            assert_eq!(len, limit as usize);
            assert_eq!(total, 4);
        }
    }

    #[tokio::test]
    async fn distribution_covers_whole_universe() {
        let a = analyzer(StaticSnapshotProvider::new(universe()), Duration::ZERO);
        let d = a.rating_distribution().await.unwrap();
        assert_eq!(d.total, 4);
        assert_eq!(d.unavailable, 1);
        assert_eq!(d.counts[&Rating::Buy], 3);
    }
}
