use crate::domain::snapshot::{AiAnalysis, Engagement, Fundamentals, Identity, PriceBar};
use crate::numeric::parse_market_cap;
use crate::storage::provider::SnapshotProvider;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Snapshot provider backed by the Postgres snapshot store.
#[derive(Debug, Clone)]
pub struct PgSnapshotProvider {
    pool: sqlx::PgPool,
}

impl PgSnapshotProvider {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.trim().chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

type AnalysisRow = (
    String,
    DateTime<Utc>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<String>,
);

#[async_trait::async_trait]
impl SnapshotProvider for PgSnapshotProvider {
    fn provider_name(&self) -> &'static str {
        "postgres"
    }

    async fn identities(&self, search: Option<&str>) -> Result<Vec<Identity>> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let rows = sqlx::query_as::<_, (String, String, Option<String>, Option<String>)>(
            "SELECT symbol, name, sector, exchange \
             FROM tickers \
             WHERE $1::text IS NULL OR symbol ILIKE $1 OR name ILIKE $1 \
             ORDER BY symbol ASC",
        )
        .persistent(false)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .context("select tickers failed")?;

        Ok(rows
            .into_iter()
            .map(|(symbol, name, sector, exchange)| Identity {
                symbol,
                name,
                sector,
                exchange,
            })
            .collect())
    }

    async fn latest_prices(&self, symbols: &[String]) -> Result<HashMap<String, PriceBar>> {
        let rows = sqlx::query_as::<_, (String, DateTime<Utc>, f64, Option<f64>)>(
            "SELECT DISTINCT ON (symbol) symbol, as_of, close, change_percent \
             FROM ticker_prices \
             WHERE symbol = ANY($1) \
             ORDER BY symbol, as_of DESC",
        )
        .persistent(false)
        .bind(symbols)
        .fetch_all(&self.pool)
        .await
        .context("select latest ticker_prices failed")?;

        Ok(rows
            .into_iter()
            .map(|(symbol, as_of, close, change_percent)| {
                (
                    symbol,
                    PriceBar {
                        close,
                        change_percent,
                        as_of,
                    },
                )
            })
            .collect())
    }

    async fn fundamentals(&self, symbols: &[String]) -> Result<HashMap<String, Fundamentals>> {
        let rows = sqlx::query_as::<
            _,
            (
                String,
                Option<String>,
                Option<f64>,
                Option<f64>,
                Option<f64>,
                Option<f64>,
                Option<String>,
            ),
        >(
            "SELECT symbol, market_cap, pe_ratio, dividend_yield, eps, beta, analyst_consensus \
             FROM ticker_fundamentals \
             WHERE symbol = ANY($1)",
        )
        .persistent(false)
        .bind(symbols)
        .fetch_all(&self.pool)
        .await
        .context("select ticker_fundamentals failed")?;

        let mut out = HashMap::with_capacity(rows.len());
        for (symbol, market_cap_text, pe_ratio, dividend_yield, eps, beta, analyst_consensus) in rows
        {
            let market_cap = market_cap_text.as_deref().and_then(parse_market_cap);
            if market_cap.is_none() {
                if let Some(text) = market_cap_text.as_deref().filter(|t| !t.trim().is_empty()) {
                    tracing::debug!(%symbol, market_cap = text, "unparseable market cap; treating as missing");
                }
            }
            out.insert(
                symbol,
                Fundamentals {
                    market_cap,
                    pe_ratio,
                    dividend_yield,
                    eps,
                    beta,
                    analyst_consensus,
                },
            );
        }
        Ok(out)
    }

    async fn analyses(&self, symbols: &[String]) -> Result<HashMap<String, AiAnalysis>> {
        let rows = sqlx::query_as::<_, AnalysisRow>(
            "SELECT DISTINCT ON (symbol) symbol, generated_at, risk_score, financial_risk, \
                    market_risk, competitive_risk, regulatory_risk, bull_target, bear_target, \
                    upside_percent, overall_score, sentiment \
             FROM ai_analyses \
             WHERE symbol = ANY($1) \
             ORDER BY symbol, generated_at DESC",
        )
        .persistent(false)
        .bind(symbols)
        .fetch_all(&self.pool)
        .await
        .context("select latest ai_analyses failed")?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    symbol,
                    generated_at,
                    risk_score,
                    financial_risk,
                    market_risk,
                    competitive_risk,
                    regulatory_risk,
                    bull_target,
                    bear_target,
                    upside_percent,
                    overall_score,
                    sentiment,
                )| {
                    (
                        symbol,
                        AiAnalysis {
                            risk_score,
                            financial_risk,
                            market_risk,
                            competitive_risk,
                            regulatory_risk,
                            bull_target,
                            bear_target,
                            upside_percent,
                            overall_score,
                            sentiment,
                            generated_at: Some(generated_at),
                        },
                    )
                },
            )
            .collect())
    }

    async fn engagement(&self, symbols: &[String]) -> Result<HashMap<String, Engagement>> {
        let rows = sqlx::query_as::<_, (String, i64, i64, i64)>(
            "SELECT symbol, research_count, news_count, social_count \
             FROM ticker_engagement \
             WHERE symbol = ANY($1)",
        )
        .persistent(false)
        .bind(symbols)
        .fetch_all(&self.pool)
        .await
        .context("select ticker_engagement failed")?;

        Ok(rows
            .into_iter()
            .map(|(symbol, research_count, news_count, social_count)| {
                (
                    symbol,
                    Engagement {
                        research_count,
                        news_count,
                        social_count,
                    },
                )
            })
            .collect())
    }
}
