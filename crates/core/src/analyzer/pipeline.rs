use crate::analyzer::options::{AnalyzerOptions, RiskBucket, SortDir, SortField};
use crate::domain::snapshot::{DerivedMetrics, Identity, SecuritySnapshot};
use crate::numeric::{format_market_cap, format_number, format_percent, UNAVAILABLE};
use crate::verdict::VerdictEngine;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerRow {
    #[serde(flatten)]
    pub snapshot: SecuritySnapshot,
    pub derived: DerivedMetrics,
    pub display: RowDisplay,
}

/// Pre-rendered cells. Absent values read `unavailable`, never `0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowDisplay {
    pub price: String,
    pub change_percent: String,
    pub market_cap: String,
    pub pe_ratio: String,
    pub dividend_yield: String,
    pub risk: String,
    pub upside: String,
    pub downside: String,
    pub rating: String,
    pub verdict_score: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzerPage {
    pub items: Vec<AnalyzerRow>,
    pub meta: PageMeta,
}

/// Case-insensitive substring match on symbol or display name.
pub fn matches_search(identity: &Identity, search: &str) -> bool {
    let needle = search.trim().to_lowercase();
    needle.is_empty()
        || identity.symbol.to_lowercase().contains(&needle)
        || identity.name.to_lowercase().contains(&needle)
}

/// Runs the in-memory half of an analyzer query over already-enriched snapshots.
pub fn execute(
    snapshots: Vec<SecuritySnapshot>,
    options: &AnalyzerOptions,
    engine: &VerdictEngine,
) -> AnalyzerPage {
    let mut seen = HashSet::new();
    let candidates = snapshots.into_iter().filter(|s| {
        options
            .search
            .as_deref()
            .map_or(true, |q| matches_search(&s.identity, q))
            && seen.insert(s.identity.symbol.clone())
    });

    let rows: Vec<AnalyzerRow> = candidates
        .map(|snapshot| {
            let derived = snapshot.derive(engine);
            let display = render(&snapshot, &derived);
            AnalyzerRow {
                snapshot,
                derived,
                display,
            }
        })
        .filter(|row| passes_filters(row, options))
        .collect();

    let mut keyed: Vec<(SortKey, AnalyzerRow)> = rows
        .into_iter()
        .map(|row| (sort_key(&row, options.sort_by), row))
        .collect();
    keyed.sort_by(|(ka, a), (kb, b)| {
        compare_keys(ka, kb, options.sort_dir)
            .then_with(|| a.snapshot.identity.symbol.cmp(&b.snapshot.identity.symbol))
    });
    let rows: Vec<AnalyzerRow> = keyed.into_iter().map(|(_, row)| row).collect();

    let total = rows.len();
    let limit = options.limit.max(1);
    let total_pages = total.div_ceil(limit as usize) as u32;
    let page = options.page.clamp(1, total_pages.max(1));
    let start = (page as usize - 1) * limit as usize;

    let items = rows.into_iter().skip(start).take(limit as usize).collect();

    AnalyzerPage {
        items,
        meta: PageMeta {
            total,
            page,
            limit,
            total_pages,
        },
    }
}

fn passes_filters(row: &AnalyzerRow, options: &AnalyzerOptions) -> bool {
    if !options.risk.is_empty() {
        let bucket = row.snapshot.risk().and_then(RiskBucket::of);
        if !bucket.is_some_and(|b| options.risk.contains(&b)) {
            return false;
        }
    }

    if !options.ratings.is_empty() {
        let rating = row.derived.verdict.as_ref().map(|v| v.rating);
        if !rating.is_some_and(|r| options.ratings.contains(&r)) {
            return false;
        }
    }

    if let Some(filter) = &options.upside {
        if !row.derived.upside.is_some_and(|u| filter.matches(u)) {
            return false;
        }
    }

    if !options.sectors.is_empty() {
        let sector = row
            .snapshot
            .identity
            .sector
            .as_deref()
            .map(|s| s.trim().to_lowercase());
        if !sector.is_some_and(|s| options.sectors.contains(&s)) {
            return false;
        }
    }

    true
}

// Computed once per row; text keys are already case-folded.
enum SortKey {
    Text(Option<String>),
    Number(Option<f64>),
}

fn sort_key(row: &AnalyzerRow, field: SortField) -> SortKey {
    let s = &row.snapshot;
    let number = |v: Option<f64>| SortKey::Number(v.filter(|v| v.is_finite()));
    match field {
        SortField::Symbol => SortKey::Text(Some(s.identity.symbol.to_lowercase())),
        SortField::Name => SortKey::Text(Some(s.identity.name.to_lowercase())),
        SortField::Sector => SortKey::Text(s.identity.sector.as_deref().map(str::to_lowercase)),
        SortField::Price => number(s.close()),
        SortField::ChangePercent => number(s.price.as_ref().and_then(|p| p.change_percent)),
        SortField::MarketCap => number(s.market_cap()),
        SortField::PeRatio => number(s.pe_ratio()),
        SortField::DividendYield => number(s.dividend_yield()),
        SortField::Risk => number(s.risk()),
        SortField::Upside => number(row.derived.upside),
        SortField::VerdictScore => number(row.derived.verdict.as_ref().map(|v| v.score)),
        SortField::OverallScore => number(s.overall_score()),
    }
}

fn compare_keys(a: &SortKey, b: &SortKey, dir: SortDir) -> Ordering {
    match (a, b) {
        (SortKey::Text(x), SortKey::Text(y)) => {
            compare_present(x.as_deref(), y.as_deref(), dir, |x, y| x.cmp(y))
        }
        (SortKey::Number(x), SortKey::Number(y)) => {
            compare_present(*x, *y, dir, |x, y| x.total_cmp(y))
        }
        _ => Ordering::Equal,
    }
}

/// Missing values go last in both directions.
fn compare_present<T>(
    a: Option<T>,
    b: Option<T>,
    dir: SortDir,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match dir {
            SortDir::Asc => cmp(&a, &b),
            SortDir::Desc => cmp(&b, &a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn render(s: &SecuritySnapshot, d: &DerivedMetrics) -> RowDisplay {
    RowDisplay {
        price: format_number(s.close(), 2),
        change_percent: format_percent(s.price.as_ref().and_then(|p| p.change_percent)),
        market_cap: format_market_cap(s.market_cap()),
        pe_ratio: format_number(s.pe_ratio(), 2),
        dividend_yield: format_number(s.dividend_yield(), 2),
        risk: format_number(s.risk(), 1),
        upside: format_percent(d.upside),
        downside: format_percent(d.downside),
        rating: d
            .verdict
            .as_ref()
            .map(|v| v.rating.label().to_string())
            .unwrap_or_else(|| UNAVAILABLE.to_string()),
        verdict_score: format_number(d.verdict.as_ref().map(|v| v.score), 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::options::{Comparison, PageLimits, UpsideFilter};
    use crate::domain::snapshot::{AiAnalysis, Fundamentals, PriceBar};
    use crate::verdict::Rating;
    use chrono::{TimeZone, Utc};

    fn security(
        symbol: &str,
        sector: Option<&str>,
        market_cap: Option<f64>,
        close: Option<f64>,
        risk: Option<f64>,
        bull: Option<f64>,
    ) -> SecuritySnapshot {
        SecuritySnapshot {
            identity: Identity {
                symbol: symbol.to_string(),
                name: format!("{symbol} Holdings"),
                sector: sector.map(str::to_string),
                exchange: Some("NASDAQ".to_string()),
            },
            price: close.map(|close| PriceBar {
                close,
                change_percent: Some(0.5),
                as_of: Utc.with_ymd_and_hms(2026, 3, 2, 21, 0, 0).unwrap(),
            }),
            fundamentals: market_cap.map(|m| Fundamentals {
                market_cap: Some(m),
                pe_ratio: Some(12.0),
                ..Default::default()
            }),
            analysis: risk.map(|r| AiAnalysis {
                risk_score: Some(r),
                bull_target: bull,
                overall_score: Some(8.0),
                ..Default::default()
            }),
            engagement: None,
        }
    }

    fn universe() -> Vec<SecuritySnapshot> {
        (0..120)
            .map(|i| {
                let sector = ["Technology", "Energy", "Health Care"][i % 3];
                security(
                    &format!("S{i:03}"),
                    Some(sector),
                    Some(1.0e9 * ((i * 37) % 101) as f64),
                    Some(100.0),
                    Some((i % 11) as f64),
                    Some(100.0 + (i % 60) as f64),
                )
            })
            .collect()
    }

    fn options() -> AnalyzerOptions {
        AnalyzerOptions::first_page(&PageLimits::default())
    }

    fn symbols(page: &AnalyzerPage) -> Vec<String> {
        page.items
            .iter()
            .map(|r| r.snapshot.identity.symbol.clone())
            .collect()
    }

    #[test]
    fn consecutive_pages_partition_a_larger_page() {
        let engine = VerdictEngine::default();
        let p1 = execute(universe(), &AnalyzerOptions { page: 1, limit: 25, ..options() }, &engine);
        let p2 = execute(universe(), &AnalyzerOptions { page: 2, limit: 25, ..options() }, &engine);
        let both = execute(universe(), &AnalyzerOptions { page: 1, limit: 50, ..options() }, &engine);

        let a = symbols(&p1);
        let b = symbols(&p2);
        assert_eq!(a.len(), 25);
        assert_eq!(b.len(), 25);
        assert!(a.iter().all(|s| !b.contains(s)));

        let mut union: Vec<String> = a.into_iter().chain(b).collect();
        let mut expected = symbols(&both);
        union.sort();
        expected.sort();
        assert_eq!(union, expected);
    }

    #[test]
    fn total_ignores_page_and_limit() {
        let engine = VerdictEngine::default();
        let filtered = AnalyzerOptions {
            sectors: vec!["energy".to_string()],
            ..options()
        };
        for (page, limit) in [(1, 5), (3, 7), (1, 100), (9, 10)] {
            let out = execute(
                universe(),
                &AnalyzerOptions {
                    page,
                    limit,
                    ..filtered.clone()
                },
                &engine,
            );
            assert_eq!(out.meta.total, 40);
            assert_eq!(out.meta.total_pages, 40u32.div_ceil(limit));
        }
    }

    #[test]
    fn page_past_end_clamps_to_last_page() {
        let out = execute(
            universe(),
            &AnalyzerOptions {
                page: 99,
                limit: 50,
                ..options()
            },
            &VerdictEngine::default(),
        );
        assert_eq!(out.meta.page, 3);
        assert_eq!(out.meta.total_pages, 3);
        assert_eq!(out.items.len(), 20);
    }

    #[test]
    fn empty_result_reports_first_page() {
        let out = execute(
            universe(),
            &AnalyzerOptions {
                search: Some("no-such-ticker".to_string()),
                ..options()
            },
            &VerdictEngine::default(),
        );
        assert_eq!(out.meta.total, 0);
        assert_eq!(out.meta.total_pages, 0);
        assert_eq!(out.meta.page, 1);
        assert!(out.items.is_empty());
    }

    #[test]
    fn sparse_row_is_kept_once_and_sorted_last() {
        let mut data = universe();
        let sparse = security("ZZZ", None, None, None, None, None);
        data.push(sparse.clone());
        data.push(sparse);

        let engine = VerdictEngine::default();
        let all = execute(
            data.clone(),
            &AnalyzerOptions {
                limit: 100,
                page: 2,
                ..options()
            },
            &engine,
        );
        assert_eq!(all.meta.total, 121);
        let last = all.items.last().unwrap();
        assert_eq!(last.snapshot.identity.symbol, "ZZZ");
        assert_eq!(last.display.market_cap, UNAVAILABLE);
        assert_eq!(last.display.rating, UNAVAILABLE);
        assert_eq!(last.display.upside, UNAVAILABLE);

        let asc = execute(
            data.clone(),
            &AnalyzerOptions {
                limit: 100,
                page: 2,
                sort_dir: SortDir::Asc,
                ..options()
            },
            &engine,
        );
        assert_eq!(asc.items.last().unwrap().snapshot.identity.symbol, "ZZZ");

        // Only filters that need the missing fields drop it.
        let by_sector = execute(
            data,
            &AnalyzerOptions {
                sectors: vec!["technology".to_string()],
                limit: 100,
                ..options()
            },
            &engine,
        );
        assert!(by_sector
            .items
            .iter()
            .all(|r| r.snapshot.identity.symbol != "ZZZ"));
    }

    #[test]
    fn rating_filter_uses_the_verdict_engine() {
        let engine = VerdictEngine::default();
        let out = execute(
            universe(),
            &AnalyzerOptions {
                ratings: vec![Rating::Sell],
                limit: 100,
                ..options()
            },
            &engine,
        );
        assert!(out.meta.total > 0);
        for row in &out.items {
            let input = row.snapshot.verdict_input().unwrap();
            assert_eq!(engine.evaluate(&input).rating, Rating::Sell);
        }
    }

    #[test]
    fn verdict_sort_matches_displayed_scores() {
        let out = execute(
            universe(),
            &AnalyzerOptions {
                sort_by: SortField::VerdictScore,
                limit: 100,
                ..options()
            },
            &VerdictEngine::default(),
        );
        let scores: Vec<f64> = out
            .items
            .iter()
            .map(|r| r.derived.verdict.as_ref().unwrap().score)
            .collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(
            out.items[0].display.verdict_score,
            format!("{:.1}", scores[0])
        );
    }

    #[test]
    fn risk_and_upside_filters_combine() {
        let out = execute(
            universe(),
            &AnalyzerOptions {
                risk: vec![RiskBucket::Low],
                upside: Some(UpsideFilter {
                    op: Comparison::Gt,
                    value: 30.0,
                }),
                limit: 100,
                ..options()
            },
            &VerdictEngine::default(),
        );
        assert!(out.meta.total > 0);
        for row in &out.items {
            assert!(row.snapshot.risk().unwrap() <= 3.0);
            assert!(row.derived.upside.unwrap() > 30.0);
        }
    }

    #[test]
    fn ties_break_by_symbol() {
        let data: Vec<_> = ["C", "A", "B"]
            .iter()
            .map(|s| security(s, None, Some(5.0e9), None, None, None))
            .collect();
        let out = execute(data, &options(), &VerdictEngine::default());
        assert_eq!(symbols(&out), vec!["A", "B", "C"]);
    }

    #[test]
    fn text_sort_ignores_case_and_keeps_missing_sector_last() {
        let data = vec![
            security("B", Some("energy"), Some(1.0e9), None, None, None),
            security("A", Some("Utilities"), Some(2.0e9), None, None, None),
            security("C", None, Some(3.0e9), None, None, None),
            security("D", Some("Energy"), Some(4.0e9), None, None, None),
        ];
        let engine = VerdictEngine::default();
        let asc = execute(
            data.clone(),
            &AnalyzerOptions {
                sort_by: SortField::Sector,
                sort_dir: SortDir::Asc,
                ..options()
            },
            &engine,
        );
        assert_eq!(symbols(&asc), vec!["B", "D", "A", "C"]);

        let desc = execute(
            data,
            &AnalyzerOptions {
                sort_by: SortField::Sector,
                sort_dir: SortDir::Desc,
                ..options()
            },
            &engine,
        );
        assert_eq!(symbols(&desc), vec!["A", "B", "D", "C"]);
    }

    #[test]
    fn search_matches_symbol_or_name() {
        let id = Identity {
            symbol: "AAPL".to_string(),
            name: "Apple Inc.".to_string(),
            sector: None,
            exchange: None,
        };
        assert!(matches_search(&id, "aap"));
        assert!(matches_search(&id, "APPLE"));
        assert!(!matches_search(&id, "msft"));
    }
}
