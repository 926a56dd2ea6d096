use crate::error::{AnalyzerError, AnalyzerResult};
use crate::verdict::Rating;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw query-string parameters. Everything is text so that malformed values surface as
/// validation errors instead of extractor rejections.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
    pub search: Option<String>,
    /// Comma-separated risk buckets.
    pub risk: Option<String>,
    /// Comma-separated rating labels.
    pub ai_rating: Option<String>,
    /// `<op>:<value>`, or a bare number meaning `gte`.
    pub upside: Option<String>,
    /// Comma-separated sector names.
    pub sector: Option<String>,
    /// Anything else the client sent. Non-empty fails validation.
    #[serde(flatten)]
    pub unknown: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: 25,
            max_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Symbol,
    Name,
    Sector,
    Price,
    ChangePercent,
    MarketCap,
    PeRatio,
    DividendYield,
    Risk,
    Upside,
    VerdictScore,
    OverallScore,
}

impl SortField {
    pub fn parse(s: &str) -> Option<Self> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        Some(match key.as_str() {
            "symbol" => Self::Symbol,
            "name" => Self::Name,
            "sector" => Self::Sector,
            "price" => Self::Price,
            "changepercent" => Self::ChangePercent,
            "marketcap" => Self::MarketCap,
            "peratio" => Self::PeRatio,
            "dividendyield" => Self::DividendYield,
            "risk" => Self::Risk,
            "upside" => Self::Upside,
            "verdictscore" => Self::VerdictScore,
            "overallscore" => Self::OverallScore,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Symbol => "symbol",
            Self::Name => "name",
            Self::Sector => "sector",
            Self::Price => "price",
            Self::ChangePercent => "changePercent",
            Self::MarketCap => "marketCap",
            Self::PeRatio => "peRatio",
            Self::DividendYield => "dividendYield",
            Self::Risk => "risk",
            Self::Upside => "upside",
            Self::VerdictScore => "verdictScore",
            Self::OverallScore => "overallScore",
        }
    }

    pub fn is_textual(self) -> bool {
        matches!(self, Self::Symbol | Self::Name | Self::Sector)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Some(Self::Asc),
            "DESC" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Risk bands aligned with the verdict engine's risk terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBucket {
    Low,
    Medium,
    High,
    Extreme,
}

impl RiskBucket {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "extreme" => Some(Self::Extreme),
            _ => None,
        }
    }

    pub fn of(risk: f64) -> Option<Self> {
        if !risk.is_finite() {
            None
        } else if risk >= 8.0 {
            Some(Self::Extreme)
        } else if risk >= 6.0 {
            Some(Self::High)
        } else if risk > 3.0 {
            Some(Self::Medium)
        } else {
            Some(Self::Low)
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Extreme => "extreme",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    fn as_str(self) -> &'static str {
        match self {
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UpsideFilter {
    pub op: Comparison,
    pub value: f64,
}

impl UpsideFilter {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (op, value) = match s.split_once(':') {
            Some((op, value)) => {
                let op = match op.trim().to_ascii_lowercase().as_str() {
                    "gt" => Comparison::Gt,
                    "gte" => Comparison::Gte,
                    "lt" => Comparison::Lt,
                    "lte" => Comparison::Lte,
                    _ => return None,
                };
                (op, value)
            }
            None => (Comparison::Gte, s),
        };
        let value = value.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
        Some(Self { op, value })
    }

    pub fn matches(&self, upside: f64) -> bool {
        match self.op {
            Comparison::Gt => upside > self.value,
            Comparison::Gte => upside >= self.value,
            Comparison::Lt => upside < self.value,
            Comparison::Lte => upside <= self.value,
        }
    }
}

/// Validated analyzer query. Lists are sorted and deduplicated so equal queries compare
/// (and cache) equal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerOptions {
    pub page: u32,
    pub limit: u32,
    pub sort_by: SortField,
    pub sort_dir: SortDir,
    pub search: Option<String>,
    pub risk: Vec<RiskBucket>,
    pub ratings: Vec<Rating>,
    pub upside: Option<UpsideFilter>,
    pub sectors: Vec<String>,
}

impl AnalyzerOptions {
    pub fn first_page(limits: &PageLimits) -> Self {
        Self {
            page: 1,
            limit: limits.default_limit,
            sort_by: SortField::MarketCap,
            sort_dir: SortDir::Desc,
            search: None,
            risk: Vec::new(),
            ratings: Vec::new(),
            upside: None,
            sectors: Vec::new(),
        }
    }

    pub fn from_params(params: &AnalyzerParams, limits: &PageLimits) -> AnalyzerResult<Self> {
        if let Some(key) = params.unknown.keys().next() {
            return Err(AnalyzerError::validation(
                "query",
                format!("unknown parameter: {key:?}"),
            ));
        }

        let mut out = Self::first_page(limits);

        if let Some(page) = non_empty(&params.page) {
            let page: u32 = page
                .parse()
                .map_err(|_| AnalyzerError::validation("page", format!("not an integer: {page:?}")))?;
            if page < 1 {
                return Err(AnalyzerError::validation("page", "must be >= 1"));
            }
            out.page = page;
        }

        if let Some(limit) = non_empty(&params.limit) {
            let limit: u32 = limit.parse().map_err(|_| {
                AnalyzerError::validation("limit", format!("not an integer: {limit:?}"))
            })?;
            if limit < 1 || limit > limits.max_limit {
                return Err(AnalyzerError::validation(
                    "limit",
                    format!("must be within 1..={} (got {limit})", limits.max_limit),
                ));
            }
            out.limit = limit;
        }

        if let Some(sort_by) = non_empty(&params.sort_by) {
            out.sort_by = SortField::parse(sort_by).ok_or_else(|| {
                AnalyzerError::validation("sortBy", format!("unknown field: {sort_by:?}"))
            })?;
            // Text columns read naturally A-Z when only the field is given.
            if out.sort_by.is_textual() {
                out.sort_dir = SortDir::Asc;
            }
        }

        if let Some(sort_dir) = non_empty(&params.sort_dir) {
            out.sort_dir = SortDir::parse(sort_dir).ok_or_else(|| {
                AnalyzerError::validation("sortDir", format!("expected ASC or DESC, got {sort_dir:?}"))
            })?;
        }

        out.search = non_empty(&params.search).map(str::to_string);

        out.risk = parse_list(&params.risk, "risk", RiskBucket::parse)?;
        out.ratings = parse_list(&params.ai_rating, "aiRating", |s| s.parse::<Rating>().ok())?;

        if let Some(upside) = non_empty(&params.upside) {
            out.upside = Some(UpsideFilter::parse(upside).ok_or_else(|| {
                AnalyzerError::validation(
                    "upside",
                    format!("expected <gt|gte|lt|lte>:<number> or a number, got {upside:?}"),
                )
            })?);
        }

        out.sectors = parse_list(&params.sector, "sector", |s| Some(s.to_lowercase()))?;

        Ok(out)
    }

    /// Canonical text form; equal for any two requests that must return the same page.
    /// Free text is debug-quoted so separators inside it cannot alias another query.
    pub fn cache_key(&self) -> String {
        let risk: Vec<&str> = self.risk.iter().map(|r| r.as_str()).collect();
        let ratings: Vec<&str> = self.ratings.iter().map(|r| r.label()).collect();
        let upside = self
            .upside
            .map(|u| format!("{}:{}", u.op.as_str(), u.value));
        format!(
            "p={};l={};s={};d={:?};q={:?};r={:?};v={:?};u={:?};sec={:?}",
            self.page,
            self.limit,
            self.sort_by.as_str(),
            self.sort_dir,
            self.search.as_deref().map(str::to_lowercase),
            risk,
            ratings,
            upside,
            self.sectors,
        )
    }

    pub fn has_filters(&self) -> bool {
        self.search.is_some()
            || !self.risk.is_empty()
            || !self.ratings.is_empty()
            || self.upside.is_some()
            || !self.sectors.is_empty()
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_list<T: Ord>(
    raw: &Option<String>,
    field: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> AnalyzerResult<Vec<T>> {
    let Some(raw) = non_empty(raw) else {
        return Ok(Vec::new());
    };

    let mut out = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let v = parse(part).ok_or_else(|| {
            AnalyzerError::validation(field, format!("unrecognized value: {part:?}"))
        })?;
        out.push(v);
    }
    out.sort();
    out.dedup();
    Ok(out)
}
