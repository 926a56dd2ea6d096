//! Market-cap parsing and percentage helpers shared by the analyzer and its displays.

/// Rendered in place of a value that is absent, so "no data" never looks like zero.
pub const UNAVAILABLE: &str = "unavailable";

/// Parses provider market-cap text such as `"2.9T"`, `"$812.4B"`, `"1,250,000"`.
pub fn parse_market_cap(text: &str) -> Option<f64> {
    let s = text.trim().trim_start_matches('$').replace(',', "");
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (digits, multiplier) = match s.chars().last()?.to_ascii_uppercase() {
        'K' => (&s[..s.len() - 1], 1.0e3),
        'M' => (&s[..s.len() - 1], 1.0e6),
        'B' => (&s[..s.len() - 1], 1.0e9),
        'T' => (&s[..s.len() - 1], 1.0e12),
        _ => (s, 1.0),
    };

    let value = digits.trim().parse::<f64>().ok()?;
    let out = value * multiplier;
    out.is_finite().then_some(out)
}

pub fn format_market_cap(value: Option<f64>) -> String {
    let Some(v) = value.filter(|v| v.is_finite()) else {
        return UNAVAILABLE.to_string();
    };

    let abs = v.abs();
    if abs >= 1.0e12 {
        format!("${:.2}T", v / 1.0e12)
    } else if abs >= 1.0e9 {
        format!("${:.2}B", v / 1.0e9)
    } else if abs >= 1.0e6 {
        format!("${:.2}M", v / 1.0e6)
    } else if abs >= 1.0e3 {
        format!("${:.2}K", v / 1.0e3)
    } else {
        format!("${v:.2}")
    }
}

/// Percent move from `from` to `to`.
pub fn percent_distance(from: Option<f64>, to: Option<f64>) -> Option<f64> {
    let from = from.filter(|v| v.is_finite() && *v > 0.0)?;
    let to = to.filter(|v| v.is_finite())?;
    Some((to - from) * 100.0 / from)
}

pub fn format_percent(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format!("{v:+.2}%"),
        None => UNAVAILABLE.to_string(),
    }
}

pub fn format_number(value: Option<f64>, decimals: usize) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format!("{v:.decimals$}"),
        None => UNAVAILABLE.to_string(),
    }
}
