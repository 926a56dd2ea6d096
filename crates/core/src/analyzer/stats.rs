use crate::domain::snapshot::SecuritySnapshot;
use crate::verdict::{approximate_rating, Rating, VerdictEngine};
use serde::Serialize;
use std::collections::BTreeMap;

/// Rating counters for dashboard badges and admin views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingDistribution {
    pub total: usize,
    pub counts: BTreeMap<Rating, usize>,
    /// Rows lacking the risk or upside needed for a verdict.
    pub unavailable: usize,
}

pub fn rating_distribution(snapshots: &[SecuritySnapshot], engine: &VerdictEngine) -> RatingDistribution {
    let mut counts: BTreeMap<Rating, usize> = Rating::ALL.iter().map(|r| (*r, 0)).collect();
    let mut unavailable = 0;

    for s in snapshots {
        match s.verdict_input() {
            Some(input) => *counts.entry(engine.evaluate(&input).rating).or_default() += 1,
            None => unavailable += 1,
        }
    }

    RatingDistribution {
        total: snapshots.len(),
        counts,
        unavailable,
    }
}

/// How often the reduced risk/upside rule set agrees with the full engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproximationDrift {
    pub compared: usize,
    pub agreed: usize,
    /// `"<full> -> <approximate>"` pairs that disagreed.
    pub mismatches: BTreeMap<String, usize>,
}

pub fn approximation_drift(snapshots: &[SecuritySnapshot], engine: &VerdictEngine) -> ApproximationDrift {
    let mut out = ApproximationDrift {
        compared: 0,
        agreed: 0,
        mismatches: BTreeMap::new(),
    };

    for input in snapshots.iter().filter_map(SecuritySnapshot::verdict_input) {
        let full = engine.evaluate(&input).rating;
        let approx = approximate_rating(input.risk, input.upside).rating();
        out.compared += 1;
        if full == approx {
            out.agreed += 1;
        } else {
            *out.mismatches.entry(format!("{full} -> {approx}")).or_default() += 1;
        }
    }

    out
}
