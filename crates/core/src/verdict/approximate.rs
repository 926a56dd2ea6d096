use super::Rating;
use serde::Serialize;

/// Rating from the reduced risk/upside-only rule set.
///
/// This is NOT the verdict engine and is not guaranteed to agree with it for the same
/// security. It exists for views that only hold raw risk and upside numbers; the wrapper
/// keeps it from being passed where a full [`super::VerdictResult`] rating is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ApproximateRating(pub Rating);

impl ApproximateRating {
    pub fn rating(self) -> Rating {
        self.0
    }
}

pub fn approximate_rating(risk: f64, upside: f64) -> ApproximateRating {
    let rating = if upside > 20.0 && risk <= 6.0 {
        Rating::StrongBuy
    } else if upside > 10.0 && risk <= 7.0 {
        Rating::Buy
    } else if upside < 0.0 || risk >= 8.0 {
        Rating::Sell
    } else {
        Rating::Hold
    };
    ApproximateRating(rating)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::{evaluate, VerdictInput};

    #[test]
    fn reduced_rule_set() {
        assert_eq!(approximate_rating(6.0, 20.5).rating(), Rating::StrongBuy);
        assert_eq!(approximate_rating(6.5, 20.5).rating(), Rating::Buy);
        assert_eq!(approximate_rating(7.0, 10.5).rating(), Rating::Buy);
        assert_eq!(approximate_rating(7.5, 10.5).rating(), Rating::Hold);
        assert_eq!(approximate_rating(2.0, -0.1).rating(), Rating::Sell);
        assert_eq!(approximate_rating(8.0, 5.0).rating(), Rating::Sell);
        assert_eq!(approximate_rating(5.0, 10.0).rating(), Rating::Hold);
    }

    #[test]
    fn upside_beats_high_risk_when_rules_overlap() {
        // The Buy rule is checked before the Sell rule.
        assert_eq!(approximate_rating(7.0, 15.0).rating(), Rating::Buy);
    }

    #[test]
    fn can_disagree_with_full_engine() {
        let approx = approximate_rating(2.0, 25.0).rating();
        let full = evaluate(&VerdictInput {
            risk: 2.0,
            upside: 25.0,
            ..Default::default()
        })
        .rating;
        assert_eq!(approx, Rating::StrongBuy);
        assert_eq!(full, Rating::Hold);
    }
}
