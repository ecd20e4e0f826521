//! Repayment-behaviour scores.

use crate::domain::{Decimal, MONEY_DP};
use std::str::FromStr;

/// Weights and horizon for the timeliness and health scores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreWeights {
    /// Days without a payment after which recency reaches zero.
    pub recency_horizon_days: i64,
    pub timeliness_recency: Decimal,
    pub timeliness_punctuality: Decimal,
    pub health_timeliness: Decimal,
    pub health_collection: Decimal,
    pub health_punctuality: Decimal,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        let w = |s: &str| Decimal::from_str(s).unwrap_or_default();
        Self {
            recency_horizon_days: 30,
            timeliness_recency: w("0.6"),
            timeliness_punctuality: w("0.4"),
            health_timeliness: w("0.4"),
            health_collection: w("0.4"),
            health_punctuality: w("0.2"),
        }
    }
}

impl ScoreWeights {
    /// Check the weights can produce a score.
    ///
    /// # Errors
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.recency_horizon_days <= 0 {
            return Err(format!(
                "recency horizon must be positive (got {})",
                self.recency_horizon_days
            ));
        }
        let all = [
            ("timeliness_recency", self.timeliness_recency),
            ("timeliness_punctuality", self.timeliness_punctuality),
            ("health_timeliness", self.health_timeliness),
            ("health_collection", self.health_collection),
            ("health_punctuality", self.health_punctuality),
        ];
        for (name, value) in all {
            if value.is_negative() {
                return Err(format!("{} must not be negative (got {})", name, value));
            }
        }
        if !(self.timeliness_recency + self.timeliness_punctuality).is_positive() {
            return Err("timeliness weights must have a positive sum".to_string());
        }
        if !(self.health_timeliness + self.health_collection + self.health_punctuality)
            .is_positive()
        {
            return Err("health weights must have a positive sum".to_string());
        }
        Ok(())
    }

    /// `1 - min(days_since_last / horizon, 1)`.
    pub fn recency(&self, days_since_last_repayment: i64) -> Decimal {
        let horizon = Decimal::from_i64(self.recency_horizon_days.max(1));
        let elapsed = Decimal::from_i64(days_since_last_repayment.max(0));
        let ratio = (elapsed / horizon).min(Decimal::one());
        Decimal::one() - ratio
    }

    /// Timeliness in `[0, 100]`, 2 dp.
    pub fn timeliness(&self, days_since_last_repayment: i64, delay_rate: Decimal) -> Decimal {
        let recency = self.recency(days_since_last_repayment);
        let punctuality = Decimal::one() - delay_rate;
        to_score(weighted_mean(&[
            (recency, self.timeliness_recency),
            (punctuality, self.timeliness_punctuality),
        ]))
    }

    /// Health in `[0, 100]`, 2 dp.
    pub fn health(
        &self,
        timeliness: Decimal,
        collection_ratio: Decimal,
        delay_rate: Decimal,
    ) -> Decimal {
        let punctuality = Decimal::one() - delay_rate;
        to_score(weighted_mean(&[
            (timeliness / Decimal::hundred(), self.health_timeliness),
            (collection_ratio, self.health_collection),
            (punctuality, self.health_punctuality),
        ]))
    }
}

fn weighted_mean(parts: &[(Decimal, Decimal)]) -> Decimal {
    let weight_sum: Decimal = parts.iter().map(|(_, w)| *w).sum();
    let weighted: Decimal = parts.iter().map(|(v, w)| *v * *w).sum();
    weighted.checked_div(weight_sum).unwrap_or_default()
}

fn to_score(fraction: Decimal) -> Decimal {
    (fraction * Decimal::hundred())
        .clamp(Decimal::zero(), Decimal::hundred())
        .round_dp(MONEY_DP)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_default_weights_are_valid() {
        assert!(ScoreWeights::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_sum_and_negatives() {
        let mut w = ScoreWeights::default();
        w.timeliness_recency = Decimal::zero();
        w.timeliness_punctuality = Decimal::zero();
        assert!(w.validate().is_err());

        let mut w = ScoreWeights::default();
        w.health_collection = d("-0.1");
        assert!(w.validate().is_err());

        let mut w = ScoreWeights::default();
        w.recency_horizon_days = 0;
        assert!(w.validate().is_err());
    }

    #[test]
    fn test_recency_saturates_at_horizon() {
        let w = ScoreWeights::default();
        assert_eq!(w.recency(0), Decimal::one());
        assert_eq!(w.recency(15), d("0.5"));
        assert_eq!(w.recency(30), Decimal::zero());
        assert_eq!(w.recency(400), Decimal::zero());
    }

    #[test]
    fn test_perfect_and_worst_scores() {
        let w = ScoreWeights::default();
        let best = w.timeliness(0, Decimal::zero());
        assert_eq!(best, d("100"));
        assert_eq!(w.health(best, Decimal::one(), Decimal::zero()), d("100"));

        let worst = w.timeliness(90, Decimal::one());
        assert_eq!(worst, Decimal::zero());
        assert_eq!(w.health(worst, Decimal::zero(), Decimal::one()), Decimal::zero());
    }

    #[test]
    fn test_timeliness_weighting() {
        let w = ScoreWeights::default();
        // recency 0.5, punctuality 0.75 -> 0.6*0.5 + 0.4*0.75 = 0.6
        assert_eq!(w.timeliness(15, d("0.25")), d("60"));
    }
}
