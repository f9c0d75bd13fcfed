//! Score and status computed from an attempt's data model

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{
    COMPLETION_STATUS, CompletionStatus, SCORE_SCALED, SUCCESS_STATUS, SuccessStatus,
};

/// The reportable result of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub score: Option<f64>,
    pub completion_status: CompletionStatus,
    pub success_status: SuccessStatus,
}

impl Outcome {
    /// Compute from materialized key values
    ///
    /// The score is `cmi.score.scaled` clamped to [0, 1]; a missing or
    /// non-numeric value yields no score.
    pub fn from_values(values: &BTreeMap<String, String>) -> Self {
        let score = values
            .get(SCORE_SCALED)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|s| s.is_finite())
            .map(|s| s.clamp(0.0, 1.0));

        let completion_status = values
            .get(COMPLETION_STATUS)
            .map(|v| CompletionStatus::from_value(v))
            .unwrap_or(CompletionStatus::NotAttempted);

        let success_status = values
            .get(SUCCESS_STATUS)
            .map(|v| SuccessStatus::from_value(v))
            .unwrap_or(SuccessStatus::Unknown);

        Self {
            score,
            completion_status,
            success_status,
        }
    }

    /// Score used to rank attempts; no score ranks below every score
    pub(crate) fn rank(&self) -> f64 {
        self.score.unwrap_or(f64::NEG_INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn reads_score_and_statuses() {
        let outcome = Outcome::from_values(&values(&[
            (SCORE_SCALED, "0.75"),
            (COMPLETION_STATUS, "completed"),
            (SUCCESS_STATUS, "passed"),
        ]));
        assert_eq!(outcome.score, Some(0.75));
        assert_eq!(outcome.completion_status, CompletionStatus::Completed);
        assert_eq!(outcome.success_status, SuccessStatus::Passed);
    }

    #[test]
    fn clamps_scaled_score() {
        let low = Outcome::from_values(&values(&[(SCORE_SCALED, "-0.5")]));
        let high = Outcome::from_values(&values(&[(SCORE_SCALED, "1.2")]));
        assert_eq!(low.score, Some(0.0));
        assert_eq!(high.score, Some(1.0));
    }

    #[test]
    fn missing_or_garbage_score_is_none() {
        let empty = Outcome::from_values(&BTreeMap::new());
        assert_eq!(empty.score, None);
        assert_eq!(empty.completion_status, CompletionStatus::NotAttempted);
        assert_eq!(empty.success_status, SuccessStatus::Unknown);

        let garbage = Outcome::from_values(&values(&[(SCORE_SCALED, "NaN")]));
        assert_eq!(garbage.score, None);
        assert_eq!(garbage.rank(), f64::NEG_INFINITY);
    }
}
