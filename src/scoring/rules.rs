//! Per-record scoring rules for ordinal three-class forecasts.
//!
//! RPS over K ordered classes with cumulative forecast F and cumulative
//! one-hot outcome O:
//!
//!   RPS = 1/(K-1) * sum_{k=1}^{K-1} (F_k - O_k)^2
//!
//! The last cumulative term is always 1 - 1 and drops out. 0 is a perfect
//! forecast, 1 is full confidence in the wrong extreme.

use crate::forecast::{ClassProbabilities, PredictionResult, SalesCategory};

/// Floor applied to the true-class probability before taking the log.
const LOG_FLOOR: f64 = 1e-15;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct RecordScore {
    pub true_class: SalesCategory,
    pub correct: u8,
    pub rps: f64,
    pub log_score: f64,
    pub ordinal_mae: f64,
}

#[inline]
pub fn ranked_probability_score(p: &ClassProbabilities, truth: SalesCategory) -> f64 {
    let forecast = [p.low, p.low + p.mid];
    let t = truth.index();
    let mut sum = 0.0;
    for (k, f) in forecast.iter().enumerate() {
        let observed = if t <= k { 1.0 } else { 0.0 };
        sum += (f - observed) * (f - observed);
    }
    sum / 2.0
}

/// Negative log-likelihood of the true class.
#[inline]
pub fn log_score(p: &ClassProbabilities, truth: SalesCategory) -> f64 {
    -p.get(truth).max(LOG_FLOOR).ln()
}

#[inline]
pub fn ordinal_error(predicted: SalesCategory, truth: SalesCategory) -> f64 {
    (predicted.index() as f64 - truth.index() as f64).abs()
}

/// Score a live prediction against a known outcome, the same way the
/// stored month results were scored.
pub fn score_prediction(result: &PredictionResult, truth: SalesCategory) -> RecordScore {
    let p = result.probabilities();
    RecordScore {
        true_class: truth,
        correct: u8::from(result.pred_class == truth),
        rps: ranked_probability_score(&p, truth),
        log_score: log_score(&p, truth),
        ordinal_mae: ordinal_error(result.pred_class, truth),
    }
}
