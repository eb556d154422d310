//! Aggregate accuracy metrics over precomputed month results.
//! All functions are pure -- they take records and return computed values.

pub mod rules;

use crate::forecast::{ModelId, PromptVersion, SalesCategory};
use crate::store::types::{GroundTruth, MonthResult};

#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize)]
pub struct Stats {
    pub directional_accuracy: f64,
    pub average_rps: f64,
    pub average_ordinal_mae: f64,
    pub correct: usize,
    pub total: usize,
}

/// Directional accuracy, mean RPS and mean ordinal MAE in one pass.
/// Empty input yields all zeros.
pub fn compute_stats(records: &[MonthResult]) -> Stats {
    if records.is_empty() {
        return Stats::default();
    }
    let n = records.len() as f64;
    let correct = records.iter().filter(|r| r.is_correct()).count();
    let rps_sum: f64 = records.iter().map(|r| r.rps).sum();
    let mae_sum: f64 = records.iter().map(|r| r.ordinal_mae).sum();

    Stats {
        directional_accuracy: correct as f64 / n,
        average_rps: rps_sum / n,
        average_ordinal_mae: mae_sum / n,
        correct,
        total: records.len(),
    }
}

/// One bar group of the model × strategy comparison.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ComparisonRow {
    pub name: String,
    pub model: ModelId,
    pub version: PromptVersion,
    /// Mean RPS, 4 decimals.
    pub rps: f64,
    /// Directional accuracy in percent, 1 decimal.
    pub dirac: f64,
    /// Mean ordinal MAE, 3 decimals.
    pub mae: f64,
}

pub fn compare_models(all: &[MonthResult]) -> Vec<ComparisonRow> {
    let mut rows = Vec::with_capacity(ModelId::ALL.len() * PromptVersion::ALL.len());
    for model in ModelId::ALL {
        for version in PromptVersion::ALL {
            let subset: Vec<MonthResult> = all
                .iter()
                .filter(|r| r.model == model.as_str() && r.version == version.as_str())
                .cloned()
                .collect();
            let stats = compute_stats(&subset);
            rows.push(ComparisonRow {
                name: format!("{} {}", model.label(), version),
                model,
                version,
                rps: round_to(stats.average_rps, 4),
                dirac: round_to(stats.directional_accuracy * 100.0, 1),
                mae: round_to(stats.average_ordinal_mae, 3),
            });
        }
    }
    rows
}

/// Probability split for one ground-truth month, in whole percent.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MonthDistribution {
    pub month: String,
    pub label: String,
    pub prob_l_pct: f64,
    pub prob_m_pct: f64,
    pub prob_h_pct: f64,
    pub true_class: SalesCategory,
    /// None when the result set has no record for this month.
    pub correct: Option<u8>,
}

pub fn month_distribution(results: &[MonthResult], truth: &GroundTruth) -> Vec<MonthDistribution> {
    truth
        .months
        .iter()
        .map(|gt| {
            let row = results.iter().find(|r| r.month == gt.month);
            let p = row.map(MonthResult::probabilities);
            let pct = |v: Option<f64>| v.map_or(0.0, |x| (x * 100.0).round());
            MonthDistribution {
                month: gt.month.clone(),
                label: gt.label.clone(),
                prob_l_pct: pct(p.map(|p| p.low)),
                prob_m_pct: pct(p.map(|p| p.mid)),
                prob_h_pct: pct(p.map(|p| p.high)),
                true_class: gt.true_class,
                correct: row.map(|r| r.correct),
            }
        })
        .collect()
}

#[inline]
fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
