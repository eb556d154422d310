use crate::forecast::{ClassProbabilities, SalesCategory};
use serde::{Deserialize, Serialize};

/// One precomputed, already-scored prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthResult {
    pub model: String,
    pub version: String,
    pub month: String,
    pub true_class: SalesCategory,
    pub pred_class: SalesCategory,
    /// 1 when `pred_class == true_class`, else 0.
    pub correct: u8,
    #[serde(rename = "prob_L")]
    pub prob_l: f64,
    #[serde(rename = "prob_M")]
    pub prob_m: f64,
    #[serde(rename = "prob_H")]
    pub prob_h: f64,
    pub rps: f64,
    pub log_score: f64,
    pub ordinal_mae: f64,
    #[serde(rename = "step1_b", default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub notes: String,
}

impl MonthResult {
    #[inline]
    pub fn is_correct(&self) -> bool {
        self.correct == 1
    }

    pub fn probabilities(&self) -> ClassProbabilities {
        ClassProbabilities::new(self.prob_l, self.prob_m, self.prob_h)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthMonth {
    pub month: String,
    pub label: String,
    pub true_class: SalesCategory,
    pub true_sales_qty: u32,
    pub description: String,
}

/// Human-readable category boundaries, e.g. `"≤ 363"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cutpoints {
    #[serde(rename = "Low")]
    pub low: String,
    #[serde(rename = "Mid")]
    pub mid: String,
    #[serde(rename = "High")]
    pub high: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub months: Vec<GroundTruthMonth>,
    pub cutpoints: Cutpoints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Critical,
    Minor,
    None,
    Positive,
}

/// Effect of dropping one feature group from the reasoning strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AblationRow {
    pub id: String,
    pub label: String,
    pub features_removed: String,
    pub dir_acc: f64,
    pub avg_ordinal_mae: f64,
    pub avg_rps: f64,
    /// RPS change versus the full-feature baseline.
    pub delta_rps: f64,
    pub impact: Impact,
}
