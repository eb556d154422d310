pub mod features;
pub mod parser;
pub mod prompts;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Upper bound (inclusive) of the Low category, bottles/month.
pub const LOW_MAX_QTY: u32 = 363;
/// Upper bound (inclusive) of the Mid category, bottles/month.
pub const MID_MAX_QTY: u32 = 446;

/// Most historical months a feature record carries as few-shot context.
pub const MAX_HISTORY: usize = 7;

// ── Categories ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SalesCategory {
    Low,
    Mid,
    High,
}

impl SalesCategory {
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Self::Low => 0,
            Self::Mid => 1,
            Self::High => 2,
        }
    }

    pub fn from_quantity(qty: u32) -> Self {
        if qty <= LOW_MAX_QTY {
            Self::Low
        } else if qty <= MID_MAX_QTY {
            Self::Mid
        } else {
            Self::High
        }
    }
}

impl std::fmt::Display for SalesCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Mid => write!(f, "Mid"),
            Self::High => write!(f, "High"),
        }
    }
}

// ── Prompt strategy ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromptVersion {
    /// Direct prediction.
    #[serde(rename = "vA")]
    Direct,
    /// Two-step chain-of-thought.
    #[serde(rename = "vB")]
    Reasoning,
}

impl PromptVersion {
    pub const ALL: [PromptVersion; 2] = [Self::Direct, Self::Reasoning];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "vA",
            Self::Reasoning => "vB",
        }
    }
}

impl std::fmt::Display for PromptVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Models and providers ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelId {
    #[serde(rename = "gpt-4o")]
    Gpt4o,
    #[serde(rename = "haiku")]
    Haiku,
    #[serde(rename = "mini")]
    Mini,
}

/// Which completion API a model is served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Chat-completions API with bearer auth; carries the upstream model name.
    OpenAi { model: &'static str },
    /// Messages API with an api-key header and a fixed model.
    Anthropic,
}

pub const ANTHROPIC_MODEL: &str = "claude-3-haiku-20240307";

impl ModelId {
    pub const ALL: [ModelId; 3] = [Self::Gpt4o, Self::Haiku, Self::Mini];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gpt4o => "gpt-4o",
            Self::Haiku => "haiku",
            Self::Mini => "mini",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Gpt4o => "GPT-4o",
            Self::Haiku => "Claude Haiku",
            Self::Mini => "GPT-4o-mini",
        }
    }

    /// Stem of the precomputed results file, `{stem}_{version}.json`.
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::Gpt4o => "gpt4o",
            Self::Haiku => "haiku",
            Self::Mini => "mini",
        }
    }

    pub fn provider(self) -> Provider {
        match self {
            Self::Gpt4o => Provider::OpenAi { model: "gpt-4o" },
            Self::Mini => Provider::OpenAi { model: "gpt-4o-mini" },
            Self::Haiku => Provider::Anthropic,
        }
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Provider {
    pub fn name(self) -> &'static str {
        match self {
            Self::OpenAi { .. } => "OpenAI",
            Self::Anthropic => "Anthropic",
        }
    }
}

// ── Feature input ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSale {
    pub month: String,
    pub qty: u32,
}

/// One month's input signal. Built once from an uploaded row, then handed
/// to the predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub month: String,
    pub avg_temp_taipei: f64,
    pub epidemic_index: f64,
    pub gt_flu: i64,
    pub gt_cold: i64,
    pub gt_immunity: i64,
    pub gt_competitor_total: f64,
    #[serde(default)]
    pub has_bundle_promo: bool,
    #[serde(default)]
    pub bundle_discount_rate: f64,
    #[serde(default)]
    pub bundle_start_date: String,
    #[serde(default)]
    pub bundle_duration_days: u32,
    #[serde(default)]
    pub has_bulk_promo: bool,
    #[serde(default)]
    pub bulk_discount_rate: f64,
    #[serde(default)]
    pub season_event_tag: String,
    #[serde(default)]
    pub historical_sales: SmallVec<[HistoricalSale; MAX_HISTORY]>,
}

// ── Prediction output ──

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassProbabilities {
    #[serde(rename = "prob_L")]
    pub low: f64,
    #[serde(rename = "prob_M")]
    pub mid: f64,
    #[serde(rename = "prob_H")]
    pub high: f64,
}

impl ClassProbabilities {
    pub fn new(low: f64, mid: f64, high: f64) -> Self {
        Self { low, mid, high }
    }

    #[inline]
    pub fn get(&self, class: SalesCategory) -> f64 {
        match class {
            SalesCategory::Low => self.low,
            SalesCategory::Mid => self.mid,
            SalesCategory::High => self.high,
        }
    }

    /// Arg-max over (Low, Mid, High). A later class replaces the current
    /// best on an exact tie, so a three-way tie selects High.
    pub fn predicted_class(&self) -> SalesCategory {
        let mut best = SalesCategory::Low;
        for class in [SalesCategory::Mid, SalesCategory::High] {
            if self.get(class) >= self.get(best) {
                best = class;
            }
        }
        best
    }
}

/// Output of one LLM call. Probabilities are reported as given; they are
/// not renormalised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(rename = "prob_L")]
    pub prob_l: f64,
    #[serde(rename = "prob_M")]
    pub prob_m: f64,
    #[serde(rename = "prob_H")]
    pub prob_h: f64,
    pub pred_class: SalesCategory,
    #[serde(rename = "step1_b", default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub raw_output: String,
}

impl PredictionResult {
    pub fn probabilities(&self) -> ClassProbabilities {
        ClassProbabilities::new(self.prob_l, self.prob_m, self.prob_h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_quantity_cutpoints() {
        assert_eq!(SalesCategory::from_quantity(0), SalesCategory::Low);
        assert_eq!(SalesCategory::from_quantity(363), SalesCategory::Low);
        assert_eq!(SalesCategory::from_quantity(364), SalesCategory::Mid);
        assert_eq!(SalesCategory::from_quantity(446), SalesCategory::Mid);
        assert_eq!(SalesCategory::from_quantity(447), SalesCategory::High);
        assert_eq!(SalesCategory::from_quantity(904), SalesCategory::High);
    }

    #[test]
    fn test_predicted_class_is_argmax() {
        assert_eq!(ClassProbabilities::new(0.6, 0.3, 0.1).predicted_class(), SalesCategory::Low);
        assert_eq!(ClassProbabilities::new(0.1, 0.7, 0.2).predicted_class(), SalesCategory::Mid);
        assert_eq!(ClassProbabilities::new(0.1, 0.2, 0.7).predicted_class(), SalesCategory::High);
    }

    #[test]
    fn test_ties_go_to_later_class() {
        let third = 1.0 / 3.0;
        assert_eq!(ClassProbabilities::new(third, third, third).predicted_class(), SalesCategory::High);
        assert_eq!(ClassProbabilities::new(0.4, 0.4, 0.2).predicted_class(), SalesCategory::Mid);
        assert_eq!(ClassProbabilities::new(0.2, 0.4, 0.4).predicted_class(), SalesCategory::High);
        assert_eq!(ClassProbabilities::new(0.4, 0.2, 0.4).predicted_class(), SalesCategory::High);
        assert_eq!(ClassProbabilities::default().predicted_class(), SalesCategory::High);
    }

    #[test]
    fn test_selected_probability_dominates() {
        let grid = [0.0, 0.1, 0.25, 0.5, 0.75, 1.0];
        for &a in &grid {
            for &b in &grid {
                for &c in &grid {
                    let p = ClassProbabilities::new(a, b, c);
                    let chosen = p.get(p.predicted_class());
                    assert!(chosen >= a && chosen >= b && chosen >= c);
                }
            }
        }
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&PromptVersion::Reasoning).unwrap(), "\"vB\"");
        assert_eq!(serde_json::from_str::<ModelId>("\"gpt-4o\"").unwrap(), ModelId::Gpt4o);
        assert_eq!(ModelId::Mini.provider(), Provider::OpenAi { model: "gpt-4o-mini" });
        assert_eq!(ModelId::Haiku.provider(), Provider::Anthropic);

        let result = PredictionResult {
            prob_l: 0.1,
            prob_m: 0.7,
            prob_h: 0.2,
            pred_class: SalesCategory::Mid,
            reasoning: None,
            raw_output: "{}".into(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["prob_M"], 0.7);
        assert_eq!(json["pred_class"], "Mid");
        assert!(json.get("step1_b").is_none());
    }
}
