use super::{ClassProbabilities, SalesCategory};
use crate::errors::{ForecastError, ForecastResult};
use serde_json::{Map, Value};

/// Characters of the offending text kept in a parse error.
const EXCERPT_CHARS: usize = 200;

/// Structured content of a completion, before the raw text is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOutput {
    pub probabilities: ClassProbabilities,
    pub pred_class: SalesCategory,
    pub reasoning: Option<String>,
}

/// Extract the probability triple and optional reasoning from raw model
/// text. Missing or non-numeric probabilities read as 0.0; the triple is
/// not checked to sum to 1.
pub fn parse_model_output(text: &str) -> ForecastResult<ParsedOutput> {
    let clean = strip_code_fences(text);

    let object = match serde_json::from_str::<Value>(&clean) {
        Ok(Value::Object(map)) => map,
        _ => return Err(ForecastError::Parse(excerpt(text))),
    };

    let probabilities = ClassProbabilities::new(
        coerce_probability(&object, "prob_L"),
        coerce_probability(&object, "prob_M"),
        coerce_probability(&object, "prob_H"),
    );

    Ok(ParsedOutput {
        pred_class: probabilities.predicted_class(),
        probabilities,
        reasoning: reasoning_field(&object),
    })
}

fn strip_code_fences(text: &str) -> String {
    text.replace("```json\n", "")
        .replace("```json", "")
        .replace("```\n", "")
        .replace("```", "")
        .trim()
        .to_string()
}

fn coerce_probability(object: &Map<String, Value>, key: &str) -> f64 {
    let value = match object.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| !v.is_nan()).unwrap_or(0.0)
}

fn reasoning_field(object: &Map<String, Value>) -> Option<String> {
    match object.get("step1_reasoning") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect()
}
