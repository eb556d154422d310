//! Prompt templates for the two prompting strategies.
//!
//! Both prompts share the same framing and feature context; they differ
//! only in the task section. Rendering is a pure function of the record.

use super::{FeatureRecord, PromptVersion};

const FRAMING: &str = concat!(
    "You are a sales forecasting expert for health supplements in Taiwan.\n",
    "\n",
    "## Product\n",
    "超級好抗60粒 (Super Defense 60 Capsules) — immune supplement sold through pharmacy chains.\n",
    "\n",
    "## Sales Categories (based on historical training data)\n",
    "- Low:  ≤ 363 bottles/month\n",
    "- Mid:  364–446 bottles/month  \n",
    "- High: ≥ 447 bottles/month\n",
);

const DIRECT_TASK: &str = r#"Output ONLY valid JSON in this exact format, no other text:
{
  "prob_L": <0.0-1.0>,
  "prob_M": <0.0-1.0>,
  "prob_H": <0.0-1.0>
}
The three probabilities must sum to 1.0."#;

const REASONING_DRIVERS: &str = r#"### Step 1: Identify active consumer purchase drivers
From the following list, identify which motivations are likely ACTIVE this month:
1. Epidemic anxiety (high epidemic index or flu search volume)
2. Seasonal demand (temperature drop, winter onset)
3. Promotion attraction (active bundle or bulk discount)
4. Pre-purchase anticipation (upcoming major event like pharmacy anniversary)
5. Competitor influence (high competitor search volume)

List the active driver numbers and explain briefly why each is active or inactive.
Critically assess: does an active demand motivation ALSO have a purchase trigger (promotion)?

### Step 2: Predict sales category
Based on your Step 1 analysis, output ONLY valid JSON in this exact format, no other text:
{
  "step1_reasoning": "<your Step 1 analysis>",
  "prob_L": <0.0-1.0>,
  "prob_M": <0.0-1.0>,
  "prob_H": <0.0-1.0>
}
The three probabilities must sum to 1.0."#;

pub fn build_prompt(features: &FeatureRecord, version: PromptVersion) -> String {
    match version {
        PromptVersion::Direct => build_direct_prompt(features),
        PromptVersion::Reasoning => build_reasoning_prompt(features),
    }
}

/// Strategy A: ask for the probability triple immediately.
pub fn build_direct_prompt(features: &FeatureRecord) -> String {
    format!(
        "{context}\n## Task\nBased on all the above context, predict the sales category for {month}.\n\n{DIRECT_TASK}",
        context = render_context(features),
        month = features.month,
    )
}

/// Strategy B: walk the five purchase-driver hypotheses, then emit the
/// triple together with the reasoning.
pub fn build_reasoning_prompt(features: &FeatureRecord) -> String {
    format!(
        "{context}\n## Task — Two Steps\n\n{REASONING_DRIVERS}",
        context = render_context(features),
    )
}

fn render_context(f: &FeatureRecord) -> String {
    let history = f
        .historical_sales
        .iter()
        .map(|h| format!("  - {}: {} bottles", h.month, h.qty))
        .collect::<Vec<_>>()
        .join("\n");

    let season = if f.season_event_tag.is_empty() { "none" } else { f.season_event_tag.as_str() };

    format!(
        "{FRAMING}\n\
         ## Historical Monthly Sales (training context)\n\
         {history}\n\
         \n\
         ## Context for the month to predict: {month}\n\
         - Average Temperature (Taipei): {temp}°C\n\
         - Epidemic Index: {epidemic}\n\
         - Google Trends — Flu searches: {flu}\n\
         - Google Trends — Cold searches: {cold}\n\
         - Google Trends — Immunity searches: {immunity}\n\
         - Google Trends — Competitor total: {competitor}\n\
         - Season/Event Tag: {season}\n\
         - Bundle Promotion: {bundle}\n\
         - Bulk Purchase Promotion: {bulk}\n",
        month = f.month,
        temp = f.avg_temp_taipei,
        epidemic = f.epidemic_index,
        flu = f.gt_flu,
        cold = f.gt_cold,
        immunity = f.gt_immunity,
        competitor = f.gt_competitor_total,
        bundle = render_bundle(f),
        bulk = render_bulk(f),
    )
}

fn render_bundle(f: &FeatureRecord) -> String {
    if !f.has_bundle_promo {
        return "NO".to_string();
    }
    format!(
        "YES — {}% discount, starts {}, duration {} days",
        percent_1dp(f.bundle_discount_rate),
        f.bundle_start_date,
        f.bundle_duration_days
    )
}

fn render_bulk(f: &FeatureRecord) -> String {
    if f.has_bulk_promo {
        format!("YES — {}% discount", percent_1dp(f.bulk_discount_rate))
    } else {
        "NO".to_string()
    }
}

/// Rate as a percentage with one decimal. Exact halves round up, so 0.0625
/// renders as `6.3` rather than the banker's `6.2` that `{:.1}` gives.
fn percent_1dp(rate: f64) -> String {
    let tenths = (rate * 100.0 * 10.0).round() / 10.0;
    format!("{tenths:.1}")
}
