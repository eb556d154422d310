use super::client::LlmClient;
use crate::errors::{ForecastError, ForecastResult};
use crate::forecast::{parser, prompts, FeatureRecord, PredictionResult, PromptVersion, Provider};

/// Turns one feature record into one prediction: render the prompt, make
/// a single provider call, parse the reply.
#[derive(Clone)]
pub struct Predictor {
    client: LlmClient,
}

impl Predictor {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    pub async fn predict(
        &self,
        features: &FeatureRecord,
        version: PromptVersion,
        provider: Provider,
        credential: &str,
    ) -> ForecastResult<PredictionResult> {
        features.validate()?;
        if credential.trim().is_empty() {
            return Err(ForecastError::Validation(format!(
                "{} API key required",
                provider.name()
            )));
        }

        let prompt = prompts::build_prompt(features, version);
        tracing::debug!(
            provider = provider.name(),
            version = %version,
            prompt_chars = prompt.chars().count(),
            "sending prediction request"
        );

        let completion = self.client.complete(provider, &prompt, credential.trim()).await?;
        tracing::debug!(
            provider = completion.provider,
            output_chars = completion.text.chars().count(),
            "completion received"
        );
        let parsed = parser::parse_model_output(&completion.text)?;

        Ok(PredictionResult {
            prob_l: parsed.probabilities.low,
            prob_m: parsed.probabilities.mid,
            prob_h: parsed.probabilities.high,
            pred_class: parsed.pred_class,
            reasoning: parsed.reasoning,
            raw_output: completion.text,
        })
    }
}
