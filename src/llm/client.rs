use super::types::*;
use crate::config::AppConfig;
use crate::errors::{ForecastError, ForecastResult};
use crate::forecast::{Provider, ANTHROPIC_MODEL};
use reqwest::Client;
use std::time::Duration;

/// Output cap for every completion request.
pub const MAX_OUTPUT_TOKENS: u32 = 512;

/// Completion API client. One request per call, no retries.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    openai_base_url: String,
    anthropic_base_url: String,
    anthropic_version: String,
}

impl LlmClient {
    pub fn new(
        openai_base_url: &str,
        anthropic_base_url: &str,
        anthropic_version: &str,
        timeout: Option<Duration>,
    ) -> Self {
        let mut builder = Client::builder().pool_max_idle_per_host(4);
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Self {
            client: builder.build().unwrap_or_default(),
            openai_base_url: openai_base_url.trim_end_matches('/').to_string(),
            anthropic_base_url: anthropic_base_url.trim_end_matches('/').to_string(),
            anthropic_version: anthropic_version.to_string(),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            &cfg.openai_base_url,
            &cfg.anthropic_base_url,
            &cfg.anthropic_version,
            cfg.llm_timeout,
        )
    }

    /// Send `prompt` as the sole user message and return the first textual
    /// completion.
    pub async fn complete(
        &self,
        provider: Provider,
        prompt: &str,
        credential: &str,
    ) -> ForecastResult<Completion> {
        let response = match provider {
            Provider::OpenAi { model } => self.chat_completion(model, prompt, credential).await?,
            Provider::Anthropic => self.messages(prompt, credential).await?,
        };
        Ok(response.into_completion())
    }

    async fn chat_completion(
        &self,
        model: &str,
        prompt: &str,
        api_key: &str,
    ) -> ForecastResult<ProviderResponse> {
        let url = format!("{}/chat/completions", self.openai_base_url);
        let body = ChatCompletionRequest {
            model,
            messages: [ChatMessage::user(prompt)],
            temperature: 0.0,
            max_tokens: MAX_OUTPUT_TOKENS,
        };

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("OpenAI", e))?;

        let data: ChatCompletionResponse = decode("OpenAI", resp).await?;
        Ok(ProviderResponse::OpenAi(data))
    }

    async fn messages(&self, prompt: &str, api_key: &str) -> ForecastResult<ProviderResponse> {
        let url = format!("{}/messages", self.anthropic_base_url);
        let body = MessagesRequest {
            model: ANTHROPIC_MODEL,
            max_tokens: MAX_OUTPUT_TOKENS,
            temperature: 0.0,
            messages: [ChatMessage::user(prompt)],
        };

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.anthropic_version)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("Anthropic", e))?;

        let data: MessagesResponse = decode("Anthropic", resp).await?;
        Ok(ProviderResponse::Anthropic(data))
    }
}

fn transport_error(provider: &'static str, e: reqwest::Error) -> ForecastError {
    ForecastError::Provider {
        provider,
        status: None,
        message: format!("{provider} request failed: {e}"),
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    provider: &'static str,
    resp: reqwest::Response,
) -> ForecastResult<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
            .ok()
            .and_then(|env| env.error)
            .and_then(|err| err.message)
            .unwrap_or_else(|| format!("{provider} API error"));
        return Err(ForecastError::Provider {
            provider,
            status: Some(status.as_u16()),
            message,
        });
    }

    resp.json::<T>().await.map_err(|e| ForecastError::Provider {
        provider,
        status: Some(status.as_u16()),
        message: format!("unexpected response body: {e}"),
    })
}
