use serde::{Deserialize, Serialize};

// ── Requests ──

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

impl<'a> ChatMessage<'a> {
    pub fn user(content: &'a str) -> Self {
        Self { role: "user", content }
    }
}

/// Chat-completions request body (provider A).
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: [ChatMessage<'a>; 1],
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Messages request body (provider B).
#[derive(Debug, Serialize)]
pub struct MessagesRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub temperature: f64,
    pub messages: [ChatMessage<'a>; 1],
}

// ── Responses ──

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<String>,
}

/// Error body both providers share: `{ "error": { "message": ... } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorEnvelope {
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub message: Option<String>,
}

/// A decoded success envelope, tagged by the provider that produced it.
#[derive(Debug, Clone)]
pub enum ProviderResponse {
    OpenAi(ChatCompletionResponse),
    Anthropic(MessagesResponse),
}

/// Provider-agnostic completion handed to the response parser.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub provider: &'static str,
    pub text: String,
}

impl ProviderResponse {
    /// First textual completion in the envelope; empty when there is none.
    pub fn into_completion(self) -> Completion {
        match self {
            ProviderResponse::OpenAi(resp) => Completion {
                provider: "OpenAI",
                text: resp
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message)
                    .and_then(|m| m.content)
                    .unwrap_or_default(),
            },
            ProviderResponse::Anthropic(resp) => Completion {
                provider: "Anthropic",
                text: resp
                    .content
                    .into_iter()
                    .find(|block| block.kind == "text")
                    .and_then(|block| block.text)
                    .unwrap_or_default(),
            },
        }
    }
}
