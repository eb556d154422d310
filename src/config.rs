use crate::errors::{ForecastError, ForecastResult};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub results_dir: PathBuf,
    pub static_dir: PathBuf,
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub anthropic_version: String,
    /// Unset means the outbound call runs until the network gives up.
    pub llm_timeout: Option<Duration>,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> ForecastResult<Self> {
        dotenvy::dotenv().ok();

        let server_port = env_var_or("SERVER_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| ForecastError::Config(format!("SERVER_PORT: {e}")))?;

        let llm_timeout = match std::env::var("LLM_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs = raw
                    .parse::<u64>()
                    .map_err(|e| ForecastError::Config(format!("LLM_TIMEOUT_SECS: {e}")))?;
                Some(Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        Ok(Self {
            results_dir: PathBuf::from(env_var_or("RESULTS_DIR", "public/data/results")),
            static_dir: PathBuf::from(env_var_or("STATIC_DIR", "dashboard/dist")),
            openai_base_url: env_var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            anthropic_base_url: env_var_or("ANTHROPIC_BASE_URL", "https://api.anthropic.com/v1"),
            anthropic_version: env_var_or("ANTHROPIC_VERSION", "2023-06-01"),
            llm_timeout,
            server_port,
        })
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
