use crate::config::AppConfig;
use crate::errors::ForecastError;
use crate::llm::client::LlmClient;
use crate::llm::predictor::Predictor;
use crate::store::ResultStore;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared by every handler. The store owns the only cache.
pub struct AppState {
    pub config: AppConfig,
    pub store: ResultStore,
    pub predictor: Predictor,
    pub counters: Counters,
}

impl AppState {
    pub fn new(config: AppConfig) -> Arc<Self> {
        let predictor = Predictor::new(LlmClient::from_config(&config));
        let store = ResultStore::new(config.results_dir.clone());
        Arc::new(Self {
            config,
            store,
            predictor,
            counters: Counters::default(),
        })
    }
}

// ── Request counters (lock-free) ──

#[derive(Debug, Default)]
pub struct Counters {
    pub predictions_requested: AtomicU64,
    pub predictions_succeeded: AtomicU64,
    pub validation_errors: AtomicU64,
    pub provider_errors: AtomicU64,
    pub parse_errors: AtomicU64,
    pub cache_clears: AtomicU64,
}

impl Counters {
    pub fn record_failure(&self, err: &ForecastError) {
        let counter = match err {
            ForecastError::Validation(_) => &self.validation_errors,
            ForecastError::Provider { .. } => &self.provider_errors,
            ForecastError::Parse(_) => &self.parse_errors,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> serde_json::Value {
        use Ordering::Relaxed;
        serde_json::json!({
            "predictions_requested": self.predictions_requested.load(Relaxed),
            "predictions_succeeded": self.predictions_succeeded.load(Relaxed),
            "validation_errors": self.validation_errors.load(Relaxed),
            "provider_errors": self.provider_errors.load(Relaxed),
            "parse_errors": self.parse_errors.load(Relaxed),
            "cache_clears": self.cache_clears.load(Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_counted_by_kind() {
        let counters = Counters::default();
        counters.record_failure(&ForecastError::Validation("x".into()));
        counters.record_failure(&ForecastError::Parse("y".into()));
        counters.record_failure(&ForecastError::Parse("z".into()));
        counters.record_failure(&ForecastError::Data("ignored".into()));

        let snap = counters.snapshot();
        assert_eq!(snap["validation_errors"], 1);
        assert_eq!(snap["parse_errors"], 2);
        assert_eq!(snap["provider_errors"], 0);
    }
}
