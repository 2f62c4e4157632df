use std::sync::Arc;

use anyhow::Result;

use crate::analysis::scoring::{KeywordRiskScorer, LlmRiskScorer, ScoringProcess};
use crate::config::{Config, ScorerBackend};
use crate::llm_client::{LlmClient, LlmSettings};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Present only when the LLM backend is configured.
    pub llm: Option<LlmClient>,
    /// Pluggable scoring process. Default: KeywordRiskScorer. Swap via SCORER_BACKEND.
    pub scorer: Arc<dyn ScoringProcess>,
}

impl AppState {
    /// Builds the scorer selected by `config.scorer_backend`.
    pub fn from_config(config: Config) -> Result<Self> {
        let llm = match (config.scorer_backend, &config.anthropic_api_key) {
            (ScorerBackend::Llm, Some(key)) => {
                let mut settings = LlmSettings::new(key.clone());
                if let Some(url) = &config.anthropic_api_url {
                    settings.api_url = url.clone();
                }
                Some(LlmClient::new(settings)?)
            }
            _ => None,
        };

        let scorer: Arc<dyn ScoringProcess> = match &llm {
            Some(client) => Arc::new(LlmRiskScorer(client.clone())),
            None => Arc::new(KeywordRiskScorer),
        };

        Ok(AppState {
            config,
            llm,
            scorer,
        })
    }
}
