use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};

/// Which scoring process produces candidate analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScorerBackend {
    /// Rule-based, offline. The default.
    Keyword,
    /// Hosted model; requires `ANTHROPIC_API_KEY`.
    Llm,
}

impl FromStr for ScorerBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(ScorerBackend::Keyword),
            "llm" => Ok(ScorerBackend::Llm),
            other => Err(anyhow!(
                "SCORER_BACKEND must be 'keyword' or 'llm', got '{other}'"
            )),
        }
    }
}

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_MAX_SCORING_ATTEMPTS: u32 = 2;

/// Application configuration loaded from environment variables.
/// Startup fails if a variable is malformed, or if the LLM backend is
/// selected without a key.
#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub scorer_backend: ScorerBackend,
    /// Only read when `scorer_backend` is `Llm`. Never logged.
    pub anthropic_api_key: Option<String>,
    pub anthropic_api_url: Option<String>,
    pub max_upload_bytes: usize,
    pub max_scoring_attempts: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let scorer_backend = match lookup("SCORER_BACKEND") {
            Some(value) => value.parse()?,
            None => ScorerBackend::Keyword,
        };

        let anthropic_api_key = lookup("ANTHROPIC_API_KEY").filter(|k| !k.trim().is_empty());
        if scorer_backend == ScorerBackend::Llm && anthropic_api_key.is_none() {
            bail!(
                "Required environment variable 'ANTHROPIC_API_KEY' is not set (SCORER_BACKEND=llm)"
            );
        }

        let max_scoring_attempts = parse_or(
            &lookup,
            "MAX_SCORING_ATTEMPTS",
            DEFAULT_MAX_SCORING_ATTEMPTS,
        )?;
        if max_scoring_attempts == 0 {
            bail!("MAX_SCORING_ATTEMPTS must be at least 1");
        }

        Ok(Config {
            port: parse_or(&lookup, "PORT", 8080)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            scorer_backend,
            anthropic_api_key,
            anthropic_api_url: lookup("ANTHROPIC_API_URL"),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            max_scoring_attempts,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("rust_log", &self.rust_log)
            .field("scorer_backend", &self.scorer_backend)
            .field(
                "anthropic_api_key",
                &self.anthropic_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("anthropic_api_url", &self.anthropic_api_url)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("max_scoring_attempts", &self.max_scoring_attempts)
            .finish()
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{value}'")),
        None => Ok(default),
    }
}
