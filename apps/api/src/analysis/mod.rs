// Contract analysis core
// Implements: domain classification, per-domain risk configuration, the
// analysis contract validator, and the scoring pipeline that feeds it.
// Model calls go through llm_client; nothing here talks to the API directly.

pub mod domain;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod risk_config;
pub mod scoring;
pub mod validation;

