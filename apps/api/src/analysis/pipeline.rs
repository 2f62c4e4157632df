//! Analysis pipeline: classify → resolve → score → validate, with a corrective
//! re-request when the scorer's candidate is rejected.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::analysis::domain::{classify_with_evidence, DomainTag};
use crate::analysis::models::{ContractAnalysis, RiskLevel};
use crate::analysis::risk_config::{resolve, DomainConfig};
use crate::analysis::scoring::{ScoringError, ScoringProcess, ScoringRequest};
use crate::analysis::validation::validate;
use crate::errors::AppError;

/// An accepted analysis together with how it was produced.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub analysis: ContractAnalysis,
    pub domain: DomainTag,
    pub matched_term: Option<String>,
    pub config: &'static DomainConfig,
    /// Overall score banded with the domain thresholds.
    pub risk_level: RiskLevel,
    pub scorer_backend: &'static str,
    pub attempts: u32,
}

/// Runs the full pipeline for one contract.
///
/// A candidate that fails validation, or a reply that is not JSON at all, is
/// sent back to the scorer with the reason as feedback, up to `max_attempts`
/// scorer calls in total. The last rejection is returned if every attempt fails.
pub async fn analyze_contract(
    scorer: &dyn ScoringProcess,
    text: &str,
    title: &str,
    max_attempts: u32,
) -> Result<AnalysisReport, AppError> {
    if text.trim().is_empty() {
        return Err(AppError::Validation("contract text is empty".to_string()));
    }

    let classification = classify_with_evidence(text, title);
    let config = resolve(classification.domain);
    info!(
        domain = %classification.domain,
        matched_term = ?classification.matched_term,
        penalty_multiplier = config.penalty_multiplier,
        backend = scorer.backend(),
        "Contract classified"
    );

    let max_attempts = max_attempts.max(1);
    let mut feedback: Option<String> = None;
    let mut attempt = 0;

    loop {
        attempt += 1;
        let request = ScoringRequest {
            text,
            title,
            domain: classification.domain,
            config,
            feedback: feedback.as_deref(),
        };
        let (reason, error) = match scorer.score(&request).await {
            Ok(mut candidate) => {
                inject_source(&mut candidate, text, title);
                match validate(&candidate) {
                    Ok(analysis) => {
                        let risk_level = config.band(analysis.risk_score());
                        info!(
                            attempt,
                            risk_score = analysis.risk_score(),
                            risk_level = risk_level.as_str(),
                            clauses = analysis.clauses().len(),
                            key_issues = analysis.key_issues().len(),
                            missing_protections = analysis.missing_protections().len(),
                            breakdown = ?analysis.risk_breakdown(),
                            confidence = analysis.confidence(),
                            "Analysis accepted"
                        );
                        return Ok(AnalysisReport {
                            analysis,
                            domain: classification.domain,
                            matched_term: classification.matched_term,
                            config,
                            risk_level,
                            scorer_backend: scorer.backend(),
                            attempts: attempt,
                        });
                    }
                    Err(e) => (e.to_string(), AppError::from(e)),
                }
            }
            Err(e @ ScoringError::Malformed(_)) => (e.to_string(), AppError::from(e)),
            Err(e) => return Err(e.into()),
        };

        if attempt >= max_attempts {
            warn!(attempt, error = %reason, "Candidate analysis rejected, giving up");
            return Err(error);
        }
        warn!(attempt, error = %reason, "Candidate analysis rejected, re-requesting");
        feedback = Some(reason);
    }
}

/// Spans are relative to the submitted text, so the candidate's `content`
/// is always the source text. The title is filled in only when the scorer
/// left it out.
fn inject_source(candidate: &mut Value, text: &str, title: &str) {
    let Some(obj) = candidate.as_object_mut() else {
        return;
    };
    obj.insert("content".to_string(), Value::String(text.to_string()));
    let has_title = obj.get("title").map_or(false, |t| t.is_string());
    if !has_title {
        obj.insert("title".to_string(), Value::String(title.to_string()));
    }
}
