// Contract analysis prompt templates.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::analysis::scoring::ScoringRequest;
use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, RANGE_INSTRUCTION, VERBATIM_INSTRUCTION};

pub const ANALYSIS_SYSTEM_PREAMBLE: &str = "You are a meticulous contract reviewer \
    who explains legal risk to non-lawyers. You score risk from the perspective of the \
    party receiving the contract.";

/// Replace every `{placeholder}` before sending.
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Review the contract below and return a risk analysis.

CONTRACT TITLE: {title}
CONTRACT DOMAIN: {domain} ({domain_description})

SCORING PARAMETERS (use them exactly):
- Start from a baseline of {baseline} points.
- For every negative term, decide a raw penalty, multiply it by {penalty_multiplier}, and add it to the score.
- Cap the total at 100.
- Band the final score: 0-{low} is "low", {low_next}-{medium} is "medium", above {medium} is "high". Scores above {high} are severe.
- Apply the same bands to each clause's riskScore.

{verbatim_instruction}

{range_instruction}

Return a JSON object with this EXACT schema (no extra fields; do NOT echo the contract text):
{
  "riskScore": 0-100,
  "clauses": [
    {
      "id": "clause-1",
      "title": "short name",
      "content": "verbatim quotation from the contract",
      "riskLevel": "low" | "medium" | "high",
      "riskScore": 0-100,
      "explanation": "why this matters, in plain language",
      "suggestions": ["concrete negotiation suggestion"],
      "startIndex": character offset where the quotation starts,
      "endIndex": character offset just after the quotation ends
    }
  ],
  "keyIssues": [
    {
      "id": "issue-1",
      "title": "short name",
      "description": "what the problem is",
      "riskLevel": "low" | "medium" | "high",
      "clause": "title of the related clause",
      "suggestion": "what to ask for"
    }
  ],
  "missingProtections": [
    {
      "id": "missing-1",
      "title": "protection name",
      "description": "why it matters",
      "importance": "critical" | "important" | "recommended",
      "sampleClause": "example wording to propose"
    }
  ],
  "riskBreakdown": {
    "payment": 0-100,
    "liability": 0-100,
    "termination": 0-100,
    "confidentiality": 0-100,
    "intellectual_property": 0-100
  },
  "plainLanguageSummary": "3-5 sentences a non-lawyer can follow",
  "confidence": 0-1
}

CONTRACT TEXT:
{content}"#;

/// Appended on retry when the previous answer failed validation.
pub const CORRECTION_TEMPLATE: &str = r#"

YOUR PREVIOUS ANSWER WAS REJECTED: {feedback}
Fix that problem and return the complete corrected JSON object."#;

/// Baseline score every analysis starts from before penalties.
pub const BASELINE_SCORE: f64 = 10.0;

pub fn analysis_system_prompt() -> String {
    format!("{ANALYSIS_SYSTEM_PREAMBLE} {JSON_ONLY_SYSTEM}")
}

/// Fills the analysis template from a scoring request.
pub fn build_analysis_prompt(request: &ScoringRequest<'_>) -> String {
    let config = request.config;
    let thresholds = config.thresholds;
    let baseline = BASELINE_SCORE.to_string();
    let multiplier = config.penalty_multiplier.to_string();
    let low = thresholds.low.to_string();
    let low_next = (u16::from(thresholds.low) + 1).to_string();
    let medium = thresholds.medium.to_string();
    let high = thresholds.high.to_string();

    let mut prompt = fill_template(
        ANALYSIS_PROMPT_TEMPLATE,
        &[
            ("title", request.title),
            ("domain", request.domain.as_str()),
            ("domain_description", config.description),
            ("baseline", &baseline),
            ("penalty_multiplier", &multiplier),
            ("low", &low),
            ("low_next", &low_next),
            ("medium", &medium),
            ("high", &high),
            ("verbatim_instruction", VERBATIM_INSTRUCTION),
            ("range_instruction", RANGE_INSTRUCTION),
            ("content", request.text),
        ],
    );

    if let Some(feedback) = request.feedback {
        prompt.push_str(&fill_template(CORRECTION_TEMPLATE, &[("feedback", feedback)]));
    }
    prompt
}

/// Replaces each `{name}` in `template` with its value in a single left-to-right
/// pass. Substituted text is never scanned again, so a title or contract that
/// contains `{low}` comes through verbatim. Unknown `{...}` are kept as written.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let hit = values.iter().find(|(name, _)| {
            tail.strip_prefix(*name)
                .is_some_and(|after| after.starts_with('}'))
        });
        match hit {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::domain::DomainTag;
    use crate::analysis::risk_config::resolve;

    fn request<'a>(text: &'a str, feedback: Option<&'a str>) -> ScoringRequest<'a> {
        ScoringRequest {
            text,
            title: "Loan",
            domain: DomainTag::Finance,
            config: resolve(DomainTag::Finance),
            feedback,
        }
    }

    #[test]
    fn test_prompt_carries_domain_parameters() {
        let prompt = build_analysis_prompt(&request("The loan accrues interest.", None));
        assert!(prompt.contains("CONTRACT DOMAIN: finance"));
        assert!(prompt.contains("multiply it by 1.2"));
        assert!(prompt.contains("0-30 is \"low\", 31-60 is \"medium\", above 60 is \"high\""));
        assert!(prompt.contains("Scores above 80"));
        assert!(prompt.ends_with("The loan accrues interest."));
    }

    #[test]
    fn test_no_placeholders_left() {
        let prompt = build_analysis_prompt(&request("Plain text.", None));
        for placeholder in [
            "{title}",
            "{domain}",
            "{penalty_multiplier}",
            "{low}",
            "{medium}",
            "{high}",
            "{content}",
            "{verbatim_instruction}",
        ] {
            assert!(!prompt.contains(placeholder), "left {placeholder}");
        }
    }

    #[test]
    fn test_contract_braces_survive() {
        let prompt = build_analysis_prompt(&request("Fee is {medium} per {title}.", None));
        assert!(prompt.ends_with("Fee is {medium} per {title}."));
    }

    #[test]
    fn test_feedback_appended_on_retry() {
        let prompt =
            build_analysis_prompt(&request("Text.", Some("confidence: 1.5 is outside [0, 1]")));
        assert!(prompt.contains("YOUR PREVIOUS ANSWER WAS REJECTED: confidence: 1.5"));
    }

    #[test]
    fn test_title_placeholders_are_not_expanded() {
        let mut req = request("The loan is due.", None);
        req.title = "Rates {low} and {content}";
        let prompt = build_analysis_prompt(&req);
        assert!(prompt.contains("Rates {low} and {content}"));
        assert_eq!(prompt.matches("The loan is due.").count(), 1);
    }

    #[test]
    fn test_feedback_braces_are_not_expanded() {
        let prompt = build_analysis_prompt(&request("Text.", Some("expected {high} got {title}")));
        assert!(prompt.contains("REJECTED: expected {high} got {title}"));
    }

    #[test]
    fn test_fill_template_keeps_unknown_and_unclosed_braces() {
        let filled = fill_template("{a} {b} {a {x}", &[("a", "1"), ("x", "{a}")]);
        assert_eq!(filled, "1 {b} {a {a}");
    }

    #[test]
    fn test_system_prompt_demands_json() {
        assert!(analysis_system_prompt().contains("valid JSON only"));
    }
}
