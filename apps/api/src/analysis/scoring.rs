//! Scoring processes. Each produces a *candidate* analysis from contract text and
//! the domain configuration.
//!
//! Default: `KeywordRiskScorer` (pure Rust, deterministic, no network).
//! Optional: `LlmRiskScorer` (hosted model via `LlmClient`).
//!
//! `AppState` holds an `Arc<dyn ScoringProcess>` chosen at startup from
//! `SCORER_BACKEND`. Neither backend is trusted: the pipeline runs every
//! candidate through `validation::validate`.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use thiserror::Error;

use crate::analysis::domain::DomainTag;
use crate::analysis::models::{Clause, Importance, KeyIssue, MissingProtection, RiskBreakdown};
use crate::analysis::prompts::{analysis_system_prompt, build_analysis_prompt, BASELINE_SCORE};
use crate::analysis::risk_config::DomainConfig;
use crate::llm_client::{LlmClient, LlmError};

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Everything a scorer needs for one contract.
#[derive(Debug, Clone, Copy)]
pub struct ScoringRequest<'a> {
    pub text: &'a str,
    pub title: &'a str,
    pub domain: DomainTag,
    pub config: &'static DomainConfig,
    /// Why the previous candidate was rejected, when this is a retry.
    pub feedback: Option<&'a str>,
}

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("scoring service unavailable: {0}")]
    Unavailable(#[from] LlmError),

    /// The service answered, but the reply could not be read as a candidate.
    /// The pipeline treats this like a rejected candidate and asks again.
    #[error("reply was not a JSON object: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait ScoringProcess: Send + Sync {
    /// Short label reported alongside results ("keyword" | "llm").
    fn backend(&self) -> &'static str;

    async fn score(&self, request: &ScoringRequest<'_>) -> Result<Value, ScoringError>;
}

// ────────────────────────────────────────────────────────────────────────────
// KeywordRiskScorer
// ────────────────────────────────────────────────────────────────────────────

/// Rule-based scorer.
///
/// Algorithm:
/// 1. Split the contract into sentence/paragraph spans.
/// 2. Each span matching one or more risk rules becomes a clause; its score is
///    the sum of matched raw penalties, scaled by the domain multiplier.
/// 3. Standard protections that never appear are reported as missing.
/// 4. Overall score = baseline + scaled penalties (each rule counted once)
///    + scaled missing-protection penalties, clamped to 0–100 and banded with
///    the domain thresholds.
pub struct KeywordRiskScorer;

#[async_trait]
impl ScoringProcess for KeywordRiskScorer {
    fn backend(&self) -> &'static str {
        "keyword"
    }

    async fn score(&self, request: &ScoringRequest<'_>) -> Result<Value, ScoringError> {
        Ok(score_keywords(request))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Category {
    Payment,
    Liability,
    Termination,
    Confidentiality,
    IntellectualProperty,
}

struct RiskRule {
    title: &'static str,
    category: Category,
    raw_penalty: f64,
    pattern: &'static str,
    explanation: &'static str,
    suggestion: &'static str,
}

const RISK_RULES: &[RiskRule] = &[
    RiskRule {
        title: "Unlimited liability",
        category: Category::Liability,
        raw_penalty: 25.0,
        pattern: r"unlimited liability|without (?:any )?limit(?:ation)? (?:of|on) liability|liable for (?:any and )?all (?:losses|damages)",
        explanation: "Your exposure for damages has no ceiling.",
        suggestion: "Cap liability at the fees paid under the agreement in the prior 12 months.",
    },
    RiskRule {
        title: "Broad indemnification",
        category: Category::Liability,
        raw_penalty: 15.0,
        pattern: r"indemnif(?:y|ies|ied|ication)|hold harmless",
        explanation: "You may have to cover the other party's losses, including ones you did not cause.",
        suggestion: "Limit indemnity to third-party claims caused by your own breach or negligence, and make it mutual.",
    },
    RiskRule {
        title: "One-sided termination",
        category: Category::Termination,
        raw_penalty: 15.0,
        pattern: r"terminate (?:this agreement )?(?:at any time|for any reason|without cause|for convenience)|without (?:prior )?notice",
        explanation: "The agreement can end abruptly, without warning or a chance to fix problems.",
        suggestion: "Require at least 30 days' written notice and a cure period before termination.",
    },
    RiskRule {
        title: "Automatic renewal",
        category: Category::Termination,
        raw_penalty: 10.0,
        pattern: r"automatic(?:ally)? renew(?:s|ed|al)?|auto-renew(?:s|ed|al)?|renew(?:s|ed)? automatically",
        explanation: "The contract rolls over unless someone remembers to cancel it in time.",
        suggestion: "Ask for a renewal reminder 60 days ahead and the right to cancel at any renewal.",
    },
    RiskRule {
        title: "Late payment penalties",
        category: Category::Payment,
        raw_penalty: 12.0,
        pattern: r"late (?:fee|charge|payment)s?|penalt(?:y|ies)|interest (?:at|of) \d+(?:\.\d+)?|\d+(?:\.\d+)?% interest",
        explanation: "Missing a payment date triggers extra charges.",
        suggestion: "Negotiate a grace period and cap late charges at a statutory rate.",
    },
    RiskRule {
        title: "Non-refundable payments",
        category: Category::Payment,
        raw_penalty: 10.0,
        pattern: r"non-?refundable|payable in advance|no refunds?",
        explanation: "Money paid up front cannot be recovered if the deal goes wrong.",
        suggestion: "Ask for pro-rata refunds on early termination or non-performance.",
    },
    RiskRule {
        title: "Payment acceleration",
        category: Category::Payment,
        raw_penalty: 15.0,
        pattern: r"accelerat(?:e|es|ed|ion)|immediately due and payable",
        explanation: "A single default can make the whole balance due at once.",
        suggestion: "Limit acceleration to material, uncured payment defaults.",
    },
    RiskRule {
        title: "Unilateral changes",
        category: Category::Liability,
        raw_penalty: 12.0,
        pattern: r"(?:sole|absolute) discretion|may (?:amend|modify|change) (?:this agreement|these terms|the terms)",
        explanation: "The other party can change the deal without your agreement.",
        suggestion: "Require written amendments signed by both parties.",
    },
    RiskRule {
        title: "Intellectual property assignment",
        category: Category::IntellectualProperty,
        raw_penalty: 18.0,
        pattern: r"assigns? (?:all|any) (?:rights?|title)|works? made for hire|work for hire|irrevocabl[ey] (?:assigns?|licen[cs]es?)",
        explanation: "You may give away ownership of work or ideas, possibly including pre-existing ones.",
        suggestion: "Exclude pre-existing IP and keep a licence to reuse general know-how.",
    },
    RiskRule {
        title: "Broad disclosure rights",
        category: Category::Confidentiality,
        raw_penalty: 12.0,
        pattern: r"may disclose|share (?:\w+ ){0,3}with third parties|sell (?:\w+ ){0,2}data",
        explanation: "Your information can be passed to others.",
        suggestion: "Limit disclosure to what is required by law, with prior notice to you.",
    },
    RiskRule {
        title: "Perpetual obligations",
        category: Category::Confidentiality,
        raw_penalty: 8.0,
        pattern: r"in perpetuity|perpetual",
        explanation: "The obligation never expires.",
        suggestion: "Set a fixed duration, such as 3 to 5 years after the agreement ends.",
    },
    RiskRule {
        title: "Restrictive covenant",
        category: Category::Termination,
        raw_penalty: 12.0,
        pattern: r"non-?compete|not (?:to )?compete|non-?solicit(?:ation)?",
        explanation: "Your future work options are restricted after the agreement ends.",
        suggestion: "Narrow the restriction's duration, geography and scope.",
    },
    RiskRule {
        title: "Waiver of legal rights",
        category: Category::Liability,
        raw_penalty: 10.0,
        pattern: r"waives? (?:any |all |its |the )?rights?|jury trials?|class actions?",
        explanation: "You give up legal remedies you would otherwise have.",
        suggestion: "Strike the waiver or make it mutual and limited.",
    },
];

struct Protection {
    key: &'static str,
    title: &'static str,
    description: &'static str,
    importance: Importance,
    category: Category,
    /// Presence anywhere in the contract satisfies the protection.
    pattern: &'static str,
    sample_clause: &'static str,
    /// `None` applies the protection to every domain.
    domains: Option<&'static [DomainTag]>,
}

const PROTECTIONS: &[Protection] = &[
    Protection {
        key: "limitation_of_liability",
        title: "Limitation of liability",
        description: "Nothing caps how much either party can be made to pay.",
        importance: Importance::Critical,
        category: Category::Liability,
        pattern: r"limitation of liability|limit(?:ed|s)? (?:its |their |our |your )?liability|liability (?:shall|will) not exceed|aggregate liability",
        sample_clause: "Neither party's aggregate liability under this Agreement shall exceed the fees paid in the twelve (12) months preceding the claim.",
        domains: None,
    },
    Protection {
        key: "confidentiality",
        title: "Confidentiality",
        description: "Sensitive information shared under the contract is not protected.",
        importance: Importance::Important,
        category: Category::Confidentiality,
        pattern: r"confidential(?:ity)?",
        sample_clause: "Each party shall keep the other party's Confidential Information secret and use it only to perform this Agreement.",
        domains: None,
    },
    Protection {
        key: "termination_rights",
        title: "Termination rights",
        description: "There is no clear way for you to exit the agreement.",
        importance: Importance::Important,
        category: Category::Termination,
        pattern: r"terminat(?:e|es|ed|ing|ion)",
        sample_clause: "Either party may terminate this Agreement on thirty (30) days' written notice if the other party materially breaches and fails to cure.",
        domains: None,
    },
    Protection {
        key: "payment_terms",
        title: "Payment terms",
        description: "Amounts, due dates or invoicing rules are not spelled out.",
        importance: Importance::Important,
        category: Category::Payment,
        pattern: r"payments?|fees?|invoices?",
        sample_clause: "Fees are payable within thirty (30) days of receipt of a correct invoice.",
        domains: None,
    },
    Protection {
        key: "dispute_resolution",
        title: "Dispute resolution",
        description: "No governing law or process for settling disagreements is defined.",
        importance: Importance::Recommended,
        category: Category::Liability,
        pattern: r"arbitration|dispute resolution|governing law|jurisdiction|mediation",
        sample_clause: "This Agreement is governed by the laws of [State]. Disputes shall first be escalated to senior management, then to mediation.",
        domains: None,
    },
    Protection {
        key: "force_majeure",
        title: "Force majeure",
        description: "You remain liable for failures caused by events outside your control.",
        importance: Importance::Recommended,
        category: Category::Liability,
        pattern: r"force majeure|acts? of god",
        sample_clause: "Neither party is liable for delay caused by events beyond its reasonable control, including natural disasters, war or government action.",
        domains: None,
    },
    Protection {
        key: "data_protection",
        title: "Data protection",
        description: "Personal or sensitive data handled under the contract has no security or breach-notice obligations.",
        importance: Importance::Critical,
        category: Category::Confidentiality,
        pattern: r"data protection|personal data|privacy|security breach|hipaa",
        sample_clause: "Provider shall protect Personal Data with industry-standard safeguards and notify Customer of any security breach within 72 hours.",
        domains: Some(&[DomainTag::Technology, DomainTag::Healthcare]),
    },
    Protection {
        key: "ip_ownership",
        title: "Intellectual property ownership",
        description: "It is unclear who owns the work product and pre-existing IP.",
        importance: Importance::Important,
        category: Category::IntellectualProperty,
        pattern: r"intellectual property|ownership of (?:the )?(?:work product|deliverables)|retains? (?:all )?(?:rights?|title)",
        sample_clause: "Each party retains all rights in its pre-existing intellectual property. Customer owns the deliverables upon full payment.",
        domains: Some(&[
            DomainTag::Technology,
            DomainTag::Professional,
            DomainTag::Employment,
        ]),
    },
];

/// Patterns match whole words only, so "fee" never fires inside "coffee".
fn word_regex(pattern: &str) -> Regex {
    Regex::new(&format!(r"\b(?:{pattern})\b")).expect("rule patterns are valid regexes")
}

static COMPILED_RULES: Lazy<Vec<Regex>> =
    Lazy::new(|| RISK_RULES.iter().map(|rule| word_regex(rule.pattern)).collect());

static COMPILED_PROTECTIONS: Lazy<Vec<Regex>> =
    Lazy::new(|| PROTECTIONS.iter().map(|p| word_regex(p.pattern)).collect());

/// Clause scores spread a span's raw penalty over the 0–100 range.
const CLAUSE_SCALE: f64 = 2.5;
/// Category scores weigh their own penalties more heavily than the overall score.
const CATEGORY_SCALE: f64 = 2.0;
const KEY_ISSUE_LIMIT: usize = 5;
const BASE_CONFIDENCE: f64 = 0.5;
const MAX_KEYWORD_CONFIDENCE: f64 = 0.8;

fn missing_penalty(importance: Importance) -> f64 {
    match importance {
        Importance::Critical => 12.0,
        Importance::Important => 7.0,
        Importance::Recommended => 3.0,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ────────────────────────────────────────────────────────────────────────────
// Core keyword algorithm
// ────────────────────────────────────────────────────────────────────────────

fn score_keywords(request: &ScoringRequest<'_>) -> Value {
    let config = request.config;
    let chars: Vec<char> = request.text.chars().collect();

    let mut clauses: Vec<Clause> = Vec::new();
    let mut matched_rules: BTreeSet<usize> = BTreeSet::new();

    for (start, end) in segment_spans(&chars) {
        let content: String = chars[start..end].iter().collect();
        let lower = content.to_lowercase();

        let hits: Vec<usize> = COMPILED_RULES
            .iter()
            .enumerate()
            .filter(|(_, regex)| regex.is_match(&lower))
            .map(|(i, _)| i)
            .collect();
        if hits.is_empty() {
            continue;
        }
        matched_rules.extend(hits.iter().copied());

        let raw: f64 = hits.iter().map(|&i| RISK_RULES[i].raw_penalty).sum();
        let risk_score = round1((config.scale_penalty(raw) * CLAUSE_SCALE).clamp(0.0, 100.0));
        let lead = hits
            .iter()
            .copied()
            .max_by(|&a, &b| RISK_RULES[a].raw_penalty.total_cmp(&RISK_RULES[b].raw_penalty))
            .unwrap_or(hits[0]);

        clauses.push(Clause {
            id: format!("clause-{}", clauses.len() + 1),
            title: RISK_RULES[lead].title.to_string(),
            content,
            risk_level: config.band(risk_score),
            risk_score,
            explanation: hits
                .iter()
                .map(|&i| RISK_RULES[i].explanation)
                .collect::<Vec<_>>()
                .join(" "),
            suggestions: hits
                .iter()
                .map(|&i| RISK_RULES[i].suggestion.to_string())
                .collect(),
            start_index: start,
            end_index: end,
        });
    }

    let missing = find_missing_protections(request.text, request.domain);

    // Per-category penalties: each matched rule once, plus missing protections.
    let mut by_category: BTreeMap<Category, Vec<f64>> = BTreeMap::new();
    for &i in &matched_rules {
        by_category
            .entry(RISK_RULES[i].category)
            .or_default()
            .push(RISK_RULES[i].raw_penalty * CATEGORY_SCALE);
    }
    for protection in &missing {
        by_category
            .entry(protection.category)
            .or_default()
            .push(missing_penalty(protection.importance));
    }
    let category_score = |category: Category| {
        let penalties = by_category.get(&category).cloned().unwrap_or_default();
        round1(config.score(BASELINE_SCORE, penalties))
    };
    let risk_breakdown = RiskBreakdown {
        payment: category_score(Category::Payment),
        liability: category_score(Category::Liability),
        termination: category_score(Category::Termination),
        confidentiality: category_score(Category::Confidentiality),
        intellectual_property: category_score(Category::IntellectualProperty),
    };

    let penalties = matched_rules
        .iter()
        .map(|&i| RISK_RULES[i].raw_penalty)
        .chain(missing.iter().map(|p| missing_penalty(p.importance)));
    let risk_score = round1(config.score(BASELINE_SCORE, penalties));

    let key_issues = build_key_issues(&clauses);
    let missing_protections: Vec<MissingProtection> = missing
        .iter()
        .map(|p| MissingProtection {
            id: p.key.to_string(),
            title: p.title.to_string(),
            description: p.description.to_string(),
            importance: p.importance,
            sample_clause: p.sample_clause.to_string(),
        })
        .collect();

    let summary = build_summary(request, risk_score, &clauses, &missing);
    let confidence = (BASE_CONFIDENCE + 0.05 * matched_rules.len() as f64)
        .min(MAX_KEYWORD_CONFIDENCE);

    json!({
        "title": request.title,
        "content": request.text,
        "riskScore": risk_score,
        "clauses": clauses,
        "keyIssues": key_issues,
        "missingProtections": missing_protections,
        "riskBreakdown": risk_breakdown,
        "plainLanguageSummary": summary,
        "confidence": (confidence * 100.0).round() / 100.0,
    })
}

/// Splits text into sentence or paragraph spans (char offsets, trimmed).
///
/// A span ends after `.`, `!` or `?` followed by whitespace, or at a blank line.
fn segment_spans(chars: &[char]) -> Vec<(usize, usize)> {
    let trim_end = |start: usize, mut end: usize| {
        while end > start && chars[end - 1].is_whitespace() {
            end -= 1;
        }
        end
    };

    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    for (i, &c) in chars.iter().enumerate() {
        let Some(s) = start else {
            if !c.is_whitespace() {
                start = Some(i);
            }
            continue;
        };

        let sentence_end = matches!(c, '.' | '!' | '?')
            && chars.get(i + 1).map_or(true, |n| n.is_whitespace());
        let blank_line = c == '\n'
            && chars[i + 1..]
                .iter()
                .find(|n| !matches!(n, ' ' | '\t' | '\r'))
                .map_or(false, |&n| n == '\n');

        if sentence_end {
            spans.push((s, i + 1));
            start = None;
        } else if blank_line {
            spans.push((s, trim_end(s, i)));
            start = None;
        }
    }

    if let Some(s) = start {
        let end = trim_end(s, chars.len());
        if end > s {
            spans.push((s, end));
        }
    }
    spans
}

fn find_missing_protections(text: &str, domain: DomainTag) -> Vec<&'static Protection> {
    let lower = text.to_lowercase();
    PROTECTIONS
        .iter()
        .zip(COMPILED_PROTECTIONS.iter())
        .filter(|(p, _)| p.domains.map_or(true, |ds| ds.contains(&domain)))
        .filter(|(_, regex)| !regex.is_match(&lower))
        .map(|(p, _)| p)
        .collect()
}

/// The highest-scoring clauses become key issues.
fn build_key_issues(clauses: &[Clause]) -> Vec<KeyIssue> {
    let mut ranked: Vec<&Clause> = clauses.iter().collect();
    ranked.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));

    ranked
        .into_iter()
        .take(KEY_ISSUE_LIMIT)
        .enumerate()
        .map(|(i, clause)| KeyIssue {
            id: format!("issue-{}", i + 1),
            title: clause.title.clone(),
            description: clause.explanation.clone(),
            risk_level: clause.risk_level,
            clause: clause.title.clone(),
            suggestion: clause.suggestions.first().cloned().unwrap_or_default(),
        })
        .collect()
}

fn build_summary(
    request: &ScoringRequest<'_>,
    risk_score: f64,
    clauses: &[Clause],
    missing: &[&Protection],
) -> String {
    let config = request.config;
    let mut summary = format!(
        "This {} contract scores {:.0}/100, which is {} risk for this kind of agreement.",
        request.domain.as_str().replace('_', " "),
        risk_score,
        config.band(risk_score).as_str(),
    );

    match clauses
        .iter()
        .max_by(|a, b| a.risk_score.total_cmp(&b.risk_score))
    {
        Some(top) => summary.push_str(&format!(
            " {} passage(s) need attention; the most serious is \"{}\".",
            clauses.len(),
            top.title
        )),
        None => summary.push_str(" No risky terms were detected in the text."),
    }

    if !missing.is_empty() {
        let titles: Vec<String> = missing
            .iter()
            .map(|p| format!("{} ({})", p.title.to_lowercase(), p.importance.as_str()))
            .collect();
        summary.push_str(&format!(" It does not mention: {}.", titles.join(", ")));
    }
    summary
}

// ────────────────────────────────────────────────────────────────────────────
// LlmRiskScorer
// ────────────────────────────────────────────────────────────────────────────

/// Model-driven scorer. The prompt carries the domain parameters; clause
/// spans in the reply are re-anchored on their quoted text.
pub struct LlmRiskScorer(pub LlmClient);

#[async_trait]
impl ScoringProcess for LlmRiskScorer {
    fn backend(&self) -> &'static str {
        "llm"
    }

    async fn score(&self, request: &ScoringRequest<'_>) -> Result<Value, ScoringError> {
        let prompt = build_analysis_prompt(request);
        let reply = self.0.call_json(&prompt, &analysis_system_prompt()).await;
        let mut candidate: Value = match reply {
            Ok(candidate) => candidate,
            Err(LlmError::Parse(e)) => return Err(ScoringError::Malformed(e.to_string())),
            Err(e) => return Err(e.into()),
        };
        anchor_clause_spans(&mut candidate, request.text);
        Ok(candidate)
    }
}

/// Models quote well but count characters badly. For each clause whose
/// reported span does not hold its quoted `content`, point the span at the
/// occurrence of that quote nearest the reported start. Quotes that appear
/// nowhere are left alone for the validator to reject.
pub fn anchor_clause_spans(candidate: &mut Value, text: &str) {
    let Some(clauses) = candidate.get_mut("clauses").and_then(Value::as_array_mut) else {
        return;
    };

    for clause in clauses.iter_mut() {
        let Some(quote) = clause.get("content").and_then(Value::as_str) else {
            continue;
        };
        if quote.is_empty() {
            continue;
        }
        let hint = clause.get("startIndex").and_then(Value::as_u64);
        let end_hint = clause.get("endIndex").and_then(Value::as_u64);

        if let (Some(start), Some(end)) = (hint, end_hint) {
            if char_slice(text, start as usize, end as usize) == Some(quote) {
                continue;
            }
        }

        let quote_len = quote.chars().count();
        let nearest = text
            .match_indices(quote)
            .map(|(byte, _)| text[..byte].chars().count())
            .min_by_key(|&start| start.abs_diff(hint.unwrap_or(0) as usize));

        if let Some(start) = nearest {
            clause["startIndex"] = json!(start);
            clause["endIndex"] = json!(start + quote_len);
        }
    }
}

/// `text[start..end]` in char offsets, or `None` when out of bounds.
fn char_slice(text: &str, start: usize, end: usize) -> Option<&str> {
    if start > end {
        return None;
    }
    let byte_at = |idx: usize| {
        text.char_indices()
            .map(|(b, _)| b)
            .chain(std::iter::once(text.len()))
            .nth(idx)
    };
    Some(&text[byte_at(start)?..byte_at(end)?])
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
