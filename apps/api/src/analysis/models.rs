//! Analysis records: the shape every accepted contract analysis has.
//!
//! `ContractAnalysis` has no public constructor: the only way to obtain one is
//! through `validation::validate`, and deserializing one runs the same gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::validation::{validate, ValidationError};

// ────────────────────────────────────────────────────────────────────────────
// Enumerations
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const VALUES: &'static [&'static str] = &["low", "medium", "high"];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Critical,
    Important,
    Recommended,
}

impl Importance {
    pub const VALUES: &'static [&'static str] = &["critical", "important", "recommended"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::Critical => "critical",
            Importance::Important => "important",
            Importance::Recommended => "recommended",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "critical" => Some(Importance::Critical),
            "important" => Some(Importance::Important),
            "recommended" => Some(Importance::Recommended),
            _ => None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Record types
// ────────────────────────────────────────────────────────────────────────────

/// A flagged clause. `start_index..end_index` is a char range into the
/// analysis content and `content` is exactly that slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clause {
    pub id: String,
    pub title: String,
    pub content: String,
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub explanation: String,
    pub suggestions: Vec<String>,
    pub start_index: usize,
    pub end_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyIssue {
    pub id: String,
    pub title: String,
    pub description: String,
    pub risk_level: RiskLevel,
    /// Title of the clause this issue refers to.
    pub clause: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingProtection {
    pub id: String,
    pub title: String,
    pub description: String,
    pub importance: Importance,
    pub sample_clause: String,
}

/// Per-category sub-scores, each in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBreakdown {
    pub payment: f64,
    pub liability: f64,
    pub termination: f64,
    pub confidentiality: f64,
    pub intellectual_property: f64,
}

impl RiskBreakdown {
    pub const CATEGORIES: [&'static str; 5] = [
        "payment",
        "liability",
        "termination",
        "confidentiality",
        "intellectual_property",
    ];
}

/// An accepted contract analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "Value")]
pub struct ContractAnalysis {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) content: String,
    pub(crate) risk_score: f64,
    pub(crate) clauses: Vec<Clause>,
    pub(crate) key_issues: Vec<KeyIssue>,
    pub(crate) missing_protections: Vec<MissingProtection>,
    pub(crate) risk_breakdown: RiskBreakdown,
    pub(crate) plain_language_summary: String,
    pub(crate) confidence: f64,
    pub(crate) analysis_date: DateTime<Utc>,
}

impl ContractAnalysis {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn risk_score(&self) -> f64 {
        self.risk_score
    }

    /// Clauses in the order the scoring process reported them.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn key_issues(&self) -> &[KeyIssue] {
        &self.key_issues
    }

    pub fn missing_protections(&self) -> &[MissingProtection] {
        &self.missing_protections
    }

    pub fn risk_breakdown(&self) -> &RiskBreakdown {
        &self.risk_breakdown
    }

    pub fn plain_language_summary(&self) -> &str {
        &self.plain_language_summary
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn analysis_date(&self) -> DateTime<Utc> {
        self.analysis_date
    }

    /// Clause slice of `content`. Spans are checked at validation time, so
    /// this never goes out of bounds.
    pub fn clause_text(&self, clause: &Clause) -> String {
        self.content
            .chars()
            .skip(clause.start_index)
            .take(clause.end_index - clause.start_index)
            .collect()
    }
}

impl TryFrom<Value> for ContractAnalysis {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        validate(&value)
    }
}
