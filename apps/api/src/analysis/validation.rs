//! Analysis contract validator. This is the gate every candidate analysis passes
//! before it becomes a `ContractAnalysis`, whichever scorer produced it.
//!
//! Checks run in a fixed order and stop at the first violation:
//! 1. structure (fields, JSON types, enum values, unique ids)
//! 2. score and confidence ranges
//! 3. clause spans against `content`
//! 4. no partially overlapping clause spans
//! 5. risk breakdown holds exactly the five categories
//!
//! Out-of-range values are rejected, never clamped.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::analysis::models::{
    Clause, ContractAnalysis, Importance, KeyIssue, MissingProtection, RiskBreakdown, RiskLevel,
};

// ────────────────────────────────────────────────────────────────────────────
// Error types
// ────────────────────────────────────────────────────────────────────────────

/// A rejected candidate: the offending field path (e.g. `clauses[2].riskScore`)
/// and the invariant it broke.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{field}: {violation}")]
pub struct ValidationError {
    pub field: String,
    pub violation: Violation,
}

impl ValidationError {
    fn new(field: impl Into<String>, violation: Violation) -> Self {
        Self {
            field: field.into(),
            violation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    #[error("required field is missing")]
    Missing,

    #[error("expected {expected}")]
    WrongType { expected: &'static str },

    #[error("'{value}' is not one of {allowed:?}")]
    NotInEnum {
        value: String,
        allowed: &'static [&'static str],
    },

    #[error("duplicate id '{id}'")]
    DuplicateId { id: String },

    #[error("{value} is outside [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },

    #[error("clause '{clause_id}' span [{start}, {end}) is invalid for content of length {len}")]
    InvalidSpan {
        clause_id: String,
        start: i64,
        end: i64,
        len: usize,
    },

    #[error("clause '{clause_id}' content does not match content[{start}..{end}]")]
    SpanMismatch {
        clause_id: String,
        start: usize,
        end: usize,
    },

    #[error("clause '{clause_id}' partially overlaps clause '{other}'")]
    PartialOverlap { clause_id: String, other: String },

    #[error("breakdown needs the five categories: missing {missing:?}, unexpected {unexpected:?}")]
    IncompleteBreakdown {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Public entry points
// ────────────────────────────────────────────────────────────────────────────

/// Validates a candidate analysis, stamping `analysisDate` with the current
/// time and `id` with a fresh UUID when they are absent.
pub fn validate(candidate: &Value) -> Result<ContractAnalysis, ValidationError> {
    validate_at(candidate, Utc::now())
}

/// Same as [`validate`] with an explicit stamp time.
pub fn validate_at(
    candidate: &Value,
    now: DateTime<Utc>,
) -> Result<ContractAnalysis, ValidationError> {
    let draft = Draft::parse(&Node::root(candidate))?;
    draft.check_ranges()?;
    let spans = draft.check_spans()?;
    check_overlap(&draft.clauses, &spans)?;
    let risk_breakdown = draft.check_breakdown()?;

    let clauses = draft
        .clauses
        .into_iter()
        .zip(spans)
        .map(|(c, (start_index, end_index))| Clause {
            id: c.id,
            title: c.title,
            content: c.content,
            risk_level: c.risk_level,
            risk_score: c.risk_score,
            explanation: c.explanation,
            suggestions: c.suggestions,
            start_index,
            end_index,
        })
        .collect();

    Ok(ContractAnalysis {
        id: draft.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        title: draft.title,
        content: draft.content,
        risk_score: draft.risk_score,
        clauses,
        key_issues: draft.key_issues,
        missing_protections: draft.missing_protections,
        risk_breakdown,
        plain_language_summary: draft.plain_language_summary,
        confidence: draft.confidence,
        analysis_date: draft.analysis_date.unwrap_or(now),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// JSON navigation
// ────────────────────────────────────────────────────────────────────────────

struct Node<'a> {
    value: &'a Value,
    path: String,
}

impl<'a> Node<'a> {
    fn root(value: &'a Value) -> Self {
        Self {
            value,
            path: String::new(),
        }
    }

    fn child_path(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.path, name)
        }
    }

    fn fail(&self, violation: Violation) -> ValidationError {
        let field = if self.path.is_empty() {
            "<root>".to_string()
        } else {
            self.path.clone()
        };
        ValidationError::new(field, violation)
    }

    fn object(&self) -> Result<&'a Map<String, Value>, ValidationError> {
        self.value.as_object().ok_or_else(|| {
            self.fail(Violation::WrongType {
                expected: "object",
            })
        })
    }

    /// Absent and `null` are both treated as missing.
    fn optional(&self, name: &str) -> Result<Option<Node<'a>>, ValidationError> {
        Ok(match self.object()?.get(name) {
            None | Some(Value::Null) => None,
            Some(value) => Some(Node {
                value,
                path: self.child_path(name),
            }),
        })
    }

    fn field(&self, name: &str) -> Result<Node<'a>, ValidationError> {
        self.optional(name)?
            .ok_or_else(|| ValidationError::new(self.child_path(name), Violation::Missing))
    }

    fn string(&self) -> Result<String, ValidationError> {
        self.value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.fail(Violation::WrongType { expected: "string" }))
    }

    fn number(&self) -> Result<f64, ValidationError> {
        self.value
            .as_f64()
            .ok_or_else(|| self.fail(Violation::WrongType { expected: "number" }))
    }

    fn integer(&self) -> Result<i64, ValidationError> {
        match self.value {
            Value::Number(n) if n.is_i64() || n.is_u64() => {
                Ok(n.as_i64().unwrap_or(i64::MAX))
            }
            _ => Err(self.fail(Violation::WrongType {
                expected: "integer",
            })),
        }
    }

    fn items(&self) -> Result<Vec<Node<'a>>, ValidationError> {
        let array = self
            .value
            .as_array()
            .ok_or_else(|| self.fail(Violation::WrongType { expected: "array" }))?;
        Ok(array
            .iter()
            .enumerate()
            .map(|(i, value)| Node {
                value,
                path: format!("{}[{}]", self.path, i),
            })
            .collect())
    }

    fn strings(&self) -> Result<Vec<String>, ValidationError> {
        self.items()?.iter().map(Node::string).collect()
    }

    fn risk_level(&self) -> Result<RiskLevel, ValidationError> {
        let value = self.string()?;
        RiskLevel::parse(&value).ok_or_else(|| {
            self.fail(Violation::NotInEnum {
                value,
                allowed: RiskLevel::VALUES,
            })
        })
    }

    fn importance(&self) -> Result<Importance, ValidationError> {
        let value = self.string()?;
        Importance::parse(&value).ok_or_else(|| {
            self.fail(Violation::NotInEnum {
                value,
                allowed: Importance::VALUES,
            })
        })
    }

    fn timestamp(&self) -> Result<DateTime<Utc>, ValidationError> {
        let raw = self.string()?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|_| {
                self.fail(Violation::WrongType {
                    expected: "RFC 3339 timestamp",
                })
            })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Step 1: structure
// ────────────────────────────────────────────────────────────────────────────

struct DraftClause {
    path: String,
    id: String,
    title: String,
    content: String,
    risk_level: RiskLevel,
    risk_score: f64,
    explanation: String,
    suggestions: Vec<String>,
    start_index: i64,
    end_index: i64,
}

struct Draft {
    id: Option<String>,
    title: String,
    content: String,
    risk_score: f64,
    clauses: Vec<DraftClause>,
    key_issues: Vec<KeyIssue>,
    missing_protections: Vec<MissingProtection>,
    breakdown: BTreeMap<String, f64>,
    plain_language_summary: String,
    confidence: f64,
    analysis_date: Option<DateTime<Utc>>,
}

impl Draft {
    fn parse(root: &Node) -> Result<Self, ValidationError> {
        root.object()?;

        let id = root.optional("id")?.map(|n| n.string()).transpose()?;
        let title = root.field("title")?.string()?;
        let content = root.field("content")?.string()?;
        let risk_score = root.field("riskScore")?.number()?;

        let clauses_node = root.field("clauses")?;
        let clauses = clauses_node
            .items()?
            .iter()
            .map(parse_clause)
            .collect::<Result<Vec<_>, _>>()?;
        ensure_unique_ids(&clauses_node, clauses.iter().map(|c| c.id.as_str()))?;

        let issues_node = root.field("keyIssues")?;
        let key_issues = issues_node
            .items()?
            .iter()
            .map(parse_key_issue)
            .collect::<Result<Vec<_>, _>>()?;
        ensure_unique_ids(&issues_node, key_issues.iter().map(|k| k.id.as_str()))?;

        let missing_node = root.field("missingProtections")?;
        let missing_protections = missing_node
            .items()?
            .iter()
            .map(parse_missing_protection)
            .collect::<Result<Vec<_>, _>>()?;
        ensure_unique_ids(
            &missing_node,
            missing_protections.iter().map(|m| m.id.as_str()),
        )?;

        let breakdown_node = root.field("riskBreakdown")?;
        let mut breakdown = BTreeMap::new();
        for (key, value) in breakdown_node.object()? {
            let node = Node {
                value,
                path: breakdown_node.child_path(key),
            };
            breakdown.insert(key.clone(), node.number()?);
        }

        let plain_language_summary = root.field("plainLanguageSummary")?.string()?;
        let confidence = root.field("confidence")?.number()?;
        let analysis_date = root
            .optional("analysisDate")?
            .map(|n| n.timestamp())
            .transpose()?;

        Ok(Self {
            id,
            title,
            content,
            risk_score,
            clauses,
            key_issues,
            missing_protections,
            breakdown,
            plain_language_summary,
            confidence,
            analysis_date,
        })
    }

    // ────────────────────────────────────────────────────────────────────────
    // Step 2: ranges
    // ────────────────────────────────────────────────────────────────────────

    fn check_ranges(&self) -> Result<(), ValidationError> {
        check_range("riskScore", self.risk_score, 0.0, 100.0)?;
        for clause in &self.clauses {
            check_range(
                &format!("{}.riskScore", clause.path),
                clause.risk_score,
                0.0,
                100.0,
            )?;
        }
        for (key, score) in &self.breakdown {
            check_range(&format!("riskBreakdown.{key}"), *score, 0.0, 100.0)?;
        }
        check_range("confidence", self.confidence, 0.0, 1.0)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Step 3: spans
    // ────────────────────────────────────────────────────────────────────────

    /// Returns each clause's span as char offsets.
    fn check_spans(&self) -> Result<Vec<(usize, usize)>, ValidationError> {
        // Byte offset of every char boundary, including the end of the string.
        let boundaries: Vec<usize> = self
            .content
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(self.content.len()))
            .collect();
        let len = boundaries.len() - 1;

        self.clauses
            .iter()
            .map(|clause| {
                let (start, end) = (clause.start_index, clause.end_index);
                if start < 0 || start >= end || end > len as i64 {
                    return Err(ValidationError::new(
                        clause.path.clone(),
                        Violation::InvalidSpan {
                            clause_id: clause.id.clone(),
                            start,
                            end,
                            len,
                        },
                    ));
                }
                let (start, end) = (start as usize, end as usize);
                if self.content[boundaries[start]..boundaries[end]] != clause.content {
                    return Err(ValidationError::new(
                        format!("{}.content", clause.path),
                        Violation::SpanMismatch {
                            clause_id: clause.id.clone(),
                            start,
                            end,
                        },
                    ));
                }
                Ok((start, end))
            })
            .collect()
    }

    // ────────────────────────────────────────────────────────────────────────
    // Step 5: breakdown completeness
    // ────────────────────────────────────────────────────────────────────────

    fn check_breakdown(&self) -> Result<RiskBreakdown, ValidationError> {
        let missing: Vec<String> = RiskBreakdown::CATEGORIES
            .iter()
            .filter(|c| !self.breakdown.contains_key(**c))
            .map(|c| c.to_string())
            .collect();
        let unexpected: Vec<String> = self
            .breakdown
            .keys()
            .filter(|k| !RiskBreakdown::CATEGORIES.iter().any(|c| *c == k.as_str()))
            .cloned()
            .collect();

        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(ValidationError::new(
                "riskBreakdown",
                Violation::IncompleteBreakdown {
                    missing,
                    unexpected,
                },
            ));
        }

        let score = |key: &str| self.breakdown.get(key).copied().unwrap_or_default();
        Ok(RiskBreakdown {
            payment: score("payment"),
            liability: score("liability"),
            termination: score("termination"),
            confidentiality: score("confidentiality"),
            intellectual_property: score("intellectual_property"),
        })
    }
}

fn parse_clause(node: &Node) -> Result<DraftClause, ValidationError> {
    node.object()?;
    Ok(DraftClause {
        path: node.path.clone(),
        id: node.field("id")?.string()?,
        title: node.field("title")?.string()?,
        content: node.field("content")?.string()?,
        risk_level: node.field("riskLevel")?.risk_level()?,
        risk_score: node.field("riskScore")?.number()?,
        explanation: node.field("explanation")?.string()?,
        suggestions: node.field("suggestions")?.strings()?,
        start_index: node.field("startIndex")?.integer()?,
        end_index: node.field("endIndex")?.integer()?,
    })
}

fn parse_key_issue(node: &Node) -> Result<KeyIssue, ValidationError> {
    node.object()?;
    Ok(KeyIssue {
        id: node.field("id")?.string()?,
        title: node.field("title")?.string()?,
        description: node.field("description")?.string()?,
        risk_level: node.field("riskLevel")?.risk_level()?,
        clause: node.field("clause")?.string()?,
        suggestion: node.field("suggestion")?.string()?,
    })
}

fn parse_missing_protection(node: &Node) -> Result<MissingProtection, ValidationError> {
    node.object()?;
    Ok(MissingProtection {
        id: node.field("id")?.string()?,
        title: node.field("title")?.string()?,
        description: node.field("description")?.string()?,
        importance: node.field("importance")?.importance()?,
        sample_clause: node.field("sampleClause")?.string()?,
    })
}

fn ensure_unique_ids<'i>(
    list: &Node,
    ids: impl Iterator<Item = &'i str>,
) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for (i, id) in ids.enumerate() {
        if !seen.insert(id) {
            return Err(ValidationError::new(
                format!("{}[{}].id", list.path, i),
                Violation::DuplicateId { id: id.to_string() },
            ));
        }
    }
    Ok(())
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new(
            field,
            Violation::OutOfRange { value, min, max },
        ))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Step 4: overlap
// ────────────────────────────────────────────────────────────────────────────

/// Nested spans are fine; spans that cross each other are not.
fn check_overlap(clauses: &[DraftClause], spans: &[(usize, usize)]) -> Result<(), ValidationError> {
    let mut order: Vec<usize> = (0..spans.len()).collect();
    // Outer spans sort before the spans they contain.
    order.sort_by(|&a, &b| {
        spans[a]
            .0
            .cmp(&spans[b].0)
            .then(spans[b].1.cmp(&spans[a].1))
    });

    // Stack of currently open spans; each contains the one above it.
    let mut open: Vec<usize> = Vec::new();
    for idx in order {
        let (start, end) = spans[idx];
        while let Some(&top) = open.last() {
            if spans[top].1 <= start {
                open.pop();
            } else {
                break;
            }
        }
        if let Some(&top) = open.last() {
            if end > spans[top].1 {
                return Err(ValidationError::new(
                    clauses[idx].path.clone(),
                    Violation::PartialOverlap {
                        clause_id: clauses[idx].id.clone(),
                        other: clauses[top].id.clone(),
                    },
                ));
            }
        }
        open.push(idx);
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
