// Shared prompt fragments. Each module that calls the model keeps its own
// prompts.rs alongside it; only cross-cutting instructions live here.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Instruction that keeps quoted contract text usable as a span.
pub const VERBATIM_INSTRUCTION: &str = "\
    CRITICAL: Every quoted clause must be copied character-for-character from the \
    contract text, including punctuation and capitalization. Do NOT paraphrase, \
    abbreviate, join separate passages, or fix typos inside a quotation. \
    Quotations must not overlap unless one lies entirely inside the other.";

/// Value ranges and enum spellings accepted by the validator.
pub const RANGE_INSTRUCTION: &str = "\
    CRITICAL: Every riskScore and every riskBreakdown value is a number from 0 to 100. \
    confidence is a number from 0 to 1. riskLevel is exactly one of \"low\", \"medium\", \"high\". \
    importance is exactly one of \"critical\", \"important\", \"recommended\".";
