//! Domain Classifier: maps contract text and title to a coarse industry tag.
//!
//! Keyword groups are tested in a fixed priority order and the first group
//! with any word-boundary match wins. Contracts routinely share vocabulary
//! across domains (a loan agreement for software licences mentions both), so
//! the order is load-bearing: do not reorder `PRIORITY` casually.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainTag {
    Finance,
    RealEstate,
    Insurance,
    Healthcare,
    Employment,
    Technology,
    Construction,
    Vendor,
    Professional,
    General,
}

impl DomainTag {
    pub const ALL: [DomainTag; 10] = [
        DomainTag::Finance,
        DomainTag::RealEstate,
        DomainTag::Insurance,
        DomainTag::Healthcare,
        DomainTag::Employment,
        DomainTag::Technology,
        DomainTag::Construction,
        DomainTag::Vendor,
        DomainTag::Professional,
        DomainTag::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DomainTag::Finance => "finance",
            DomainTag::RealEstate => "real_estate",
            DomainTag::Insurance => "insurance",
            DomainTag::Healthcare => "healthcare",
            DomainTag::Employment => "employment",
            DomainTag::Technology => "technology",
            DomainTag::Construction => "construction",
            DomainTag::Vendor => "vendor",
            DomainTag::Professional => "professional",
            DomainTag::General => "general",
        }
    }
}

impl fmt::Display for DomainTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Keyword groups
// ────────────────────────────────────────────────────────────────────────────

/// Terms are lower-case regex fragments, matched on word boundaries.
struct KeywordGroup {
    domain: DomainTag,
    terms: &'static [&'static str],
}

/// Tested top to bottom. `General` has no group; it is the fallback.
const PRIORITY: &[KeywordGroup] = &[
    KeywordGroup {
        domain: DomainTag::Finance,
        terms: &[
            "loans?",
            "lenders?",
            "borrowers?",
            "interest rates?",
            "credit facilit(?:y|ies)",
            "promissory notes?",
            "financing",
            "collateral",
            "repayment",
            "amortization",
            "principal amount",
            "securities",
            "investments?",
        ],
    },
    KeywordGroup {
        domain: DomainTag::RealEstate,
        terms: &[
            "leas(?:e|es|ed|ing)",
            "landlords?",
            "tenants?",
            "lessee",
            "lessor",
            "premises",
            "real estate",
            "real property",
            "mortgages?",
            "escrow",
            "deeds?",
            "rent",
        ],
    },
    KeywordGroup {
        domain: DomainTag::Insurance,
        terms: &[
            "insurance",
            "insurers?",
            "insured",
            "policyholders?",
            "underwriting",
            "deductibles?",
            "premiums?",
        ],
    },
    KeywordGroup {
        domain: DomainTag::Employment,
        terms: &[
            "employees?",
            "employers?",
            "employment",
            "salary",
            "wages?",
            "non-compete",
            "severance",
            "probationary period",
        ],
    },
    KeywordGroup {
        domain: DomainTag::Technology,
        terms: &[
            "software",
            "saas",
            "source code",
            "licensee",
            "licensor",
            "api",
            "cloud",
            "hosting",
            "uptime",
            "service level agreement",
            "data processing",
        ],
    },
    KeywordGroup {
        domain: DomainTag::Healthcare,
        terms: &[
            "patients?",
            "medical",
            "healthcare",
            "health care",
            "hipaa",
            "physicians?",
            "clinical",
            "protected health information",
        ],
    },
    KeywordGroup {
        domain: DomainTag::Construction,
        terms: &[
            "construction",
            "subcontractors?",
            "general contractor",
            "change orders?",
            "retainage",
            "building permits?",
            "job site",
            "punch list",
        ],
    },
    KeywordGroup {
        domain: DomainTag::Vendor,
        terms: &[
            "vendors?",
            "suppliers?",
            "purchase orders?",
            "procurement",
            "goods",
            "supply agreement",
            "delivery terms",
        ],
    },
    KeywordGroup {
        domain: DomainTag::Professional,
        terms: &[
            "consulting",
            "consultants?",
            "professional services",
            "statement of work",
            "advisory",
            "retainer",
            "engagement letter",
        ],
    },
];

static COMPILED: Lazy<Vec<(DomainTag, Regex)>> = Lazy::new(|| {
    PRIORITY
        .iter()
        .map(|group| {
            let pattern = format!(r"\b(?:{})\b", group.terms.join("|"));
            let regex = Regex::new(&pattern).expect("domain keyword patterns are valid regexes");
            (group.domain, regex)
        })
        .collect()
});

// ────────────────────────────────────────────────────────────────────────────
// Classification
// ────────────────────────────────────────────────────────────────────────────

/// Classifier result with the term that decided it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub domain: DomainTag,
    /// `None` when nothing matched and the contract fell back to `general`.
    pub matched_term: Option<String>,
}

/// Classifies a contract. Always returns a tag; `General` when no group matches.
pub fn classify(text: &str, title: &str) -> DomainTag {
    classify_with_evidence(text, title).domain
}

pub fn classify_with_evidence(text: &str, title: &str) -> Classification {
    let haystack = format!("{text} {title}").to_lowercase();

    for (domain, regex) in COMPILED.iter() {
        if let Some(found) = regex.find(&haystack) {
            return Classification {
                domain: *domain,
                matched_term: Some(found.as_str().to_string()),
            };
        }
    }

    Classification {
        domain: DomainTag::General,
        matched_term: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loan_agreement_is_finance() {
        let text = "This loan agreement carries a 15% interest rate payable monthly.";
        assert_eq!(classify(text, "Loan"), DomainTag::Finance);
    }

    #[test]
    fn test_finance_wins_over_technology() {
        let text = "The lender will fund the purchase of software licences.";
        assert_eq!(classify(text, ""), DomainTag::Finance);
    }

    #[test]
    fn test_real_estate_wins_over_insurance() {
        let text = "Tenant shall maintain insurance on the premises.";
        assert_eq!(classify(text, "Agreement"), DomainTag::RealEstate);
    }

    #[test]
    fn test_employment_wins_over_technology() {
        let text = "The employee will maintain the company's software.";
        assert_eq!(classify(text, ""), DomainTag::Employment);
    }

    #[test]
    fn test_technology_wins_over_healthcare() {
        let text = "Provider hosts the SaaS platform used for patient scheduling.";
        assert_eq!(classify(text, ""), DomainTag::Technology);
    }

    #[test]
    fn test_each_domain_detected_alone() {
        let cases = [
            ("The insurer shall pay covered claims.", DomainTag::Insurance),
            ("Physicians will treat each patient.", DomainTag::Healthcare),
            ("Subcontractor shall follow the change order process.", DomainTag::Construction),
            ("Supplier ships goods against each purchase order.", DomainTag::Vendor),
            (
                "Consultant provides advisory work under a statement of work.",
                DomainTag::Professional,
            ),
        ];
        for (text, expected) in cases {
            assert_eq!(classify(text, ""), expected, "text: {text}");
        }
    }

    #[test]
    fn test_title_alone_can_decide() {
        assert_eq!(
            classify("The parties agree as follows.", "Residential Lease"),
            DomainTag::RealEstate
        );
    }

    #[test]
    fn test_lease_inflections_are_real_estate() {
        for (text, term) in [
            ("The warehouse is leased for two years.", "leased"),
            ("All Leases end on the same date.", "leases"),
            ("Leasing the unit requires a deposit.", "leasing"),
        ] {
            let c = classify_with_evidence(text, "");
            assert_eq!(c.domain, DomainTag::RealEstate, "text: {text}");
            assert_eq!(c.matched_term.as_deref(), Some(term));
        }
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(classify("PROMISSORY NOTE", ""), DomainTag::Finance);
    }

    #[test]
    fn test_word_boundaries_respected() {
        // "rent" in "current" and "api" in "capitalization" are not whole words.
        let text = "The current capitalization of the parties is unchanged.";
        assert_eq!(classify(text, ""), DomainTag::General);
    }

    #[test]
    fn test_no_keywords_falls_back_to_general() {
        let c = classify_with_evidence("The parties agree to meet quarterly.", "Memo");
        assert_eq!(c.domain, DomainTag::General);
        assert!(c.matched_term.is_none());
    }

    #[test]
    fn test_empty_input_is_general() {
        assert_eq!(classify("", ""), DomainTag::General);
    }

    #[test]
    fn test_evidence_reports_matched_term() {
        let c = classify_with_evidence("Borrowers must repay.", "");
        assert_eq!(c.domain, DomainTag::Finance);
        assert_eq!(c.matched_term.as_deref(), Some("borrowers"));
    }

    #[test]
    fn test_classify_is_deterministic() {
        let text = "Vendor supplies cloud hosting to the tenant.";
        let first = classify(text, "Mixed");
        for _ in 0..10 {
            assert_eq!(classify(text, "Mixed"), first);
        }
    }

    #[test]
    fn test_priority_covers_every_domain_but_general() {
        let covered: Vec<DomainTag> = PRIORITY.iter().map(|g| g.domain).collect();
        for tag in DomainTag::ALL {
            assert_eq!(covered.contains(&tag), tag != DomainTag::General, "{tag}");
        }
    }

    #[test]
    fn test_domain_tag_serializes_snake_case() {
        let json = serde_json::to_string(&DomainTag::RealEstate).unwrap();
        assert_eq!(json, "\"real_estate\"");
        for tag in DomainTag::ALL {
            let round: DomainTag =
                serde_json::from_str(&format!("\"{}\"", tag.as_str())).unwrap();
            assert_eq!(round, tag);
        }
    }
}
