//! Risk Configuration Resolver: per-domain scoring coefficients.
//!
//! Every scoring backend uses the same two parameters: penalties for negative
//! terms are scaled by `penalty_multiplier` before being added to a baseline,
//! and the aggregate is bucketed with `thresholds`. Only the coefficients vary
//! between domains; the scoring logic does not.

use serde::Serialize;

use crate::analysis::domain::DomainTag;
use crate::analysis::models::RiskLevel;

/// Ordered cut-points over the 0–100 score range: `low < medium < high <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskThresholds {
    pub low: u8,
    pub medium: u8,
    pub high: u8,
}

impl RiskThresholds {
    pub fn is_ordered(&self) -> bool {
        self.low < self.medium && self.medium < self.high && self.high <= 100
    }

    /// Low is `score <= low`, Medium is `low < score <= medium`, High is anything above.
    pub fn band(&self, score: f64) -> RiskLevel {
        if score <= f64::from(self.low) {
            RiskLevel::Low
        } else if score <= f64::from(self.medium) {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainConfig {
    pub domain: DomainTag,
    pub penalty_multiplier: f64,
    pub thresholds: RiskThresholds,
    pub description: &'static str,
}

impl DomainConfig {
    pub fn scale_penalty(&self, raw: f64) -> f64 {
        raw * self.penalty_multiplier
    }

    /// Baseline plus scaled penalties, clamped into `[0, 100]`.
    pub fn score<I>(&self, baseline: f64, penalties: I) -> f64
    where
        I: IntoIterator<Item = f64>,
    {
        let scaled: f64 = penalties.into_iter().map(|p| self.scale_penalty(p)).sum();
        (baseline + scaled).clamp(0.0, 100.0)
    }

    pub fn band(&self, score: f64) -> RiskLevel {
        self.thresholds.band(score)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Static table
// ────────────────────────────────────────────────────────────────────────────

static FINANCE: DomainConfig = DomainConfig {
    domain: DomainTag::Finance,
    penalty_multiplier: 1.2,
    thresholds: RiskThresholds { low: 30, medium: 60, high: 80 },
    description: "Loans, credit and investment agreements. Scored strictly: payment, \
        default and acceleration terms carry direct monetary exposure.",
};

static REAL_ESTATE: DomainConfig = DomainConfig {
    domain: DomainTag::RealEstate,
    penalty_multiplier: 1.1,
    thresholds: RiskThresholds { low: 28, medium: 55, high: 75 },
    description: "Leases, purchase agreements and property transfers. Long terms and \
        maintenance obligations make one-sided clauses costly.",
};

static INSURANCE: DomainConfig = DomainConfig {
    domain: DomainTag::Insurance,
    penalty_multiplier: 1.1,
    thresholds: RiskThresholds { low: 30, medium: 58, high: 78 },
    description: "Insurance policies and coverage agreements. Exclusions and claim \
        conditions decide whether coverage exists at all.",
};

static HEALTHCARE: DomainConfig = DomainConfig {
    domain: DomainTag::Healthcare,
    penalty_multiplier: 1.15,
    thresholds: RiskThresholds { low: 30, medium: 60, high: 80 },
    description: "Healthcare services and patient data agreements. Regulatory and \
        privacy obligations raise the cost of weak protections.",
};

static EMPLOYMENT: DomainConfig = DomainConfig {
    domain: DomainTag::Employment,
    penalty_multiplier: 1.0,
    thresholds: RiskThresholds { low: 25, medium: 50, high: 72 },
    description: "Employment and contractor agreements. Restrictive covenants and \
        termination terms matter most.",
};

static TECHNOLOGY: DomainConfig = DomainConfig {
    domain: DomainTag::Technology,
    penalty_multiplier: 1.0,
    thresholds: RiskThresholds { low: 25, medium: 55, high: 75 },
    description: "Software licences, SaaS and data processing agreements. IP \
        ownership, data handling and service levels dominate the risk.",
};

static CONSTRUCTION: DomainConfig = DomainConfig {
    domain: DomainTag::Construction,
    penalty_multiplier: 1.1,
    thresholds: RiskThresholds { low: 28, medium: 56, high: 76 },
    description: "Construction and trade contracts. Payment timing, change orders \
        and site liability are the usual pressure points.",
};

static VENDOR: DomainConfig = DomainConfig {
    domain: DomainTag::Vendor,
    penalty_multiplier: 0.7,
    thresholds: RiskThresholds { low: 20, medium: 45, high: 65 },
    description: "Supply and purchasing agreements. Scored leniently: terms are \
        usually standard and suppliers are replaceable.",
};

static PROFESSIONAL: DomainConfig = DomainConfig {
    domain: DomainTag::Professional,
    penalty_multiplier: 0.8,
    thresholds: RiskThresholds { low: 22, medium: 48, high: 68 },
    description: "Consulting and professional services engagements. Scope, fees \
        and deliverable ownership are the main concerns.",
};

static GENERAL: DomainConfig = DomainConfig {
    domain: DomainTag::General,
    penalty_multiplier: 0.9,
    thresholds: RiskThresholds { low: 25, medium: 50, high: 70 },
    description: "General commercial agreement with no specific industry signals.",
};

/// Looks up the configuration for a domain. The match is exhaustive, so a
/// missing entry is a compile error rather than a runtime condition.
pub fn resolve(domain: DomainTag) -> &'static DomainConfig {
    let config = match domain {
        DomainTag::Finance => &FINANCE,
        DomainTag::RealEstate => &REAL_ESTATE,
        DomainTag::Insurance => &INSURANCE,
        DomainTag::Healthcare => &HEALTHCARE,
        DomainTag::Employment => &EMPLOYMENT,
        DomainTag::Technology => &TECHNOLOGY,
        DomainTag::Construction => &CONSTRUCTION,
        DomainTag::Vendor => &VENDOR,
        DomainTag::Professional => &PROFESSIONAL,
        DomainTag::General => &GENERAL,
    };
    debug_assert!(
        config.thresholds.is_ordered(),
        "{domain} thresholds must satisfy low < medium < high <= 100"
    );
    config
}

/// The whole table, in `DomainTag::ALL` order.
pub fn all_configs() -> Vec<&'static DomainConfig> {
    DomainTag::ALL.into_iter().map(resolve).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_domain_resolves_to_its_own_entry() {
        for tag in DomainTag::ALL {
            assert_eq!(resolve(tag).domain, tag);
        }
    }

    #[test]
    fn test_all_thresholds_are_ordered() {
        for config in all_configs() {
            assert!(
                config.thresholds.is_ordered(),
                "{} thresholds out of order: {:?}",
                config.domain,
                config.thresholds
            );
        }
    }

    #[test]
    fn test_all_multipliers_positive_and_descriptions_present() {
        for config in all_configs() {
            assert!(config.penalty_multiplier > 0.0, "{}", config.domain);
            assert!(!config.description.trim().is_empty(), "{}", config.domain);
        }
    }

    #[test]
    fn test_finance_config() {
        let c = resolve(DomainTag::Finance);
        assert_eq!(c.penalty_multiplier, 1.2);
        assert_eq!(c.thresholds, RiskThresholds { low: 30, medium: 60, high: 80 });
    }

    #[test]
    fn test_vendor_config() {
        let c = resolve(DomainTag::Vendor);
        assert_eq!(c.penalty_multiplier, 0.7);
        assert_eq!(c.thresholds, RiskThresholds { low: 20, medium: 45, high: 65 });
    }

    #[test]
    fn test_general_config() {
        let c = resolve(DomainTag::General);
        assert_eq!(c.penalty_multiplier, 0.9);
        assert_eq!(c.thresholds, RiskThresholds { low: 25, medium: 50, high: 70 });
    }

    #[test]
    fn test_band_boundaries() {
        let t = RiskThresholds { low: 30, medium: 60, high: 80 };
        assert_eq!(t.band(0.0), RiskLevel::Low);
        assert_eq!(t.band(30.0), RiskLevel::Low);
        assert_eq!(t.band(30.5), RiskLevel::Medium);
        assert_eq!(t.band(60.0), RiskLevel::Medium);
        assert_eq!(t.band(60.1), RiskLevel::High);
        assert_eq!(t.band(100.0), RiskLevel::High);
    }

    #[test]
    fn test_same_score_bands_differently_per_domain() {
        // 50 is Medium under finance (30/60) but High under vendor (20/45).
        assert_eq!(resolve(DomainTag::Finance).band(50.0), RiskLevel::Medium);
        assert_eq!(resolve(DomainTag::Vendor).band(50.0), RiskLevel::High);
    }

    #[test]
    fn test_penalties_scaled_by_multiplier() {
        let finance = resolve(DomainTag::Finance).score(10.0, [20.0, 10.0]);
        let vendor = resolve(DomainTag::Vendor).score(10.0, [20.0, 10.0]);
        assert!((finance - 46.0).abs() < 1e-9, "finance was {finance}");
        assert!((vendor - 31.0).abs() < 1e-9, "vendor was {vendor}");
    }

    #[test]
    fn test_score_clamped_to_range() {
        let c = resolve(DomainTag::Finance);
        assert_eq!(c.score(90.0, [50.0]), 100.0);
        assert_eq!(c.score(0.0, std::iter::empty()), 0.0);
    }

    #[test]
    fn test_config_serializes_camel_case() {
        let value = serde_json::to_value(resolve(DomainTag::RealEstate)).unwrap();
        assert_eq!(value["domain"], "real_estate");
        assert_eq!(value["penaltyMultiplier"], 1.1);
        assert_eq!(value["thresholds"]["medium"], 55);
    }
}
