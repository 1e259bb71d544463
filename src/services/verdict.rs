//! Probability-to-verdict classification.
//!
//! A claim's TRUE / FALSE / UNCERTAIN distribution is converted to
//! percentages and run through an ordered rule table; the first rule whose
//! predicate holds decides the label. The order is part of the contract.

use crate::models::verdict::{ProbabilityDistribution, VerdictLabel};

/// Distribution expressed in percentage points, sanitised to finite, non-negative values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percentages {
    pub true_: f64,
    pub false_: f64,
    pub uncertain: f64,
}

impl Percentages {
    pub fn from_distribution(dist: &ProbabilityDistribution) -> Self {
        Self {
            true_: sanitize(dist.true_) * 100.0,
            false_: sanitize(dist.false_) * 100.0,
            uncertain: sanitize(dist.uncertain) * 100.0,
        }
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// One row of the classification cascade.
pub struct VerdictRule {
    pub name: &'static str,
    pub applies: fn(&Percentages) -> bool,
    pub label: VerdictLabel,
}

/// Evaluated top to bottom, first match wins.
///
/// The strong, majority and lean-true thresholds are checked before the rules
/// that fold UNCERTAIN mass into one side; lean-false stays after them.
pub static VERDICT_RULES: &[VerdictRule] = &[
    VerdictRule {
        name: "strong_true",
        applies: |p| p.true_ > 70.0 && p.false_ < 10.0,
        label: VerdictLabel::HighlyLikelyTrue,
    },
    VerdictRule {
        name: "strong_false",
        applies: |p| p.false_ > 75.0,
        label: VerdictLabel::HighlyLikelyFalse,
    },
    VerdictRule {
        name: "majority_true",
        applies: |p| p.true_ > 50.0 && p.false_ < 20.0,
        label: VerdictLabel::LikelyTrue,
    },
    VerdictRule {
        name: "majority_false",
        applies: |p| p.false_ > 45.0 && p.true_ < 25.0,
        label: VerdictLabel::LikelyFalse,
    },
    VerdictRule {
        name: "lean_true",
        applies: |p| p.true_ > 40.0 && p.false_ < 35.0,
        label: VerdictLabel::LeaningTrue,
    },
    VerdictRule {
        name: "uncertain_weighted_true",
        applies: |p| p.true_ + p.uncertain > 65.0 && p.false_ < 35.0,
        label: VerdictLabel::LikelyTrue,
    },
    VerdictRule {
        name: "uncertain_weighted_false",
        applies: |p| p.false_ + p.uncertain > 65.0 && p.true_ < 35.0,
        label: VerdictLabel::LikelyFalse,
    },
    VerdictRule {
        name: "lean_false",
        applies: |p| p.false_ > 35.0 && p.true_ < 30.0,
        label: VerdictLabel::LeaningFalse,
    },
    VerdictRule {
        name: "balanced",
        applies: |p| (p.true_ - p.false_).abs() < 10.0,
        label: VerdictLabel::Uncertain,
    },
];

/// Name of the rule that decided `dist`, or `"tie_break"` when none matched.
pub fn deciding_rule(dist: &ProbabilityDistribution) -> &'static str {
    let pct = Percentages::from_distribution(dist);
    VERDICT_RULES
        .iter()
        .find(|rule| (rule.applies)(&pct))
        .map(|rule| rule.name)
        .unwrap_or("tie_break")
}

/// Classify a distribution. Total and deterministic.
pub fn classify(dist: &ProbabilityDistribution) -> VerdictLabel {
    let pct = Percentages::from_distribution(dist);
    if let Some(rule) = VERDICT_RULES.iter().find(|rule| (rule.applies)(&pct)) {
        return rule.label;
    }
    if pct.true_ > pct.false_ {
        VerdictLabel::LeaningTrue
    } else {
        VerdictLabel::LeaningFalse
    }
}

/// A missing distribution is treated as fully unknown (all zero).
pub fn classify_optional(dist: Option<&ProbabilityDistribution>) -> VerdictLabel {
    match dist {
        Some(d) => classify(d),
        None => classify(&ProbabilityDistribution::default()),
    }
}
