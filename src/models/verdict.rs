use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Ordinal verdict summarising a claim's probability distribution.
///
/// `Mixed` and `UnableToDetermine` exist for presentation only; the
/// classifier never produces them.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictLabel {
    HighlyLikelyTrue,
    LikelyTrue,
    LeaningTrue,
    Uncertain,
    Mixed,
    UnableToDetermine,
    LeaningFalse,
    LikelyFalse,
    HighlyLikelyFalse,
}

impl VerdictLabel {
    /// Human-readable name for reports and dashboards.
    pub fn display_name(self) -> &'static str {
        match self {
            VerdictLabel::HighlyLikelyTrue => "Highly Likely True",
            VerdictLabel::LikelyTrue => "Likely True",
            VerdictLabel::LeaningTrue => "Leaning True",
            VerdictLabel::Uncertain => "Uncertain",
            VerdictLabel::Mixed => "Mixed",
            VerdictLabel::UnableToDetermine => "Unable to Determine",
            VerdictLabel::LeaningFalse => "Leaning False",
            VerdictLabel::LikelyFalse => "Likely False",
            VerdictLabel::HighlyLikelyFalse => "Highly Likely False",
        }
    }

    pub fn is_presentation_alias(self) -> bool {
        matches!(self, VerdictLabel::Mixed | VerdictLabel::UnableToDetermine)
    }
}

/// Probability mass over TRUE / FALSE / UNCERTAIN; missing keys read as 0.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ProbabilityDistribution {
    #[serde(rename = "TRUE", default)]
    pub true_: f64,
    #[serde(rename = "FALSE", default)]
    pub false_: f64,
    #[serde(rename = "UNCERTAIN", default)]
    pub uncertain: f64,
}

impl ProbabilityDistribution {
    pub fn new(true_: f64, false_: f64, uncertain: f64) -> Self {
        Self {
            true_,
            false_,
            uncertain,
        }
    }

    pub fn total(&self) -> f64 {
        self.true_ + self.false_ + self.uncertain
    }
}
