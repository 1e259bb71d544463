use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Claim categories that get a dedicated search strategy.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClaimType {
    Credential,
    Publication,
    Study,
    Absence,
    ProductEfficacy,
    Other,
}

impl ClaimType {
    /// Exact-match parse; anything unrecognised is `Other`.
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(ClaimType::Other)
    }
}

/// Ranked search queries for one claim. Order within each list is significant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QuerySet {
    pub primary: Vec<String>,
    pub fallback: Vec<String>,
    pub negative: Vec<String>,
}
