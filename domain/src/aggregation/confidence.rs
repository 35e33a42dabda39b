use serde::{Deserialize, Serialize};

/// Categorical confidence.
///
/// Ordered `Low < Medium < High < VeryHigh`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum ConfidenceLevel {
    #[default]
    Low,
    Medium,
    High,
    #[serde(alias = "very_high")]
    VeryHigh,
}

impl ConfidenceLevel {
    /// Numeric anchor used for aggregation arithmetic.
    pub fn anchor(&self) -> f64 {
        match self {
            ConfidenceLevel::Low => 0.25,
            ConfidenceLevel::Medium => 0.5,
            ConfidenceLevel::High => 0.75,
            ConfidenceLevel::VeryHigh => 0.95,
        }
    }

    /// Re-quantise a score to the nearest category (thresholds at anchor midpoints).
    pub fn from_score(score: f64) -> Self {
        if score.is_nan() || score < 0.375 {
            ConfidenceLevel::Low
        } else if score < 0.625 {
            ConfidenceLevel::Medium
        } else if score < 0.85 {
            ConfidenceLevel::High
        } else {
            ConfidenceLevel::VeryHigh
        }
    }

    /// Mean of several levels, re-quantised. `None` for an empty input.
    pub fn mean<I: IntoIterator<Item = ConfidenceLevel>>(levels: I) -> Option<f64> {
        let (sum, count) = levels
            .into_iter()
            .fold((0.0, 0usize), |(sum, n), level| (sum + level.anchor(), n + 1));
        (count > 0).then(|| sum / count as f64)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
            ConfidenceLevel::VeryHigh => "very-high",
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConfidenceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "low" => Ok(ConfidenceLevel::Low),
            "medium" => Ok(ConfidenceLevel::Medium),
            "high" => Ok(ConfidenceLevel::High),
            "very-high" => Ok(ConfidenceLevel::VeryHigh),
            _ => Err(format!("Unknown confidence level: {}", s)),
        }
    }
}
