use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rule for combining per-subproblem failure estimates into a single scene
/// estimate when a multi-agent problem is decomposed pairwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombinationStyle {
    /// Arithmetic mean of the subproblem estimates.
    #[default]
    Mean,
    /// Most optimistic subproblem estimate.
    Min,
    /// Most pessimistic subproblem estimate.
    Max,
}

impl CombinationStyle {
    /// Label for logging.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

impl FromStr for CombinationStyle {
    type Err = CombineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "mean" => Ok(Self::Mean),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            other => Err(CombineError::InvalidCombinationStyle(other.to_string())),
        }
    }
}

/// Combines subproblem estimates under the given style. Returns `None` for
/// an empty slice.
#[must_use]
pub fn combine(style: CombinationStyle, values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let combined = match style {
        CombinationStyle::Mean => values.iter().sum::<f64>() / values.len() as f64,
        CombinationStyle::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        CombinationStyle::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    };
    Some(combined)
}

/// Errors raised while resolving a combination style.
#[derive(Debug, Error)]
pub enum CombineError {
    /// Unrecognized configuration value, reported verbatim.
    #[error("unrecognized combination style: {0}")]
    InvalidCombinationStyle(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_styles() {
        assert_eq!("mean".parse::<CombinationStyle>().unwrap(), CombinationStyle::Mean);
        assert_eq!("min".parse::<CombinationStyle>().unwrap(), CombinationStyle::Min);
        assert_eq!("max".parse::<CombinationStyle>().unwrap(), CombinationStyle::Max);
    }

    #[test]
    fn rejects_unknown_style_with_offending_value() {
        let err = "median".parse::<CombinationStyle>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unrecognized combination style: median"
        );
    }

    #[test]
    fn combines_estimates() {
        let values = [0.1, 0.4, 0.7];
        let mean = combine(CombinationStyle::Mean, &values).unwrap();
        assert!((mean - 0.4).abs() < 1e-12, "{mean}");
        assert_eq!(combine(CombinationStyle::Min, &values), Some(0.1));
        assert_eq!(combine(CombinationStyle::Max, &values), Some(0.7));
    }

    #[test]
    fn empty_input_combines_to_none() {
        assert_eq!(combine(CombinationStyle::Mean, &[]), None);
    }
}
