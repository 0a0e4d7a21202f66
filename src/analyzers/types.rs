//! Data types produced by the aggregation pipeline.

use serde::Serialize;

/// Descriptive statistics of the awarded unit price for one unit of measure.
///
/// `count` is the number of valid numeric observations. When it is zero
/// every statistic is `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub sanitized_mean: Option<f64>,
}

/// Suggested reference price for one unit of measure and its one-sigma band.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePrice {
    pub suggested: f64,
    pub lower: f64,
    pub upper: f64,
    pub basis: PriceBasis,
}

/// Which statistic the suggested price was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBasis {
    SanitizedMean,
    Mean,
    Median,
}

impl PriceBasis {
    pub fn label(self) -> &'static str {
        match self {
            PriceBasis::SanitizedMean => "sanitized mean",
            PriceBasis::Mean => "mean",
            PriceBasis::Median => "median",
        }
    }
}
