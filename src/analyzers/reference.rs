use std::collections::BTreeMap;

use crate::analyzers::types::{GroupSummary, PriceBasis, ReferencePrice};

/// Picks the suggested price for a group: sanitized mean, then mean, then
/// median.
pub fn suggested_price(summary: &GroupSummary) -> Option<(f64, PriceBasis)> {
    summary
        .sanitized_mean
        .map(|p| (p, PriceBasis::SanitizedMean))
        .or_else(|| summary.mean.map(|p| (p, PriceBasis::Mean)))
        .or_else(|| summary.median.map(|p| (p, PriceBasis::Median)))
}

/// Reference price for a single group. Bounds sit one standard deviation
/// either side of the suggestion, clipped at zero; a missing deviation
/// collapses the band onto the suggestion.
pub fn reference_price(summary: &GroupSummary) -> Option<ReferencePrice> {
    let (suggested, basis) = suggested_price(summary)?;
    let sd = summary.std_dev.unwrap_or(0.0);

    Some(ReferencePrice {
        suggested,
        lower: (suggested - sd).max(0.0),
        upper: (suggested + sd).max(0.0),
        basis,
    })
}

/// Reference prices keyed by unit, in lexicographic key order. Groups with
/// no usable statistic are left out.
pub fn derive(summaries: &BTreeMap<String, GroupSummary>) -> BTreeMap<String, ReferencePrice> {
    summaries
        .iter()
        .filter_map(|(unit, summary)| Some((unit.clone(), reference_price(summary)?)))
        .collect()
}
