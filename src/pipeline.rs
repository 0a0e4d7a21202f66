//! End-to-end run: fetch the last year of items, apply the value range,
//! summarize per unit and derive reference prices.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::info;

use crate::analyzers::{GroupSummary, ReferencePrice, derive, summarize_by_unit};
use crate::config::{DateWindow, ResearchConfig};
use crate::fetch::{HttpClient, PagedFetcher, StopReason};
use crate::filters::{FilterSet, ValueRange};
use crate::record::Record;

/// Output of one research run. Owned by the caller; nothing is shared
/// between runs.
#[derive(Debug)]
pub struct ResearchReport {
    pub window: DateWindow,
    /// Human-readable filter table for the report (includes the catalog
    /// item and value range, which are not plain query filters).
    pub effective_filters: Vec<(String, String)>,
    pub fetched: usize,
    pub pages_requested: u32,
    pub stop: StopReason,
    pub records: Vec<Record>,
    pub summaries: BTreeMap<String, GroupSummary>,
    pub prices: BTreeMap<String, ReferencePrice>,
}

/// Aggregation half of the pipeline, for records already in hand.
#[derive(Debug)]
pub struct Analysis {
    pub records: Vec<Record>,
    pub summaries: BTreeMap<String, GroupSummary>,
    pub prices: BTreeMap<String, ReferencePrice>,
}

pub fn analyze(records: Vec<Record>, range: &ValueRange, cv_threshold: f64) -> Analysis {
    let records = range.apply(records);
    let summaries = summarize_by_unit(&records, cv_threshold);
    let prices = derive(&summaries);

    info!(
        records = records.len(),
        units = summaries.len(),
        priced_units = prices.len(),
        "Aggregation complete"
    );

    Analysis {
        records,
        summaries,
        prices,
    }
}

/// Runs the full pipeline for `config`, with the window ending on `today`.
pub async fn run<C: HttpClient>(
    client: &C,
    config: &ResearchConfig,
    today: NaiveDate,
) -> ResearchReport {
    let window = DateWindow::last_year(today);
    let filters = FilterSet::from_options(&config.filters);

    let outcome = PagedFetcher::new(client, config.endpoint.as_str(), config.page_size)
        .with_timeout(config.request_timeout)
        .with_max_pages(config.max_pages)
        .fetch(&filters, &window, config.catalog_item)
        .await;

    let fetched = outcome.records.len();
    let Analysis {
        records,
        summaries,
        prices,
    } = analyze(outcome.records, &config.value_range, config.cv_threshold);

    ResearchReport {
        window,
        effective_filters: effective_filters(config, &filters),
        fetched,
        pages_requested: outcome.pages_requested,
        stop: outcome.stop,
        records,
        summaries,
        prices,
    }
}

/// Filter table shown in the report: catalog item first, then every query
/// filter, then the value bounds.
pub fn effective_filters(config: &ResearchConfig, filters: &FilterSet) -> Vec<(String, String)> {
    let mut rows = Vec::new();
    if let Some(code) = config.catalog_item {
        rows.push(("codItemCatalogo".to_string(), code.to_string()));
    }
    rows.extend(filters.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    if let Some(min) = config.value_range.min {
        rows.push(("valorMinimo".to_string(), format!("R$ {min}")));
    }
    if let Some(max) = config.value_range.max {
        rows.push(("valorMaximo".to_string(), format!("R$ {max}")));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterOptions;
    use serde_json::json;

    fn record(unit: &str, price: f64) -> Record {
        serde_json::from_value(json!({ "unidadeMedida": unit, "valorUnitarioResultado": price }))
            .unwrap()
    }

    #[test]
    fn test_analyze_applies_range_before_statistics() {
        let records = vec![
            record("UN", 10.0),
            record("UN", 10.0),
            record("UN", 10.0),
            record("UN", 100.0),
            record("CX", 1.0),
        ];

        let analysis = analyze(records, &ValueRange::new(Some(5.0), None), 25.0);

        assert_eq!(analysis.records.len(), 4);
        assert!(!analysis.summaries.contains_key("CX"));
        assert_eq!(analysis.prices["UN"].suggested, 10.0);
    }

    #[test]
    fn test_effective_filters_order() {
        let config = ResearchConfig {
            catalog_item: Some(42),
            filters: FilterOptions {
                has_result: Some(true),
                ..Default::default()
            },
            value_range: ValueRange::new(Some(1.5), Some(10.0)),
            ..Default::default()
        };
        let filters = FilterSet::from_options(&config.filters);

        let rows = effective_filters(&config, &filters);

        assert_eq!(
            rows,
            vec![
                ("codItemCatalogo".to_string(), "42".to_string()),
                ("temResultado".to_string(), "true".to_string()),
                ("valorMinimo".to_string(), "R$ 1.5".to_string()),
                ("valorMaximo".to_string(), "R$ 10".to_string()),
            ]
        );
    }
}
