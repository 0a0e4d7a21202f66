use std::collections::BTreeMap;
use tracing::debug;

use crate::analyzers::sanitize::sanitized_mean;
use crate::analyzers::types::GroupSummary;
use crate::analyzers::utility::{finite, max, mean, median, min, stddev};
use crate::record::Record;

/// Summarizes a sample that has already been stripped of missing values.
pub fn summarize(values: &[f64], cv_threshold: f64) -> GroupSummary {
    let values = finite(values.iter().copied());
    let m = mean(&values);

    GroupSummary {
        count: values.len(),
        mean: m,
        median: median(&values),
        std_dev: m.and_then(|m| stddev(&values, m)),
        min: min(&values),
        max: max(&values),
        sanitized_mean: sanitized_mean(values.iter().copied(), cv_threshold).ok(),
    }
}

/// Groups `records` by `key` and summarizes `value` within each group.
///
/// Records without a key belong to no group. Records with a key but no
/// value still create the group, so a group can come back with a zero
/// count and no statistics.
pub fn group_summary<'r, K, V>(
    records: impl IntoIterator<Item = &'r Record>,
    key: K,
    value: V,
    cv_threshold: f64,
) -> BTreeMap<String, GroupSummary>
where
    K: Fn(&'r Record) -> Option<&'r str>,
    V: Fn(&'r Record) -> Option<f64>,
{
    let mut series: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for record in records {
        let Some(group) = key(record) else {
            continue;
        };
        let entry = series.entry(group.to_string()).or_default();
        if let Some(v) = value(record) {
            entry.push(v);
        }
    }

    series
        .into_iter()
        .map(|(group, values)| {
            let summary = summarize(&values, cv_threshold);
            debug!(
                group = %group,
                count = summary.count,
                sanitized_mean = ?summary.sanitized_mean,
                "Group summarized"
            );
            (group, summary)
        })
        .collect()
}

/// Per unit-of-measure summary of the awarded unit price.
pub fn summarize_by_unit(records: &[Record], cv_threshold: f64) -> BTreeMap<String, GroupSummary> {
    group_summary(records, Record::unit, Record::price, cv_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DELTA: f64 = 1e-9;

    fn record(unit: Option<&str>, price: serde_json::Value) -> Record {
        let mut v = json!({ "valorUnitarioResultado": price });
        if let Some(u) = unit {
            v["unidadeMedida"] = json!(u);
        }
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_groups_by_exact_unit() {
        let records = vec![
            record(Some("UN"), json!(10)),
            record(Some("UN"), json!(20)),
            record(Some("un"), json!(5)),
            record(Some("CX"), json!(100)),
        ];

        let summaries = summarize_by_unit(&records, 25.0);

        let keys: Vec<&str> = summaries.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["CX", "UN", "un"]);
        assert_eq!(summaries["UN"].count, 2);
        assert_eq!(summaries["un"].count, 1);
    }

    #[test]
    fn test_statistics_of_a_group() {
        let records = vec![
            record(Some("UN"), json!(10)),
            record(Some("UN"), json!(10)),
            record(Some("UN"), json!("10")),
            record(Some("UN"), json!(100)),
            record(Some("UN"), json!("abc")),
        ];

        let s = &summarize_by_unit(&records, 25.0)["UN"];

        assert_eq!(s.count, 4);
        assert!((s.mean.unwrap() - 32.5).abs() < DELTA);
        assert_eq!(s.median, Some(10.0));
        assert!((s.std_dev.unwrap() - 1518.75_f64.sqrt()).abs() < DELTA);
        assert_eq!(s.min, Some(10.0));
        assert_eq!(s.max, Some(100.0));
        assert!((s.sanitized_mean.unwrap() - 10.0).abs() < DELTA);
    }

    #[test]
    fn test_group_without_values_is_kept_empty() {
        let records = vec![
            record(Some("KG"), json!(null)),
            record(Some("UN"), json!(3)),
        ];

        let summaries = summarize_by_unit(&records, 25.0);

        assert_eq!(summaries["KG"], GroupSummary::default());
        assert_eq!(summaries["UN"].sanitized_mean, Some(3.0));
    }

    #[test]
    fn test_records_without_unit_are_skipped() {
        let records = vec![record(None, json!(3)), record(Some("UN"), json!(4))];
        let summaries = summarize_by_unit(&records, 25.0);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries["UN"].count, 1);
    }

    #[test]
    fn test_custom_key_and_value() {
        let records: Vec<Record> = vec![
            serde_json::from_value(json!({ "uf": "SP", "quantidade": 2 })).unwrap(),
            serde_json::from_value(json!({ "uf": "SP", "quantidade": 4 })).unwrap(),
        ];

        let summaries = group_summary(
            &records,
            |r| r.attributes.get("uf").and_then(|v| v.as_str()),
            |r| r.attributes.get("quantidade").and_then(crate::record::coerce_f64),
            25.0,
        );

        assert_eq!(summaries["SP"].mean, Some(3.0));
    }
}
