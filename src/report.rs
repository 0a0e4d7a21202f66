//! HTML technical note describing a research run.

use anyhow::Result;
use chrono::NaiveDate;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

use crate::analyzers::utility::{max, mean, median, min, stddev};
use crate::output::price_rows;
use crate::pipeline::ResearchReport;

const STYLE: &str = "body { font-family: Arial, sans-serif; margin: 20px; }
h1, h2 { color: #333; }
table { border-collapse: collapse; width: 100%; margin-bottom: 20px; }
th, td { border: 1px solid #ccc; padding: 8px; text-align: left; }
th { background-color: #f0f0f0; }
.section { margin-bottom: 30px; }
small { color: #555; }";

const METHODOLOGY: &str = "<ol>
<li>For each unit of measure, only valid numeric values of <code>valorUnitarioResultado</code> are considered.</li>
<li>The mean (M) and population standard deviation (SD) of the sample are computed.</li>
<li>The coefficient of variation is CV = SD / M * 100. If CV is at or below 25%, the plain mean is the sanitized mean.</li>
<li>Otherwise values below M - SD or above M + SD are discarded as outliers.</li>
<li>The procedure repeats while values are being discarded and CV stays above the limit.</li>
<li>The mean of the remaining values is the <strong>sanitized mean</strong>.</li>
</ol>";

/// Escapes text for HTML element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn fmt4(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}

/// Global descriptive statistics of every priced record, in display order.
pub fn global_statistics(report: &ResearchReport) -> Vec<(&'static str, f64)> {
    let values: Vec<f64> = report.records.iter().filter_map(|r| r.price()).collect();
    let Some(m) = mean(&values) else {
        return Vec::new();
    };

    [
        ("min", min(&values)),
        ("max", max(&values)),
        ("mean", Some(m)),
        ("median", median(&values)),
        ("std", stddev(&values, m)),
    ]
    .into_iter()
    .filter_map(|(k, v)| Some((k, v?)))
    .collect()
}

/// Renders the technical note. `generated_on` is printed in the header.
pub fn render_html(report: &ResearchReport, generated_on: NaiveDate) -> String {
    let mut html = String::new();

    let units = report
        .records
        .iter()
        .filter_map(|r| r.unit())
        .collect::<std::collections::BTreeSet<_>>()
        .len();

    let _ = write!(
        html,
        "<!DOCTYPE html>
<html lang=\"en\">
<head>
<meta charset=\"UTF-8\">
<title>Price Research Report - PNCP</title>
<style>
{STYLE}
</style>
</head>
<body>

<h1>Price Research Report - PNCP (Law 14.133/2021)</h1>
<p><small>Generated on {}</small></p>

<div class=\"section\">
<h2>1. Period and filters</h2>
<ul>
  <li><strong>Start date:</strong> {}</li>
  <li><strong>End date:</strong> {}</li>
</ul>
<table>
  <thead><tr><th>Parameter</th><th>Value</th></tr></thead>
  <tbody>
",
        generated_on.format("%d/%m/%Y"),
        report.window.start_param(),
        report.window.end_param(),
    );

    for (key, value) in &report.effective_filters {
        let _ = writeln!(html, "    <tr><td>{}</td><td>{}</td></tr>", escape(key), escape(value));
    }

    let _ = write!(
        html,
        "  </tbody>
</table>
</div>

<div class=\"section\">
<h2>2. Sample statistics</h2>
<p>The consolidated sample contains <strong>{}</strong> records and <strong>{}</strong> distinct unit(s) of measure.</p>
",
        report.records.len(),
        units,
    );

    let stats = global_statistics(report);
    if stats.is_empty() {
        html.push_str("<p>No descriptive statistics could be computed for <code>valorUnitarioResultado</code>.</p>\n");
    } else {
        html.push_str("<table>\n  <thead><tr><th>Measure</th><th>Value</th></tr></thead>\n  <tbody>\n");
        for (name, value) in stats {
            let _ = writeln!(html, "    <tr><td>{name}</td><td>{value:.4}</td></tr>");
        }
        html.push_str("  </tbody>\n</table>\n");
    }

    let _ = write!(
        html,
        "</div>

<div class=\"section\">
<h2>3. Methodology</h2>
{METHODOLOGY}
<p>The sanitized mean and the standard deviation of each unit define a reference band (lower and upper limit, never below zero).</p>
</div>

<div class=\"section\">
<h2>4. Reference price by unit of measure</h2>
"
    );

    let rows = price_rows(&report.summaries, &report.prices);
    if rows.is_empty() {
        html.push_str("<p>No consolidated data available for the reference price table.</p>\n");
    } else {
        html.push_str(
            "<table>
  <thead>
    <tr>
      <th>Unit of measure</th>
      <th>Mean</th>
      <th>Median</th>
      <th>Sanitized mean</th>
      <th>Suggested reference price</th>
      <th>Lower limit</th>
      <th>Upper limit</th>
      <th>Basis</th>
    </tr>
  </thead>
  <tbody>
",
        );
        for row in rows {
            let _ = writeln!(
                html,
                "    <tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(row.unit),
                fmt4(row.media),
                fmt4(row.mediana),
                fmt4(row.media_sanada),
                fmt4(Some(row.preco_referencia)),
                fmt4(Some(row.limite_inferior_intervalo)),
                fmt4(Some(row.limite_superior_intervalo)),
                row.base_preco_referencia.label(),
            );
        }
        html.push_str("  </tbody>\n</table>\n");
    }

    html.push_str("</div>\n</body>\n</html>\n");
    html
}

pub fn write_html(path: &Path, report: &ResearchReport, generated_on: NaiveDate) -> Result<()> {
    std::fs::write(path, render_html(report, generated_on))?;
    info!(path = %path.display(), "HTML report written");
    Ok(())
}
