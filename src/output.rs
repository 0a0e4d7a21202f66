//! Tabular exports of a research run.
//!
//! Writes the consolidated records, the per-unit summary and the reference
//! price table as CSV files, optionally gzip-compressed.

use anyhow::Result;
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::analyzers::{GroupSummary, PriceBasis, ReferencePrice};
use crate::record::Record;

/// Record columns that lead the records table, in this order, when present.
pub const PRIORITY_COLUMNS: &[&str] = &[
    "idContratacaoPNCP",
    "idCompra",
    "idCompraItem",
    "orgaoEntidadeCnpj",
    "unidadeOrgaoCodigoUnidade",
    "descricaoResumida",
    "descricaodetalhada",
    "materialOuServicoNome",
    "codigoClasse",
    "codigoGrupo",
    "codItemCatalogo",
    "unidadeMedida",
    "quantidade",
    "valorUnitarioEstimado",
    "valorTotal",
    "quantidadeResultado",
    "valorUnitarioResultado",
    "valorTotalResultado",
    "situacaoCompraItemNome",
    "nomeFornecedor",
    "dataInclusaoPncp",
    "dataAtualizacaoPncp",
    "dataResultado",
    "codigoNCM",
    "descricaoNCM",
];

/// One row of the per-unit summary table.
#[derive(Debug, Serialize)]
pub struct SummaryRow<'a> {
    #[serde(rename = "unidadeMedida")]
    pub unit: &'a str,
    pub resultado_qtde: usize,
    pub resultado_media: Option<f64>,
    pub resultado_mediana: Option<f64>,
    pub resultado_desvio_padrao: Option<f64>,
    pub resultado_minimo: Option<f64>,
    pub resultado_maximo: Option<f64>,
    pub media_sanada: Option<f64>,
    pub limite_inferior_intervalo: Option<f64>,
    pub limite_superior_intervalo: Option<f64>,
}

/// One row of the reference price table.
#[derive(Debug, Serialize)]
pub struct PriceRow<'a> {
    #[serde(rename = "unidadeMedida")]
    pub unit: &'a str,
    pub media: Option<f64>,
    pub mediana: Option<f64>,
    pub media_sanada: Option<f64>,
    pub preco_referencia: f64,
    pub limite_inferior_intervalo: f64,
    pub limite_superior_intervalo: f64,
    pub base_preco_referencia: PriceBasis,
}

/// Summary rows in unit order, joined with the band of each priced unit.
pub fn summary_rows<'a>(
    summaries: &'a BTreeMap<String, GroupSummary>,
    prices: &'a BTreeMap<String, ReferencePrice>,
) -> Vec<SummaryRow<'a>> {
    summaries
        .iter()
        .map(|(unit, s)| {
            let price = prices.get(unit);
            SummaryRow {
                unit,
                resultado_qtde: s.count,
                resultado_media: s.mean,
                resultado_mediana: s.median,
                resultado_desvio_padrao: s.std_dev,
                resultado_minimo: s.min,
                resultado_maximo: s.max,
                media_sanada: s.sanitized_mean,
                limite_inferior_intervalo: price.map(|p| p.lower),
                limite_superior_intervalo: price.map(|p| p.upper),
            }
        })
        .collect()
}

/// Reference price rows in unit order.
pub fn price_rows<'a>(
    summaries: &'a BTreeMap<String, GroupSummary>,
    prices: &'a BTreeMap<String, ReferencePrice>,
) -> Vec<PriceRow<'a>> {
    prices
        .iter()
        .map(|(unit, p)| {
            let s = summaries.get(unit);
            PriceRow {
                unit,
                media: s.and_then(|s| s.mean),
                mediana: s.and_then(|s| s.median),
                media_sanada: s.and_then(|s| s.sanitized_mean),
                preco_referencia: p.suggested,
                limite_inferior_intervalo: p.lower,
                limite_superior_intervalo: p.upper,
                base_preco_referencia: p.basis,
            }
        })
        .collect()
}

/// Columns of the records table: priority columns that occur in any record,
/// then the remaining columns in first-seen order.
pub fn record_columns(records: &[Record]) -> Vec<String> {
    let mut seen: Vec<&str> = Vec::new();
    for record in records {
        for name in record.field_names() {
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
    }

    let mut columns: Vec<String> = PRIORITY_COLUMNS
        .iter()
        .filter(|c| seen.contains(*c))
        .map(|c| c.to_string())
        .collect();
    columns.extend(
        seen.into_iter()
            .filter(|c| !PRIORITY_COLUMNS.iter().any(|p| p == c))
            .map(str::to_string),
    );
    columns
}

fn cell(value: Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    }
}

/// Writes the records table and hands the underlying writer back.
pub fn write_records<W: Write>(writer: W, records: &[Record]) -> Result<W> {
    let columns = record_columns(records);
    let mut writer = WriterBuilder::new().from_writer(writer);

    if !columns.is_empty() {
        writer.write_record(&columns)?;
    }
    for record in records {
        writer.write_record(columns.iter().map(|c| cell(record.field(c))))?;
    }
    Ok(writer.into_inner().map_err(|e| e.into_error())?)
}

/// Writes serializable rows with a header and hands the underlying writer back.
pub fn write_rows<W: Write, T: Serialize>(writer: W, rows: &[T]) -> Result<W> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    Ok(writer.into_inner().map_err(|e| e.into_error())?)
}

/// Paths of the files produced by [`write_tables`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub records: PathBuf,
    pub summary: PathBuf,
    pub prices: PathBuf,
}

impl ExportPaths {
    pub fn new(dir: &Path, base: &str, gzip: bool) -> Self {
        let ext = if gzip { "csv.gz" } else { "csv" };
        Self {
            records: dir.join(format!("{base}_dados.{ext}")),
            summary: dir.join(format!("{base}_resumo_unidade.{ext}")),
            prices: dir.join(format!("{base}_preco_referencia.{ext}")),
        }
    }
}

/// Output file, plain or gzip-compressed.
enum Sink {
    Plain(File),
    Gzip(GzEncoder<File>),
}

impl Sink {
    fn create(path: &Path, gzip: bool) -> Result<Self> {
        let file = File::create(path)?;
        Ok(if gzip {
            Sink::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            Sink::Plain(file)
        })
    }

    /// Flushes the file, writing the gzip trailer when compressed.
    fn finish(self) -> Result<()> {
        match self {
            Sink::Plain(mut file) => file.flush()?,
            Sink::Gzip(encoder) => encoder.finish()?.flush()?,
        }
        Ok(())
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(file) => file.write(buf),
            Sink::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(file) => file.flush(),
            Sink::Gzip(encoder) => encoder.flush(),
        }
    }
}

/// Writes the three tables under `dir`. Files are written even when a table
/// has no rows.
pub fn write_tables(
    dir: &Path,
    base: &str,
    records: &[Record],
    summaries: &BTreeMap<String, GroupSummary>,
    prices: &BTreeMap<String, ReferencePrice>,
    gzip: bool,
) -> Result<ExportPaths> {
    std::fs::create_dir_all(dir)?;
    let paths = ExportPaths::new(dir, base, gzip);

    debug!(path = %paths.records.display(), rows = records.len(), "Writing records table");
    write_records(Sink::create(&paths.records, gzip)?, records)?.finish()?;

    let summary = summary_rows(summaries, prices);
    debug!(path = %paths.summary.display(), rows = summary.len(), "Writing summary table");
    write_rows(Sink::create(&paths.summary, gzip)?, &summary)?.finish()?;

    let price = price_rows(summaries, prices);
    debug!(path = %paths.prices.display(), rows = price.len(), "Writing reference price table");
    write_rows(Sink::create(&paths.prices, gzip)?, &price)?.finish()?;

    info!(
        records = %paths.records.display(),
        summary = %paths.summary.display(),
        prices = %paths.prices.display(),
        gzip,
        "Tables written"
    );
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::{derive, summarize_by_unit};
    use flate2::read::GzDecoder;
    use serde_json::json;
    use std::env;
    use std::fs;
    use std::io::Read;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir); // clean up any prior run
        dir
    }

    fn records() -> Vec<Record> {
        vec![
            serde_json::from_value(json!({
                "extra": "x",
                "valorUnitarioResultado": 10,
                "unidadeMedida": "UN",
                "idCompraItem": "A1"
            }))
            .unwrap(),
            serde_json::from_value(json!({
                "unidadeMedida": "UN",
                "valorUnitarioResultado": null,
                "nomeFornecedor": "ACME, Ltda",
                "outra": { "k": 1 }
            }))
            .unwrap(),
        ]
    }

    #[test]
    fn test_record_columns_priority_then_first_seen() {
        let columns = record_columns(&records());
        assert_eq!(
            columns,
            vec![
                "idCompraItem",
                "unidadeMedida",
                "valorUnitarioResultado",
                "nomeFornecedor",
                "extra",
                "outra"
            ]
        );
    }

    #[test]
    fn test_write_records_csv() {
        let mut buf = Vec::new();
        write_records(&mut buf, &records()).unwrap();
        let content = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = content.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "idCompraItem,unidadeMedida,valorUnitarioResultado,nomeFornecedor,extra,outra"
        );
        assert_eq!(lines[1], "A1,UN,10,,x,");
        assert_eq!(lines[2], ",UN,,\"ACME, Ltda\",,\"{\"\"k\"\":1}\"");
    }

    #[test]
    fn test_write_records_empty() {
        let mut buf = Vec::new();
        write_records(&mut buf, &[]).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_summary_and_price_rows() {
        let records = records();
        let summaries = summarize_by_unit(&records, 25.0);
        let prices = derive(&summaries);

        let mut buf = Vec::new();
        write_rows(&mut buf, &summary_rows(&summaries, &prices)).unwrap();
        let content = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(
            lines[0],
            "unidadeMedida,resultado_qtde,resultado_media,resultado_mediana,resultado_desvio_padrao,\
             resultado_minimo,resultado_maximo,media_sanada,limite_inferior_intervalo,limite_superior_intervalo"
        );
        assert_eq!(lines[1], "UN,1,10.0,10.0,0.0,10.0,10.0,10.0,10.0,10.0");

        let rows = price_rows(&summaries, &prices);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].preco_referencia, 10.0);

        let mut buf = Vec::new();
        write_rows(&mut buf, &rows).unwrap();
        let content = String::from_utf8(buf).unwrap();
        assert!(content.lines().next().unwrap().ends_with(",base_preco_referencia"));
        assert!(content.lines().nth(1).unwrap().ends_with(",sanitized_mean"));
    }

    #[test]
    fn test_write_tables_always_creates_files() {
        let dir = temp_dir("pncp_price_research_test_empty");
        let paths = write_tables(&dir, "run", &[], &BTreeMap::new(), &BTreeMap::new(), false)
            .unwrap();

        assert!(paths.records.exists());
        assert!(paths.summary.exists());
        assert!(paths.prices.exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_write_tables_gzip() {
        let dir = temp_dir("pncp_price_research_test_gzip");
        let records = records();
        let summaries = summarize_by_unit(&records, 25.0);
        let prices = derive(&summaries);

        let paths = write_tables(&dir, "run", &records, &summaries, &prices, true).unwrap();
        assert!(paths.records.to_string_lossy().ends_with("run_dados.csv.gz"));

        let decode = |path: &PathBuf| {
            let mut decoded = String::new();
            GzDecoder::new(File::open(path).unwrap())
                .read_to_string(&mut decoded)
                .unwrap();
            decoded
        };

        let dados = decode(&paths.records);
        assert!(dados.starts_with("idCompraItem,unidadeMedida,valorUnitarioResultado"));
        assert_eq!(dados.lines().count(), 3);

        let summary = decode(&paths.summary);
        assert!(summary.starts_with("unidadeMedida,resultado_qtde"));
        assert_eq!(summary.lines().count(), 2);

        let prices = decode(&paths.prices);
        assert!(prices.starts_with("unidadeMedida,media,mediana,media_sanada,preco_referencia"));
        assert_eq!(prices.lines().count(), 2);

        fs::remove_dir_all(&dir).unwrap();
    }
}
