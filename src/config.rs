//! Run configuration. Built once (from CLI args and environment) and passed
//! by reference into the pipeline; nothing here is mutated during a run.

use chrono::{Days, NaiveDate};
use std::time::Duration;

use crate::filters::{FilterOptions, ValueRange};

pub const DEFAULT_ENDPOINT: &str = "https://dadosabertos.compras.gov.br/modulo-contratacoes/2_consultarItensContratacoes_PNCP_14133";
pub const DEFAULT_PAGE_SIZE: u32 = 500;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const WINDOW_DAYS: u64 = 365;
pub const DEFAULT_CV_THRESHOLD: f64 = 25.0;

/// Inclusive date interval sent as `dataInclusaoPncpInicial`/`Final`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// `[today - 365 days, today]`.
    pub fn last_year(today: NaiveDate) -> Self {
        let start = today.checked_sub_days(Days::new(WINDOW_DAYS)).unwrap_or(today);
        Self { start, end: today }
    }

    pub fn start_param(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResearchConfig {
    pub endpoint: String,
    pub catalog_item: Option<u64>,
    pub filters: FilterOptions,
    pub value_range: ValueRange,
    pub page_size: u32,
    pub request_timeout: Duration,
    /// Optional ceiling on pages requested. `None` keeps fetching until the
    /// server signals the end.
    pub max_pages: Option<u32>,
    pub cv_threshold: f64,
    pub output_base: Option<String>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            catalog_item: None,
            filters: FilterOptions::default(),
            value_range: ValueRange::default(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: DEFAULT_TIMEOUT,
            max_pages: None,
            cv_threshold: DEFAULT_CV_THRESHOLD,
            output_base: None,
        }
    }
}

impl ResearchConfig {
    /// Base name for exported files, either the configured one or
    /// `pncp_itens_param_<item>_<start>_a_<end>`.
    pub fn output_base_name(&self, window: &DateWindow) -> String {
        if let Some(base) = self.output_base.as_deref().filter(|b| !b.is_empty()) {
            return base.to_string();
        }
        let item = self
            .catalog_item
            .map(|c| c.to_string())
            .unwrap_or_else(|| "sem_item".to_string());
        format!(
            "pncp_itens_param_{}_{}_a_{}",
            item,
            window.start_param(),
            window.end_param()
        )
    }
}
