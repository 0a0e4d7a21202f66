//! Sequential page walker over the items endpoint.

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::client::HttpClient;
use crate::config::DateWindow;
use crate::error::FetchError;
use crate::filters::FilterSet;
use crate::record::{Record, lenient_i64};

const SNIPPET_LEN: usize = 500;

/// One page of the items endpoint.
#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    resultado: Option<Vec<Record>>,
    #[serde(rename = "totalPaginas", default, deserialize_with = "lenient_i64")]
    total_pages: Option<i64>,
    #[serde(rename = "paginasRestantes", default, deserialize_with = "lenient_i64")]
    pages_remaining: Option<i64>,
}

/// Why pagination ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// `paginasRestantes` was 0 or missing.
    NoPagesRemaining,
    /// The current page reached `totalPaginas`.
    TotalPagesReached,
    /// A well-formed page came back with no records.
    EmptyPage,
    /// The configured page ceiling was hit.
    PageLimit,
    /// A page failed; earlier pages are kept.
    Fault(FetchError),
}

impl StopReason {
    pub fn is_fault(&self) -> bool {
        matches!(self, StopReason::Fault(_))
    }
}

/// Everything collected by one [`PagedFetcher::fetch`] call.
#[derive(Debug)]
pub struct FetchOutcome {
    pub records: Vec<Record>,
    /// Number of requests sent, including a failing one.
    pub pages_requested: u32,
    pub stop: StopReason,
}

pub struct PagedFetcher<'a, C> {
    client: &'a C,
    endpoint: String,
    page_size: u32,
    timeout: Duration,
    max_pages: Option<u32>,
}

impl<'a, C: HttpClient> PagedFetcher<'a, C> {
    pub fn new(client: &'a C, endpoint: impl Into<String>, page_size: u32) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            page_size,
            timeout: crate::config::DEFAULT_TIMEOUT,
            max_pages: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Query pairs for `page`, in the order they are sent.
    pub fn page_query(
        &self,
        page: u32,
        filters: &FilterSet,
        window: &DateWindow,
        catalog_item: Option<u64>,
    ) -> Vec<(String, String)> {
        let mut query = vec![
            ("pagina".to_string(), page.to_string()),
            ("tamanhoPagina".to_string(), self.page_size.to_string()),
            ("dataInclusaoPncpInicial".to_string(), window.start_param()),
            ("dataInclusaoPncpFinal".to_string(), window.end_param()),
        ];
        if let Some(code) = catalog_item {
            query.push(("codItemCatalogo".to_string(), code.to_string()));
        }
        query.extend(filters.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        query
    }

    /// Walks pages 1, 2, ... until the server signals the end or a page
    /// fails. Faults never surface as errors: the outcome carries the
    /// records from every page before the failing one.
    #[tracing::instrument(
        skip(self, filters),
        fields(endpoint = %self.endpoint, start = %window.start, end = %window.end)
    )]
    pub async fn fetch(
        &self,
        filters: &FilterSet,
        window: &DateWindow,
        catalog_item: Option<u64>,
    ) -> FetchOutcome {
        info!(
            ?catalog_item,
            filters = filters.len(),
            page_size = self.page_size,
            "Starting item collection"
        );

        let mut records: Vec<Record> = Vec::new();
        let mut page: u32 = 1;

        let stop = loop {
            let query = self.page_query(page, filters, window, catalog_item);
            debug!(page, "Requesting page");

            let items = match self.fetch_page(page, &query).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(page, kind = e.kind(), error = %e, "Pagination stopped on fault");
                    break StopReason::Fault(e);
                }
            };

            let batch = items.resultado.unwrap_or_default();
            if batch.is_empty() {
                info!(page, "Page returned no records, ending pagination");
                break StopReason::EmptyPage;
            }

            let page_records = batch.len();
            records.extend(batch);
            info!(page, page_records, total = records.len(), "Page fetched");

            if matches!(items.pages_remaining, None | Some(0)) {
                break StopReason::NoPagesRemaining;
            }
            if items.total_pages.is_some_and(|total| i64::from(page) >= total) {
                break StopReason::TotalPagesReached;
            }
            if self.max_pages.is_some_and(|max| page >= max) {
                warn!(page, "Page ceiling reached with pages still remaining");
                break StopReason::PageLimit;
            }

            page += 1;
        };

        info!(total = records.len(), pages = page, stop = ?stop, "Item collection finished");

        FetchOutcome {
            records,
            pages_requested: page,
            stop,
        }
    }

    async fn fetch_page(&self, page: u32, query: &[(String, String)]) -> Result<Page, FetchError> {
        let resp = self
            .client
            .get(&self.endpoint, query, self.timeout)
            .await
            .map_err(|e| FetchError::ConnectionFault {
                page,
                reason: format!("{e:#}"),
            })?;

        if !resp.is_success() {
            return Err(FetchError::UnexpectedStatus {
                page,
                status: resp.status,
                snippet: snippet(&resp.body),
            });
        }

        serde_json::from_str(&resp.body).map_err(|e| FetchError::MalformedResponse {
            page,
            reason: e.to_string(),
        })
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(SNIPPET_LEN).collect()
}
