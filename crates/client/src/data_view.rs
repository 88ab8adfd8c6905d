//! Filter/pagination state machine for the merged-data view.
//!
//! [`QueryState`] is the synchronous core: every filter, page or refresh
//! operation bumps `request_epoch` and returns a [`Dispatch`] carrying the
//! epoch and the parameters to fetch with. [`QueryState::complete`] applies
//! a response only if its epoch is still the current one, so a slow
//! response for an older query can never overwrite a newer result.
//!
//! [`DataView`] drives a [`QueryState`] against a [`DataSource`]. The lock
//! is released while a fetch is in flight, so several fetches may overlap
//! and finish in any order.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use pomgmt_core::endpoints;
use pomgmt_core::error::ErrorKind;
use pomgmt_core::pagination::{visible_page_window, DEFAULT_WINDOW_SIZE};
use pomgmt_core::query::{FilterField, PageResult, QueryParameters};
use regex::Regex;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::http::{ApiClient, ApiError};

/// Suggested file name when the server does not provide one.
pub const DEFAULT_EXPORT_FILE_NAME: &str = "filtered_merged_po_data.xlsx";

/// Message shown when a page fails to load and the server gave no detail.
const LOAD_FAILED_MESSAGE: &str = "Failed to load data";

static CONTENT_DISPOSITION_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"filename\*?=(?:UTF-8'')?"?([^";]+)"?"#).expect("valid regex")
});

/// Spreadsheet bytes plus the name to save them under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// File name from a `Content-Disposition` header, if one is present.
pub fn export_file_name(content_disposition: Option<&str>) -> String {
    content_disposition
        .and_then(|header| CONTENT_DISPOSITION_FILENAME.captures(header))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_EXPORT_FILE_NAME.to_string())
}

// ---------------------------------------------------------------------------
// DataSource
// ---------------------------------------------------------------------------

/// Where pages and exports come from.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_page(&self, params: &QueryParameters) -> Result<PageResult, ApiError>;

    /// Export every row matching the filters of `params`; pagination is ignored.
    async fn export(&self, params: &QueryParameters) -> Result<ExportFile, ApiError>;
}

#[async_trait]
impl DataSource for ApiClient {
    async fn fetch_page(&self, params: &QueryParameters) -> Result<PageResult, ApiError> {
        self.get_json(endpoints::MERGED_DATA, params.to_query()).await
    }

    async fn export(&self, params: &QueryParameters) -> Result<ExportFile, ApiError> {
        let payload = self
            .get_binary(endpoints::MERGED_DATA_EXPORT, params.export_query())
            .await?;
        Ok(ExportFile {
            file_name: export_file_name(payload.content_disposition.as_deref()),
            bytes: payload.bytes,
        })
    }
}

// ---------------------------------------------------------------------------
// QueryState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewStatus {
    Idle,
    Loading,
    Error,
}

/// A fetch to perform, tagged with the epoch it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub epoch: u64,
    pub params: QueryParameters,
}

/// The last applied page together with the parameters that produced it.
#[derive(Debug, Clone)]
struct AppliedResult {
    params: QueryParameters,
    page: PageResult,
}

#[derive(Debug, Clone)]
pub struct QueryState {
    params: QueryParameters,
    last_result: Option<AppliedResult>,
    status: ViewStatus,
    error_message: Option<String>,
    error_kind: Option<ErrorKind>,
    request_epoch: u64,
}

impl QueryState {
    pub fn new(params: QueryParameters) -> Self {
        Self {
            params,
            last_result: None,
            status: ViewStatus::Idle,
            error_message: None,
            error_kind: None,
            request_epoch: 0,
        }
    }

    pub fn params(&self) -> &QueryParameters {
        &self.params
    }

    pub fn last_result(&self) -> Option<&PageResult> {
        self.last_result.as_ref().map(|applied| &applied.page)
    }

    pub fn status(&self) -> ViewStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn request_epoch(&self) -> u64 {
        self.request_epoch
    }

    /// Total pages for the current filters, if a result for them is applied.
    pub fn known_total_pages(&self) -> Option<u32> {
        self.last_result
            .as_ref()
            .filter(|applied| applied.params.filters() == self.params.filters())
            .map(|applied| applied.page.total_pages)
    }

    /// Change one filter; the page goes back to 1.
    pub fn set_filter(&mut self, field: FilterField, value: impl Into<String>) -> Dispatch {
        self.params.set_filter(field, value);
        self.dispatch()
    }

    /// Move to page `n`, clamped to the known page range.
    pub fn set_page(&mut self, page: u32) -> Dispatch {
        let total = self.known_total_pages();
        self.params.set_page(page, total);
        self.dispatch()
    }

    /// Fetch the current parameters again.
    pub fn refresh(&mut self) -> Dispatch {
        self.dispatch()
    }

    fn dispatch(&mut self) -> Dispatch {
        self.request_epoch += 1;
        self.status = ViewStatus::Loading;
        Dispatch {
            epoch: self.request_epoch,
            params: self.params.clone(),
        }
    }

    /// Apply the outcome of the fetch dispatched at `epoch`.
    ///
    /// Returns `false` and leaves the state untouched when `epoch` is not
    /// the current one. On an applied failure the previous page is kept
    /// only if it was produced by the current parameters.
    pub fn complete(&mut self, epoch: u64, outcome: Result<PageResult, ApiError>) -> bool {
        if epoch != self.request_epoch {
            return false;
        }
        match outcome {
            Ok(page) => {
                self.last_result = Some(AppliedResult {
                    params: self.params.clone(),
                    page,
                });
                self.status = ViewStatus::Idle;
                self.error_message = None;
                self.error_kind = None;
            }
            Err(err) => {
                if self
                    .last_result
                    .as_ref()
                    .is_some_and(|applied| applied.params != self.params)
                {
                    self.last_result = None;
                }
                self.status = ViewStatus::Error;
                self.error_message = Some(err.user_message(LOAD_FAILED_MESSAGE));
                self.error_kind = Some(err.kind());
            }
        }
        true
    }

    /// Render-ready copy of the state.
    pub fn snapshot(&self) -> ViewSnapshot {
        let total_pages = self.last_result().map_or(0, |page| page.total_pages);
        ViewSnapshot {
            params: self.params.clone(),
            result: self.last_result().cloned(),
            status: self.status,
            error_message: self.error_message.clone(),
            error_kind: self.error_kind,
            request_epoch: self.request_epoch,
            page_window: visible_page_window(self.params.page(), total_pages, DEFAULT_WINDOW_SIZE),
        }
    }
}

/// What the rendering layer sees.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub params: QueryParameters,
    pub result: Option<PageResult>,
    pub status: ViewStatus,
    pub error_message: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub request_epoch: u64,
    /// Page numbers for the pagination control.
    pub page_window: Vec<u32>,
}

// ---------------------------------------------------------------------------
// DataView
// ---------------------------------------------------------------------------

/// Async coordinator around a shared [`QueryState`].
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct DataView {
    source: Arc<dyn DataSource>,
    state: Arc<Mutex<QueryState>>,
}

impl DataView {
    pub fn new(source: Arc<dyn DataSource>, params: QueryParameters) -> Self {
        Self {
            source,
            state: Arc::new(Mutex::new(QueryState::new(params))),
        }
    }

    pub async fn snapshot(&self) -> ViewSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Initial load of the current parameters.
    pub async fn load(&self) -> ViewSnapshot {
        self.refresh().await
    }

    pub async fn set_filter(&self, field: FilterField, value: impl Into<String>) -> ViewSnapshot {
        let dispatch = self.state.lock().await.set_filter(field, value);
        self.run(dispatch).await
    }

    pub async fn set_page(&self, page: u32) -> ViewSnapshot {
        let dispatch = self.state.lock().await.set_page(page);
        self.run(dispatch).await
    }

    pub async fn refresh(&self) -> ViewSnapshot {
        let dispatch = self.state.lock().await.refresh();
        self.run(dispatch).await
    }

    /// Export rows matching the current filters. The view state is untouched.
    pub async fn export(&self) -> Result<ExportFile, ApiError> {
        let params = self.state.lock().await.params().clone();
        let result = self.source.export(&params).await;
        match &result {
            Ok(file) => tracing::info!(
                file_name = %file.file_name,
                bytes = file.bytes.len(),
                "Export downloaded",
            ),
            Err(e) => tracing::warn!(error = %e, "Export failed"),
        }
        result
    }

    async fn run(&self, dispatch: Dispatch) -> ViewSnapshot {
        tracing::debug!(
            epoch = dispatch.epoch,
            page = dispatch.params.page(),
            "Fetching merged data",
        );
        let outcome = self.source.fetch_page(&dispatch.params).await;

        let mut state = self.state.lock().await;
        let failed = outcome.as_ref().err().map(ToString::to_string);
        if state.complete(dispatch.epoch, outcome) {
            if let Some(error) = failed {
                tracing::warn!(epoch = dispatch.epoch, error = %error, "Merged data fetch failed");
            }
        } else {
            tracing::debug!(
                epoch = dispatch.epoch,
                current = state.request_epoch(),
                "Discarding stale merged data response",
            );
        }
        state.snapshot()
    }
}
