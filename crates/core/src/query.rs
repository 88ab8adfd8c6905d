//! Query parameters and page results for the merged-data view.
//!
//! [`QueryParameters`] keeps its page and page size private so the
//! invariants (`page >= 1`, `page_size > 0`, any filter change resets the
//! page) cannot be bypassed by callers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Rows per page when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// One of the filterable columns of the merged-data view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    Status,
    Category,
    ProjectName,
    Search,
}

impl FilterField {
    pub const ALL: [FilterField; 4] = [
        FilterField::Status,
        FilterField::Category,
        FilterField::ProjectName,
        FilterField::Search,
    ];

    /// Query-string key expected by `/api/merged-data`.
    pub fn query_key(self) -> &'static str {
        match self {
            FilterField::Status => "status",
            FilterField::Category => "category",
            FilterField::ProjectName => "project_name",
            FilterField::Search => "search",
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_key())
    }
}

impl FromStr for FilterField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "status" => Ok(FilterField::Status),
            "category" => Ok(FilterField::Category),
            "project_name" | "projectName" | "project" => Ok(FilterField::ProjectName),
            "search" | "searchText" => Ok(FilterField::Search),
            other => Err(CoreError::Validation(format!("unknown filter field '{other}'"))),
        }
    }
}

/// Current filter values. `None` means unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Filters {
    status: Option<String>,
    category: Option<String>,
    project_name: Option<String>,
    search: Option<String>,
}

impl Filters {
    pub fn get(&self, field: FilterField) -> Option<&str> {
        self.slot(field).as_deref()
    }

    /// Set one filter. An empty string clears it.
    pub fn set(&mut self, field: FilterField, value: impl Into<String>) {
        let value = value.into();
        *self.slot_mut(field) = if value.is_empty() { None } else { Some(value) };
    }

    /// Query pairs for every set filter, in a stable order.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        FilterField::ALL
            .iter()
            .filter_map(|&field| self.get(field).map(|v| (field.query_key(), v.to_string())))
            .collect()
    }

    fn slot(&self, field: FilterField) -> &Option<String> {
        match field {
            FilterField::Status => &self.status,
            FilterField::Category => &self.category,
            FilterField::ProjectName => &self.project_name,
            FilterField::Search => &self.search,
        }
    }

    fn slot_mut(&mut self, field: FilterField) -> &mut Option<String> {
        match field {
            FilterField::Status => &mut self.status,
            FilterField::Category => &mut self.category,
            FilterField::ProjectName => &mut self.project_name,
            FilterField::Search => &mut self.search,
        }
    }
}

// ---------------------------------------------------------------------------
// QueryParameters
// ---------------------------------------------------------------------------

/// Filter and pagination state for one merged-data request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryParameters {
    filters: Filters,
    page: u32,
    page_size: u32,
}

impl QueryParameters {
    /// Start at page 1 with no filters.
    pub fn new(page_size: u32) -> Result<Self, CoreError> {
        if page_size == 0 {
            return Err(CoreError::Validation(
                "page size must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            filters: Filters::default(),
            page: 1,
            page_size,
        })
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Change one filter and move back to the first page.
    pub fn set_filter(&mut self, field: FilterField, value: impl Into<String>) {
        self.filters.set(field, value);
        self.page = 1;
    }

    /// Move to `page`, clamped to `1..=total_pages` when the total is known.
    ///
    /// Returns the page actually selected.
    pub fn set_page(&mut self, page: u32, total_pages: Option<u32>) -> u32 {
        let upper = total_pages.filter(|&t| t > 0).unwrap_or(u32::MAX);
        self.page = page.clamp(1, upper);
        self.page
    }

    /// Full query for `/api/merged-data`.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("page", self.page.to_string()),
            ("per_page", self.page_size.to_string()),
        ];
        query.extend(self.filters.to_query());
        query
    }

    /// Filters only, for `/api/merged-data/export`.
    pub fn export_query(&self) -> Vec<(&'static str, String)> {
        self.filters.to_query()
    }
}

impl Default for QueryParameters {
    fn default() -> Self {
        Self {
            filters: Filters::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// Records and page results
// ---------------------------------------------------------------------------

/// One merged purchase-order/acceptance row, passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub serde_json::Map<String, serde_json::Value>);

impl Record {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn status(&self) -> Option<&str> {
        self.0.get("status").and_then(|v| v.as_str())
    }

    pub fn status_category(&self) -> StatusCategory {
        StatusCategory::from_status(self.status())
    }
}

/// Display bucket chosen from a record's free-text status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Closed,
    Pending,
    Cancelled,
}

impl StatusCategory {
    /// Missing status reads as cancelled; unrecognised text as pending.
    pub fn from_status(status: Option<&str>) -> Self {
        let Some(status) = status else {
            return StatusCategory::Cancelled;
        };
        let lower = status.to_lowercase();
        if lower.contains("closed") {
            StatusCategory::Closed
        } else if lower.contains("pending") {
            StatusCategory::Pending
        } else if lower.contains("cancelled") {
            StatusCategory::Cancelled
        } else {
            StatusCategory::Pending
        }
    }
}

/// One page of merged rows plus pagination metadata, exactly as returned
/// by `/api/merged-data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub items: Vec<Record>,
    pub total_count: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageResult {
    /// "Showing N of M records".
    pub fn summary(&self) -> String {
        format!(
            "Showing {} of {} records",
            self.items.len(),
            self.total_count
        )
    }
}
