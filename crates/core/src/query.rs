//! Filtering, sorting and pagination of flat node collections for list views.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::node::BomNode;
use crate::types::ProductId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 50;

/// Sort key used when the caller does not name one.
pub const DEFAULT_SORT_KEY: &str = "createdDate";

/// Sort keys advertised to clients.
pub const SUPPORTED_SORTS: [&str; 3] = ["createdDate", "lastModifiedDate", "productId"];

// ---------------------------------------------------------------------------
// Sort
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    ProductId,
}

impl SortField {
    /// Parse a sort key. Unknown keys fall back to [`SortField::CreatedAt`].
    pub fn parse_lenient(key: &str) -> Self {
        match key {
            "createdAt" | "createdDate" => Self::CreatedAt,
            "updatedAt" | "lastModifiedDate" => Self::UpdatedAt,
            "productId" => Self::ProductId,
            _ => Self::CreatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// `asc` in any case is ascending; anything else is descending.
    pub fn parse_lenient(dir: &str) -> Self {
        if dir.eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Sort {
    fn compare(&self, a: &BomNode, b: &BomNode) -> Ordering {
        let primary = match self.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::ProductId => a.product_id.cmp(&b.product_id),
        };
        let ordering = primary.then_with(|| a.id.cmp(&b.id));
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// List request as received from callers (`?rootId&sortBy&sortDir&page&size`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub root_id: Option<ProductId>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

/// A validated list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSpec {
    pub root_id: Option<ProductId>,
    /// The caller's sort key, echoed back in responses.
    pub sort_key: String,
    pub sort: Sort,
    pub page: i64,
    pub size: i64,
}

impl ListQuery {
    /// Apply defaults and check pagination bounds. Sort keys and directions
    /// are lenient; only `page < 0` or `size` outside `1..=50` fail.
    pub fn validate(self) -> Result<ListSpec, CoreError> {
        let page = self.page.unwrap_or(0);
        let size = self.size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page < 0 {
            return Err(CoreError::Validation(format!(
                "page must be zero or greater, got {page}"
            )));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            return Err(CoreError::Validation(format!(
                "size must be between 1 and {MAX_PAGE_SIZE}, got {size}"
            )));
        }
        let sort_key = self.sort_by.unwrap_or_else(|| DEFAULT_SORT_KEY.to_string());
        let sort = Sort {
            field: SortField::parse_lenient(&sort_key),
            direction: self
                .sort_dir
                .as_deref()
                .map(SortDirection::parse_lenient)
                .unwrap_or_default(),
        };
        Ok(ListSpec {
            root_id: self.root_id,
            sort_key,
            sort,
            page,
            size,
        })
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// One page of a filtered, sorted collection.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub total: i64,
    pub total_pages: i64,
    pub is_last_item: bool,
}

/// Number of pages needed for `total` items.
pub fn total_pages(total: i64, size: i64) -> i64 {
    (total + size - 1) / size
}

/// Filter by root, sort, and cut out page `spec.page`. A page past the end is
/// empty, not an error.
pub fn list(nodes: Vec<BomNode>, spec: &ListSpec) -> Page<BomNode> {
    let mut filtered: Vec<BomNode> = match spec.root_id {
        Some(root) => nodes
            .into_iter()
            .filter(|n| n.root_product_id == root)
            .collect(),
        None => nodes,
    };
    filtered.sort_by(|a, b| spec.sort.compare(a, b));

    let total = filtered.len() as i64;
    let total_pages = total_pages(total, spec.size);
    let offset = spec.page.saturating_mul(spec.size);
    let results = if offset >= total {
        Vec::new()
    } else {
        filtered
            .into_iter()
            .skip(offset as usize)
            .take(spec.size as usize)
            .collect()
    };

    Page {
        results,
        total,
        total_pages,
        is_last_item: spec.page >= total_pages - 1,
    }
}

// ---------------------------------------------------------------------------
// Filter metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionValue {
    pub identify_value: String,
    pub display_value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedField {
    pub field_name: &'static str,
    pub display_name: &'static str,
    pub operator: &'static str,
    #[serde(rename = "type")]
    pub field_type: &'static str,
    pub alternative_operators: Vec<&'static str>,
    pub suggestion_values: Vec<SuggestionValue>,
}

/// Filters and sorts a list endpoint supports, for client-side builders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    pub supported_fields: Vec<SupportedField>,
    pub supported_sorts: Vec<&'static str>,
}

impl FilterConfig {
    pub fn bom() -> Self {
        Self {
            supported_fields: vec![SupportedField {
                field_name: "rootId",
                display_name: "Root product",
                operator: "EQ",
                field_type: "NUMBER",
                alternative_operators: vec!["EQ"],
                suggestion_values: Vec::new(),
            }],
            supported_sorts: SUPPORTED_SORTS.to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
