//! Page/limit validation and page-count arithmetic.
//!
//! Raw input is never rejected: anything missing, non-numeric, zero or negative falls back to
//! the default, and limits above the configured maximum are clamped.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const DEFAULT_MAX_LIMIT: u64 = 100;

/// Page/limit exactly as the client sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationRequest {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PaginationRequest {
    pub fn new(page: Option<impl Into<String>>, limit: Option<impl Into<String>>) -> Self {
        Self { page: page.map(Into::into), limit: limit.map(Into::into) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationDefaults {
    pub page: u64,
    pub limit: u64,
}

impl Default for PaginationDefaults {
    fn default() -> Self {
        Self { page: DEFAULT_PAGE, limit: DEFAULT_LIMIT }
    }
}

/// Validated pagination: `page >= 1`, `1 <= limit <= max_limit`. Deserialized values go
/// through [`PaginationParams::new`] with the default maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "UncheckedPagination")]
pub struct PaginationParams {
    page: u64,
    limit: u64,
}

#[derive(Deserialize)]
struct UncheckedPagination {
    page: u64,
    limit: u64,
}

impl From<UncheckedPagination> for PaginationParams {
    fn from(u: UncheckedPagination) -> Self {
        Self::new(u.page, u.limit, DEFAULT_MAX_LIMIT)
    }
}

impl PaginationParams {
    /// Builds params from already-typed values, applying the same fallbacks as [`parse`].
    #[must_use]
    pub fn new(page: u64, limit: u64, max_limit: u64) -> Self {
        let page = if page < 1 { DEFAULT_PAGE } else { page };
        let limit = if limit < 1 { DEFAULT_LIMIT } else { limit };
        Self { page, limit: limit.clamp(1, max_limit.max(1)) }
    }

    #[must_use]
    pub const fn page(&self) -> u64 {
        self.page
    }

    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    #[must_use]
    pub const fn skip(&self) -> u64 {
        compute_skip(self.page, self.limit)
    }

    #[must_use]
    pub const fn summarize(&self, total: u64) -> PaginationResult {
        summarize(self.page, self.limit, total)
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: DEFAULT_PAGE, limit: DEFAULT_LIMIT }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResult {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Lenient numeric coercion: surrounding whitespace is ignored, blank input is zero,
/// anything unparsable is NaN.
fn coerce(raw: Option<&str>) -> f64 {
    match raw.map(str::trim) {
        None => f64::NAN,
        Some("") => 0.0,
        Some(s) => s.parse::<f64>().unwrap_or(f64::NAN),
    }
}

fn positive_or(raw: Option<&str>, default: u64) -> u64 {
    let v = coerce(raw);
    if v.is_finite() && v >= 1.0 {
        crate::utils::num::f64_to_u64_saturating(v)
    } else {
        default
    }
}

/// Validates raw page/limit input. Page and limit are checked independently.
#[must_use]
pub fn parse(raw: &PaginationRequest, defaults: PaginationDefaults, max_limit: u64) -> PaginationParams {
    let max_limit = max_limit.max(1);
    let page = positive_or(raw.page.as_deref(), defaults.page.max(1));
    let limit = positive_or(raw.limit.as_deref(), defaults.limit.max(1)).clamp(1, max_limit);
    PaginationParams { page, limit }
}

#[must_use]
pub const fn compute_skip(page: u64, limit: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(limit)
}

/// Page-count metadata. `has_previous` follows `page > 1` even when there are no results.
#[must_use]
pub const fn summarize(page: u64, limit: u64, total: u64) -> PaginationResult {
    let total_pages = if total == 0 || limit == 0 { 0 } else { total.div_ceil(limit) };
    PaginationResult {
        page,
        limit,
        total,
        total_pages,
        has_next: page < total_pages,
        has_previous: page > 1,
    }
}
