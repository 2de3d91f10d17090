//! Shared types and result types for the database layer

pub mod errors;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub use errors::DatabaseError;

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Default number of rows returned by list endpoints.
pub const DEFAULT_PAGE_SIZE: i64 = 50;
/// Upper bound on rows returned by list endpoints.
pub const MAX_PAGE_SIZE: i64 = 200;

/// Limit/offset window for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Page {
    /// Build a page from optional request parameters, clamping to sane bounds.
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);
        Self { limit, offset }
    }
}

/// One page of results plus the total row count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: Page) -> Self {
        Self {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Round a monetary amount to two decimal places.
pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Current UTC time in the RFC 3339 form every timestamp column uses.
pub fn now_rfc3339() -> String {
    format_timestamp(Utc::now())
}

/// Format a timestamp for storage. Second precision with a `+00:00` offset
/// keeps stored values lexicographically ordered.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Parse a stored timestamp back into UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Generate an opaque identifier for externally visible rows.
pub fn new_public_id() -> String {
    cuid2::create_id()
}
