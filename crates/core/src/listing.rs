//! Product listing query model.
//!
//! A [`ListingQuery`] captures filters, sort direction, and the seek position
//! for one page fetch. The SQL rendering lives in the `db` crate; the methods
//! here state the same semantics in plain Rust so the ordering and seek
//! contract can be checked without a database.
//!
//! Ordering is always `(price, id)` with both keys in the same direction. The
//! `id` tie-break makes the order total, which is what lets a cursor sit in the
//! middle of a run of equal prices without skipping or repeating rows.

use std::cmp::Ordering;

use crate::error::CoreError;
use crate::pagination::PriceCursor;
use crate::types::DbId;

/// Query-string value for ascending price order.
pub const SORT_PRICE_ASC: &str = "price";
/// Query-string value for descending price order.
pub const SORT_PRICE_DESC: &str = "-price";

// ---------------------------------------------------------------------------
// Sort direction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    /// Parse the `sort` query parameter. Absent means ascending.
    pub fn parse(param: Option<&str>) -> Result<Self, CoreError> {
        match param.map(str::trim) {
            None | Some("") | Some(SORT_PRICE_ASC) => Ok(Self::Ascending),
            Some(SORT_PRICE_DESC) => Ok(Self::Descending),
            Some(other) => Err(CoreError::Validation(format!(
                "Invalid sort '{other}'. Must be one of: {SORT_PRICE_ASC}, {SORT_PRICE_DESC}"
            ))),
        }
    }

    /// SQL keyword for this direction.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }

    /// Comparison operator that selects rows strictly after a position.
    pub fn seek_operator(self) -> &'static str {
        match self {
            Self::Ascending => ">",
            Self::Descending => "<",
        }
    }

    /// Order two `(price, id)` keys in this direction.
    pub fn compare(self, a: (f64, DbId), b: (f64, DbId)) -> Ordering {
        let ascending = a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
        match self {
            Self::Ascending => ascending,
            Self::Descending => ascending.reverse(),
        }
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Row filters for product listings. Empty strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    /// Case-insensitive substring match on product name OR category name.
    pub search: Option<String>,
    /// Case-insensitive substring match on category name.
    pub category_name: Option<String>,
    /// Exact category id.
    pub category_id: Option<DbId>,
}

impl ProductFilter {
    pub fn new(
        search: Option<String>,
        category_name: Option<String>,
        category_id: Option<DbId>,
    ) -> Self {
        Self {
            search: non_blank(search),
            category_name: non_blank(category_name),
            category_id,
        }
    }

    /// Whether a product row satisfies every active filter.
    pub fn matches(&self, name: &str, category_name: &str, category_id: DbId) -> bool {
        if let Some(term) = &self.search {
            if !contains_ci(name, term) && !contains_ci(category_name, term) {
                return false;
            }
        }
        if let Some(term) = &self.category_name {
            if !contains_ci(category_name, term) {
                return false;
            }
        }
        if let Some(id) = self.category_id {
            if id != category_id {
                return false;
            }
        }
        true
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Build an `ILIKE` substring pattern, escaping the LIKE metacharacters so
/// user input is matched literally.
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

// ---------------------------------------------------------------------------
// Listing query
// ---------------------------------------------------------------------------

/// Everything the store needs to fetch one page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    pub filter: ProductFilter,
    pub sort: SortDirection,
    /// Seek position; `None` starts from the beginning.
    pub after: Option<PriceCursor>,
    /// Number of rows to fetch (page size plus one sentinel row).
    pub fetch_limit: i64,
}

impl ListingQuery {
    /// Seek predicate: is `(price, id)` strictly after the cursor position?
    ///
    /// - ascending: `price > c.price OR (price = c.price AND id > c.id)`
    /// - descending: `price < c.price OR (price = c.price AND id < c.id)`
    pub fn is_after(&self, price: f64, id: DbId) -> bool {
        match self.after {
            None => true,
            Some(cursor) => {
                self.sort.compare((price, id), (cursor.price, cursor.id)) == Ordering::Greater
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
