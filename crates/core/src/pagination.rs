//! Cursor codec and page assembly for seek pagination.
//!
//! A cursor marks "resume strictly after this item" in a listing ordered by
//! `(price, id)`. Tokens are opaque to clients: URL-safe base64 over a small
//! JSON payload. Decoding never fails loudly; a token that cannot be read is
//! treated exactly like an absent cursor.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::types::DbId;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Default page size when the caller does not supply `limit`.
pub const DEFAULT_PAGE_LIMIT: i64 = 20;

/// Upper bound on a single page.
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Clamp a user-provided limit to valid bounds.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).max(1).min(max)
}

// ---------------------------------------------------------------------------
// Cursor codec
// ---------------------------------------------------------------------------

/// Sort position of the last item on a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceCursor {
    pub price: f64,
    pub id: DbId,
}

impl PriceCursor {
    pub fn new(price: f64, id: DbId) -> Self {
        Self { price, id }
    }
}

/// Encode a `(price, id)` sort position into an opaque, URL-safe token.
pub fn encode_cursor(price: f64, id: DbId) -> String {
    // Two plain numbers always serialize; an empty token would decode as "no cursor".
    let payload = serde_json::to_vec(&PriceCursor::new(price, id)).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(payload)
}

/// Decode a token produced by [`encode_cursor`].
///
/// Returns `None` for anything malformed: bad base64, bad JSON, wrong shape,
/// or a non-finite price.
pub fn decode_cursor(token: &str) -> Option<PriceCursor> {
    let bytes = URL_SAFE_NO_PAD.decode(token.trim()).ok()?;
    let cursor: PriceCursor = serde_json::from_slice(&bytes).ok()?;
    cursor.price.is_finite().then_some(cursor)
}

// ---------------------------------------------------------------------------
// Page assembly
// ---------------------------------------------------------------------------

/// One page of a seek-paginated listing.
///
/// `next_cursor` is `Some` exactly when `has_next_page` is true.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next_page: bool,
    pub next_cursor: Option<String>,
    pub limit: i64,
}

impl<T> Page<T> {
    /// Build a page from a result set fetched with `limit + 1` rows.
    ///
    /// The extra row only signals that more data exists; it is dropped and
    /// the cursor is taken from the last row that is actually returned.
    pub fn from_overfetch(
        mut rows: Vec<T>,
        limit: i64,
        sort_key: impl Fn(&T) -> PriceCursor,
    ) -> Self {
        let page_size = usize::try_from(limit.max(1)).unwrap_or(usize::MAX);
        let has_next_page = rows.len() > page_size;
        rows.truncate(page_size);

        let next_cursor = if has_next_page {
            rows.last().map(|last| {
                let key = sort_key(last);
                encode_cursor(key.price, key.id)
            })
        } else {
            None
        };

        Self {
            // A page cannot claim a successor it has no cursor for.
            has_next_page: next_cursor.is_some(),
            items: rows,
            next_cursor,
            limit,
        }
    }

    pub fn empty(limit: i64) -> Self {
        Self {
            items: Vec::new(),
            has_next_page: false,
            next_cursor: None,
            limit,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- clamp_limit ---------------------------------------------------------

    #[test]
    fn clamp_limit_uses_default_when_none() {
        assert_eq!(clamp_limit(None, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT), 20);
    }

    #[test]
    fn clamp_limit_respects_max() {
        assert_eq!(clamp_limit(Some(500), DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT), 100);
    }

    #[test]
    fn clamp_limit_floors_at_one() {
        assert_eq!(clamp_limit(Some(0), DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT), 1);
        assert_eq!(clamp_limit(Some(-3), DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT), 1);
    }

    // -- cursor codec --------------------------------------------------------

    #[test]
    fn cursor_round_trips_awkward_prices() {
        let samples = [
            (10.0, 1),
            (0.1 + 0.2, 42),
            (19.99, i64::MAX),
            (1e-7, 7),
            (123_456_789.123_456_78, 3),
        ];
        for (price, id) in samples {
            let token = encode_cursor(price, id);
            assert_eq!(
                decode_cursor(&token),
                Some(PriceCursor::new(price, id)),
                "round trip failed for ({price}, {id})"
            );
        }
    }

    #[test]
    fn cursor_token_is_url_safe() {
        let token = encode_cursor(99.5, 12345);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn garbage_cursor_decodes_to_none() {
        assert_eq!(decode_cursor("garbage-not-base64!!"), None);
        assert_eq!(decode_cursor(""), None);
        assert_eq!(decode_cursor("   "), None);
    }

    #[test]
    fn wrong_shape_decodes_to_none() {
        let token = URL_SAFE_NO_PAD.encode(br#"{"price":"ten","id":1}"#);
        assert_eq!(decode_cursor(&token), None);

        let token = URL_SAFE_NO_PAD.encode(br#"[1,2]"#);
        assert_eq!(decode_cursor(&token), None);
    }

    // -- page assembly -------------------------------------------------------

    fn key(row: &(f64, DbId)) -> PriceCursor {
        PriceCursor::new(row.0, row.1)
    }

    #[test]
    fn overfetch_trims_sentinel_and_sets_cursor() {
        let rows = vec![(10.0, 1), (10.0, 2), (20.0, 3)];
        let page = Page::from_overfetch(rows, 2, key);

        assert_eq!(page.items, vec![(10.0, 1), (10.0, 2)]);
        assert!(page.has_next_page);
        let cursor = decode_cursor(page.next_cursor.as_deref().unwrap()).unwrap();
        assert_eq!(cursor, PriceCursor::new(10.0, 2));
    }

    #[test]
    fn exact_fit_has_no_next_page() {
        let rows = vec![(10.0, 1), (10.0, 2)];
        let page = Page::from_overfetch(rows, 2, key);

        assert_eq!(page.items.len(), 2);
        assert!(!page.has_next_page);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn empty_result_has_no_cursor() {
        let page = Page::from_overfetch(Vec::<(f64, DbId)>::new(), 20, key);
        assert!(page.items.is_empty());
        assert!(!page.has_next_page);
        assert_eq!(page.next_cursor, None);
        assert_eq!(page, Page::empty(20));
    }
}
