//! SQL rendering for product listings.
//!
//! Turns a [`ListingQuery`] into a parameterized `SELECT` over products joined
//! with their category. Every user-supplied value is bound, never spliced.

use catalog_core::listing::{like_pattern, ListingQuery, ProductFilter};
use sqlx::{Postgres, QueryBuilder};

/// Columns selected for [`ProductWithCategory`](crate::models::product::ProductWithCategory).
pub const PRODUCT_WITH_CATEGORY_COLUMNS: &str = "p.id, p.name, p.price, p.category_id, \
    c.name AS category_name, p.image, p.created_at, p.updated_at";

const FROM_PRODUCTS: &str = " FROM products p JOIN categories c ON c.id = p.category_id";

/// Append `WHERE` clauses for the active filters.
///
/// Returns whether any clause was written so callers can continue with
/// `AND` or start with `WHERE`.
pub fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) -> bool {
    let mut has_where = false;

    if let Some(term) = &filter.search {
        let pattern = like_pattern(term);
        push_clause(builder, &mut has_where);
        builder
            .push("(p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR c.name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(name) = &filter.category_name {
        push_clause(builder, &mut has_where);
        builder.push("c.name ILIKE ").push_bind(like_pattern(name));
    }
    if let Some(id) = filter.category_id {
        push_clause(builder, &mut has_where);
        builder.push("p.category_id = ").push_bind(id);
    }
    has_where
}

fn push_clause(builder: &mut QueryBuilder<'_, Postgres>, has_where: &mut bool) {
    builder.push(if *has_where { " AND " } else { " WHERE " });
    *has_where = true;
}

/// Build the page query: filters, seek predicate, `(price, id)` ordering,
/// and `LIMIT fetch_limit`.
pub fn build_listing_query(query: &ListingQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {PRODUCT_WITH_CATEGORY_COLUMNS}{FROM_PRODUCTS}"
    ));

    let mut has_where = push_filters(&mut builder, &query.filter);
    if let Some(cursor) = query.after {
        let op = query.sort.seek_operator();
        push_clause(&mut builder, &mut has_where);
        builder
            .push(format!("(p.price {op} "))
            .push_bind(cursor.price)
            .push(" OR (p.price = ")
            .push_bind(cursor.price)
            .push(format!(" AND p.id {op} "))
            .push_bind(cursor.id)
            .push("))");
    }

    let dir = query.sort.as_sql();
    builder
        .push(format!(" ORDER BY p.price {dir}, p.id {dir} LIMIT "))
        .push_bind(query.fetch_limit);
    builder
}

/// Build a `COUNT(*)` over the same filters (no cursor).
pub fn build_count_query(filter: &ProductFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT COUNT(*){FROM_PRODUCTS}"));
    push_filters(&mut builder, filter);
    builder
}
