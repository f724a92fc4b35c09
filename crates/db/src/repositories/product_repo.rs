//! Repository for the `products` table.

use sqlx::PgPool;
use catalog_core::import::ProductRow;
use catalog_core::listing::{ListingQuery, ProductFilter};
use catalog_core::types::DbId;

use crate::listing::{build_count_query, build_listing_query, PRODUCT_WITH_CATEGORY_COLUMNS};
use crate::models::product::{CreateProduct, ProductWithCategory, UpdateProduct};
use crate::repositories::CategoryRepo;

const FROM_JOINED: &str = "FROM products p JOIN categories c ON c.id = p.category_id";

/// Provides CRUD, listing, and bulk-write operations for products.
pub struct ProductRepo;

impl ProductRepo {
    /// Insert a new product, returning it joined with its category.
    pub async fn create(
        pool: &PgPool,
        input: &CreateProduct,
    ) -> Result<ProductWithCategory, sqlx::Error> {
        let (id,): (DbId,) = sqlx::query_as(
            "INSERT INTO products (name, price, category_id, image)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(&input.name)
        .bind(input.price)
        .bind(input.category_id)
        .bind(&input.image)
        .fetch_one(pool)
        .await?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Find a product by ID, joined with its category.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ProductWithCategory>, sqlx::Error> {
        let query = format!("SELECT {PRODUCT_WITH_CATEGORY_COLUMNS} {FROM_JOINED} WHERE p.id = $1");
        sqlx::query_as::<_, ProductWithCategory>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Update a product. Only non-`None` fields are applied.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateProduct,
    ) -> Result<Option<ProductWithCategory>, sqlx::Error> {
        let updated: Option<(DbId,)> = sqlx::query_as(
            "UPDATE products SET
                name = COALESCE($2, name),
                price = COALESCE($3, price),
                category_id = COALESCE($4, category_id),
                image = COALESCE($5, image)
             WHERE id = $1
             RETURNING id",
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.price)
        .bind(input.category_id)
        .bind(&input.image)
        .fetch_optional(pool)
        .await?;

        match updated {
            Some(_) => Self::find_by_id(pool, id).await,
            None => Ok(None),
        }
    }

    /// Delete a product. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fetch one listing page (`query.fetch_limit` rows, sentinel included).
    pub async fn list_page(
        pool: &PgPool,
        query: &ListingQuery,
    ) -> Result<Vec<ProductWithCategory>, sqlx::Error> {
        build_listing_query(query)
            .build_query_as::<ProductWithCategory>()
            .fetch_all(pool)
            .await
    }

    /// Count products matching a filter.
    pub async fn count(pool: &PgPool, filter: &ProductFilter) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = build_count_query(filter)
            .build_query_as()
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Next `limit` products with `id > after_id`, ordered by id.
    pub async fn list_after_id(
        pool: &PgPool,
        after_id: DbId,
        limit: i64,
    ) -> Result<Vec<ProductWithCategory>, sqlx::Error> {
        let query = format!(
            "SELECT {PRODUCT_WITH_CATEGORY_COLUMNS} {FROM_JOINED}
             WHERE p.id > $1
             ORDER BY p.id ASC
             LIMIT $2"
        );
        sqlx::query_as::<_, ProductWithCategory>(&query)
            .bind(after_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Write one import batch in a single transaction.
    ///
    /// Rows carrying an id update that product; rows without one, or whose id
    /// no longer exists, are inserted. Categories are resolved or created by
    /// name. Any error rolls the whole batch back. Returns the rows written.
    pub async fn write_import_batch(pool: &PgPool, rows: &[ProductRow]) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut written = 0u64;

        for row in rows {
            let category_id = CategoryRepo::resolve_or_create(&mut *tx, &row.category).await?;

            let updated = match row.id {
                Some(id) => {
                    sqlx::query(
                        "UPDATE products
                         SET name = $2, price = $3, category_id = $4, image = $5
                         WHERE id = $1",
                    )
                    .bind(id)
                    .bind(&row.name)
                    .bind(row.price)
                    .bind(category_id)
                    .bind(&row.image)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected()
                }
                None => 0,
            };

            if updated == 0 {
                sqlx::query(
                    "INSERT INTO products (name, price, category_id, image)
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(&row.name)
                .bind(row.price)
                .bind(category_id)
                .bind(&row.image)
                .execute(&mut *tx)
                .await?;
            }
            written += 1;
        }

        tx.commit().await?;
        Ok(written)
    }
}
