//! Repository for the `categories` table.

use sqlx::{PgConnection, PgPool};
use catalog_core::types::DbId;

use crate::models::category::{Category, CategoryWithCount};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, created_at, updated_at";

/// Category columns plus a correlated product count.
const COUNT_COLUMNS: &str = "c.id, c.name, \
    (SELECT COUNT(*) FROM products p WHERE p.category_id = c.id) AS product_count, \
    c.created_at, c.updated_at";

/// Provides CRUD operations for categories.
pub struct CategoryRepo;

impl CategoryRepo {
    /// Insert a new category. Fails with `uq_categories_name` on a
    /// case-insensitive duplicate.
    pub async fn create(pool: &PgPool, name: &str) -> Result<Category, sqlx::Error> {
        let query = format!("INSERT INTO categories (name) VALUES ($1) RETURNING {COLUMNS}");
        sqlx::query_as::<_, Category>(&query)
            .bind(name)
            .fetch_one(pool)
            .await
    }

    /// Find a category by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Category>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM categories WHERE id = $1");
        sqlx::query_as::<_, Category>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a category by ID together with its product count.
    pub async fn find_with_count(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<CategoryWithCount>, sqlx::Error> {
        let query = format!("SELECT {COUNT_COLUMNS} FROM categories c WHERE c.id = $1");
        sqlx::query_as::<_, CategoryWithCount>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all categories by name with their product counts.
    pub async fn list_with_counts(pool: &PgPool) -> Result<Vec<CategoryWithCount>, sqlx::Error> {
        let query = format!("SELECT {COUNT_COLUMNS} FROM categories c ORDER BY c.name ASC, c.id ASC");
        sqlx::query_as::<_, CategoryWithCount>(&query)
            .fetch_all(pool)
            .await
    }

    /// Rename a category. Returns `None` if it does not exist.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        name: Option<&str>,
    ) -> Result<Option<Category>, sqlx::Error> {
        let query = format!(
            "UPDATE categories SET name = COALESCE($2, name) WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Category>(&query)
            .bind(id)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Delete a category. Fails with `fk_products_category` while products
    /// still reference it. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Return the id of the category named `name` (case-insensitive),
    /// creating it when absent.
    ///
    /// Concurrent importers may race to create the same name. The insert
    /// yields to the unique index and the winner's row is re-read, so every
    /// caller ends up with the same id.
    pub async fn resolve_or_create(
        conn: &mut PgConnection,
        name: &str,
    ) -> Result<DbId, sqlx::Error> {
        let existing: Option<(DbId,)> =
            sqlx::query_as("SELECT id FROM categories WHERE LOWER(name) = LOWER($1)")
                .bind(name)
                .fetch_optional(&mut *conn)
                .await?;
        if let Some((id,)) = existing {
            return Ok(id);
        }

        let inserted: Option<(DbId,)> = sqlx::query_as(
            "INSERT INTO categories (name) VALUES ($1) \
             ON CONFLICT ((LOWER(name))) DO NOTHING \
             RETURNING id",
        )
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
        if let Some((id,)) = inserted {
            return Ok(id);
        }

        tracing::debug!(category = %name, "Category created concurrently, re-reading");
        let (id,): (DbId,) =
            sqlx::query_as("SELECT id FROM categories WHERE LOWER(name) = LOWER($1)")
                .bind(name)
                .fetch_one(&mut *conn)
                .await?;
        Ok(id)
    }
}
