//! Product entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;
use catalog_core::pagination::PriceCursor;
use catalog_core::types::{DbId, Timestamp};
use catalog_core::validation::positive_price;

/// A row from the `products` table.
#[derive(Debug, Clone, FromRow)]
pub struct Product {
    pub id: DbId,
    pub name: String,
    pub price: f64,
    pub category_id: DbId,
    pub image: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A product joined with its category name, as read by listings and reports.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ProductWithCategory {
    pub id: DbId,
    pub name: String,
    pub price: f64,
    pub category_id: DbId,
    pub category_name: String,
    pub image: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ProductWithCategory {
    /// Sort position used by price listings.
    pub fn price_cursor(&self) -> PriceCursor {
        PriceCursor::new(self.price, self.id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryRef {
    pub id: DbId,
    pub name: String,
}

/// API representation with the category nested.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: DbId,
    pub name: String,
    pub price: f64,
    pub image: Option<String>,
    pub category_id: DbId,
    pub category: CategoryRef,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<ProductWithCategory> for ProductResponse {
    fn from(row: ProductWithCategory) -> Self {
        Self {
            id: row.id,
            name: row.name,
            price: row.price,
            image: row.image,
            category_id: row.category_id,
            category: CategoryRef {
                id: row.category_id,
                name: row.category_name,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// DTO for creating a product.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProduct {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: String,
    #[validate(custom(function = "positive_price"))]
    pub price: f64,
    pub category_id: DbId,
    pub image: Option<String>,
}

/// DTO for updating a product. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: Option<String>,
    #[validate(custom(function = "positive_price"))]
    pub price: Option<f64>,
    pub category_id: Option<DbId>,
    pub image: Option<String>,
}
