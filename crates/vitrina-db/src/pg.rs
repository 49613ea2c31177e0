//! Postgres-backed [`ProductStore`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use vitrina_core::records::{HistoryRecord, ProductImage, ProductRecord};

use crate::store::ProductStore;
use crate::StoreError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table. `images_by_color` round-trips through
/// JSONB.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ProductRow {
    url: String,
    site: String,
    name: Option<String>,
    description: Option<String>,
    original_price: Option<String>,
    current_price: Option<String>,
    original_price_amount: Option<Decimal>,
    current_price_amount: Option<Decimal>,
    currency: Option<String>,
    has_discount: bool,
    discount_amount: Decimal,
    discount_percentage: i32,
    images_by_color: serde_json::Value,
    datetime: DateTime<Utc>,
    last_visited: DateTime<Utc>,
}

impl ProductRow {
    fn into_record(self) -> Result<ProductRecord, StoreError> {
        let images_by_color: BTreeMap<String, Vec<ProductImage>> =
            serde_json::from_value(self.images_by_color)?;
        Ok(ProductRecord {
            url: self.url,
            site: self.site,
            name: self.name,
            description: self.description,
            original_price: self.original_price,
            current_price: self.current_price,
            original_price_amount: self.original_price_amount,
            current_price_amount: self.current_price_amount,
            currency: self.currency,
            has_discount: self.has_discount,
            discount_amount: self.discount_amount,
            discount_percentage: self.discount_percentage,
            images_by_color,
            datetime: self.datetime,
            last_visited: self.last_visited,
        })
    }
}

// ---------------------------------------------------------------------------
// Store implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<ProductRecord>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT url, site, name, description, original_price, current_price, \
                    original_price_amount, current_price_amount, currency, has_discount, \
                    discount_amount, discount_percentage, images_by_color, datetime, last_visited \
             FROM products \
             WHERE url = $1",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProductRow::into_record).transpose()
    }

    async fn insert(&self, record: &ProductRecord) -> Result<(), StoreError> {
        let images = serde_json::to_value(&record.images_by_color)?;
        sqlx::query(
            "INSERT INTO products \
                 (url, site, name, description, original_price, current_price, \
                  original_price_amount, current_price_amount, currency, has_discount, \
                  discount_amount, discount_percentage, images_by_color, datetime, last_visited) \
             VALUES ($1, $2, $3, $4, $5, $6, \
                     $7, $8, $9, $10, \
                     $11, $12, $13::jsonb, $14, $15)",
        )
        .bind(&record.url)
        .bind(&record.site)
        .bind(&record.name)
        .bind(&record.description)
        .bind(&record.original_price)
        .bind(&record.current_price)
        .bind(record.original_price_amount)
        .bind(record.current_price_amount)
        .bind(&record.currency)
        .bind(record.has_discount)
        .bind(record.discount_amount)
        .bind(record.discount_percentage)
        .bind(images)
        .bind(record.datetime)
        .bind(record.last_visited)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace(&self, record: &ProductRecord) -> Result<(), StoreError> {
        let images = serde_json::to_value(&record.images_by_color)?;
        let result = sqlx::query(
            "UPDATE products SET \
                 site                  = $2, \
                 name                  = $3, \
                 description           = $4, \
                 original_price        = $5, \
                 current_price         = $6, \
                 original_price_amount = $7, \
                 current_price_amount  = $8, \
                 currency              = $9, \
                 has_discount          = $10, \
                 discount_amount       = $11, \
                 discount_percentage   = $12, \
                 images_by_color       = $13::jsonb, \
                 datetime              = $14, \
                 last_visited          = $15 \
             WHERE url = $1",
        )
        .bind(&record.url)
        .bind(&record.site)
        .bind(&record.name)
        .bind(&record.description)
        .bind(&record.original_price)
        .bind(&record.current_price)
        .bind(record.original_price_amount)
        .bind(record.current_price_amount)
        .bind(&record.currency)
        .bind(record.has_discount)
        .bind(record.discount_amount)
        .bind(record.discount_percentage)
        .bind(images)
        .bind(record.datetime)
        .bind(record.last_visited)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn touch_last_visited(&self, url: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE products SET last_visited = GREATEST(last_visited, $2) WHERE url = $1",
        )
        .bind(url)
        .bind(at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn append_history(&self, entry: &HistoryRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO product_history (id, product_url, change_date, changes, snapshot) \
             VALUES ($1, $2, $3, $4, $5::jsonb)",
        )
        .bind(entry.id)
        .bind(&entry.product_url)
        .bind(entry.change_date)
        .bind(&entry.changes)
        .bind(&entry.snapshot)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
