//! Database operations for the `products` table.

use bazaar_core::SlugCandidates;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub slug: String,
    pub price: Decimal,
    pub category: String,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for a new product. The slug must already be unique.
#[derive(Debug, Clone)]
pub struct NewProduct<'a> {
    pub name: &'a str,
    pub slug: &'a str,
    pub price: Decimal,
    pub category: &'a str,
    pub image: &'a str,
}

/// Sparse product update: `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch<'a> {
    pub name: Option<&'a str>,
    pub price: Option<Decimal>,
    pub category: Option<&'a str>,
    pub image: Option<&'a str>,
}

/// What a cascading product delete touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductRemoval {
    pub cart_lines_removed: u64,
    pub wishlist_entries_removed: u64,
}

const PRODUCT_COLUMNS: &str =
    "id, public_id, name, slug, price, category, image, created_at, updated_at";

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// All products in creation order, optionally restricted to one category
/// (compared case-insensitively).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products(
    pool: &PgPool,
    category: Option<&str>,
) -> Result<Vec<ProductRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         WHERE ($1::TEXT IS NULL OR LOWER(category) = LOWER($1)) \
         ORDER BY created_at, id"
    ))
    .bind(category)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Case-insensitive substring search over name, slug and category.
/// `%`, `_` and `\` in `query` match literally.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn search_products(pool: &PgPool, query: &str) -> Result<Vec<ProductRow>, DbError> {
    let pattern = format!("%{}%", escape_like(query));
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         WHERE name ILIKE $1 ESCAPE '\\' \
            OR slug ILIKE $1 ESCAPE '\\' \
            OR category ILIKE $1 ESCAPE '\\' \
         ORDER BY created_at, id"
    ))
    .bind(pattern)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product_by_slug(pool: &PgPool, slug: &str) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product_by_public_id(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE public_id = $1"
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Fetch every product whose public id is in `ids`. Unknown ids are skipped;
/// result order is unspecified.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_products_by_public_ids(
    pool: &PgPool,
    ids: &[Uuid],
) -> Result<Vec<ProductRow>, DbError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE public_id = ANY($1)"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn slug_exists(pool: &PgPool, slug: &str) -> Result<bool, DbError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE slug = $1)")
        .bind(slug)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

/// Returns `true` if another product already uses `name` (case-insensitive).
/// `excluding` names a product id to ignore, for renames.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn name_taken(pool: &PgPool, name: &str, excluding: Option<i64>) -> Result<bool, DbError> {
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS ( \
             SELECT 1 FROM products \
             WHERE LOWER(name) = LOWER($1) AND ($2::BIGINT IS NULL OR id <> $2) \
         )",
    )
    .bind(name)
    .bind(excluding)
    .fetch_one(pool)
    .await?;
    Ok(taken)
}

/// First slug in `name`, `name-2`, `name-3`, … that no product uses yet.
///
/// Uniqueness holds at generation time only; a concurrent insert of the same
/// slug loses on the unique index.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a lookup fails.
pub async fn generate_unique_slug(pool: &PgPool, name: &str) -> Result<String, DbError> {
    for candidate in SlugCandidates::new(name) {
        if !slug_exists(pool, &candidate).await? {
            return Ok(candidate);
        }
    }
    // SlugCandidates never ends.
    Err(DbError::NotFound)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Conflict`] on a duplicate name or slug, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn create_product(pool: &PgPool, product: &NewProduct<'_>) -> Result<ProductRow, DbError> {
    sqlx::query_as::<_, ProductRow>(&format!(
        "INSERT INTO products (name, slug, price, category, image) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(product.name)
    .bind(product.slug)
    .bind(product.price)
    .bind(product.category)
    .bind(product.image)
    .fetch_one(pool)
    .await
    .map_err(DbError::from_unique_violation)
}

/// Apply a sparse update. The slug never changes, even on rename.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no product has this id,
/// [`DbError::Conflict`] on a duplicate name, or [`DbError::Sqlx`] if the query fails.
pub async fn update_product(
    pool: &PgPool,
    product_id: i64,
    patch: &ProductPatch<'_>,
) -> Result<ProductRow, DbError> {
    sqlx::query_as::<_, ProductRow>(&format!(
        "UPDATE products SET \
             name = COALESCE($2, name), \
             price = COALESCE($3, price), \
             category = COALESCE($4, category), \
             image = COALESCE($5, image), \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(product_id)
    .bind(patch.name)
    .bind(patch.price)
    .bind(patch.category)
    .bind(patch.image)
    .fetch_optional(pool)
    .await
    .map_err(DbError::from_unique_violation)?
    .ok_or(DbError::NotFound)
}

/// Delete a product and, in the same transaction, every cart line and wishlist
/// entry that names it. Order snapshots are left alone.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the product does not exist, or
/// [`DbError::Sqlx`] if any statement fails (the transaction is rolled back).
pub async fn delete_product_cascade(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<ProductRemoval, DbError> {
    let mut tx = pool.begin().await?;

    let deleted = sqlx::query("DELETE FROM products WHERE public_id = $1")
        .bind(public_id)
        .execute(&mut *tx)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    let cart = sqlx::query("DELETE FROM cart_items WHERE product_id = $1")
        .bind(public_id)
        .execute(&mut *tx)
        .await?;
    let wishlist = sqlx::query("DELETE FROM wishlist_items WHERE product_id = $1")
        .bind(public_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(ProductRemoval {
        cart_lines_removed: cart.rows_affected(),
        wishlist_entries_removed: wishlist.rows_affected(),
    })
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
