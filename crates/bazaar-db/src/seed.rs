use bazaar_core::{round_price, ProductSeed, Role};
use sqlx::PgPool;

use crate::users::UserRow;
use crate::DbError;

/// Upsert catalog entries by slug.
///
/// Returns the number of products processed (inserted or updated).
/// All upserts run inside a single transaction; if any operation fails
/// the entire batch is rolled back.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails, including a
/// name that collides with a differently-slugged existing product.
pub async fn seed_catalog(pool: &PgPool, products: &[ProductSeed]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;

    for product in products {
        let slug = product.slug();
        let price = round_price(product.price);
        let category = product.category.trim().to_lowercase();

        sqlx::query(
            "INSERT INTO products (name, slug, price, category, image) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (slug) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 price = EXCLUDED.price, \
                 category = EXCLUDED.category, \
                 image = EXCLUDED.image, \
                 updated_at = NOW()",
        )
        .bind(product.name.trim())
        .bind(&slug)
        .bind(price)
        .bind(&category)
        .bind(product.image.trim())
        .execute(&mut *tx)
        .await?;

        count += 1;
    }

    tx.commit().await?;
    Ok(count)
}

/// Create the administrator account, or promote and re-key an existing
/// account with the same email.
///
/// `email` must already be normalized and `password_hash` already hashed.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] when `username` belongs to a different
/// account, or [`DbError::Sqlx`] if the query fails.
pub async fn seed_admin_account(
    pool: &PgPool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<UserRow, DbError> {
    sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (username, email, password_hash, role) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (email) DO UPDATE SET \
             password_hash = EXCLUDED.password_hash, \
             role = EXCLUDED.role, \
             updated_at = NOW() \
         RETURNING id, public_id, username, email, password_hash, role, created_at, updated_at",
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(Role::Admin.as_str())
    .fetch_one(pool)
    .await
    .map_err(DbError::from_unique_violation)
}
