//! Database operations for the `cart_items` table.

use bazaar_core::MAX_LINE_QUANTITY;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// One cart line. `product_id` is a product public id and may name a product
/// that has since been deleted.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CartItemRow {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// The user's cart lines in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_cart(pool: &PgPool, user_id: i64) -> Result<Vec<CartItemRow>, DbError> {
    let rows = sqlx::query_as::<_, CartItemRow>(
        "SELECT product_id, quantity FROM cart_items WHERE user_id = $1 ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Add `quantity` of a product, merging into an existing line by incrementing it.
/// A merged line is capped at [`MAX_LINE_QUANTITY`]. Returns the line's
/// resulting quantity.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn add_to_cart(
    pool: &PgPool,
    user_id: i64,
    product_id: Uuid,
    quantity: i32,
) -> Result<i32, DbError> {
    let total: i32 = sqlx::query_scalar(
        "INSERT INTO cart_items (user_id, product_id, quantity) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (user_id, product_id) DO UPDATE SET \
             quantity = LEAST(cart_items.quantity + EXCLUDED.quantity, $4), \
             updated_at = NOW() \
         RETURNING quantity",
    )
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .bind(MAX_LINE_QUANTITY)
    .fetch_one(pool)
    .await?;
    Ok(total)
}

/// Overwrite the quantity of an existing line. Returns `false` when the
/// product is not in the cart.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn set_cart_quantity(
    pool: &PgPool,
    user_id: i64,
    product_id: Uuid,
    quantity: i32,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE cart_items SET quantity = $3, updated_at = NOW() \
         WHERE user_id = $1 AND product_id = $2",
    )
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Remove a line. Returns how many rows went away (0 or 1).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn remove_from_cart(pool: &PgPool, user_id: i64, product_id: Uuid) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
