//! Database operations for the `wishlist_items` table.

use sqlx::PgPool;
use uuid::Uuid;

use crate::products::ProductRow;
use crate::DbError;

/// Wishlisted product ids in the order they were added.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_wishlist_ids(pool: &PgPool, user_id: i64) -> Result<Vec<Uuid>, DbError> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        "SELECT product_id FROM wishlist_items WHERE user_id = $1 ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// Wishlisted products that still exist, in the order they were added.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_wishlist_products(pool: &PgPool, user_id: i64) -> Result<Vec<ProductRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT p.id, p.public_id, p.name, p.slug, p.price, p.category, p.image, \
                p.created_at, p.updated_at \
         FROM wishlist_items w \
         JOIN products p ON p.public_id = w.product_id \
         WHERE w.user_id = $1 \
         ORDER BY w.id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Remove the product from the wishlist if present, otherwise add it.
///
/// Returns whether the product is wishlisted afterwards together with the
/// resulting id list.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails (the transaction is rolled back).
pub async fn toggle_wishlist(
    pool: &PgPool,
    user_id: i64,
    product_id: Uuid,
) -> Result<(bool, Vec<Uuid>), DbError> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let added = removed == 0;
    if added {
        sqlx::query(
            "INSERT INTO wishlist_items (user_id, product_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, product_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(&mut *tx)
        .await?;
    }

    let ids = sqlx::query_scalar::<_, Uuid>(
        "SELECT product_id FROM wishlist_items WHERE user_id = $1 ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((added, ids))
}
