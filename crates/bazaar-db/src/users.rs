//! Database operations for the `users` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `users` table. `password_hash` never leaves the server.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub public_id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin listing row: a user plus how many orders they have placed.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserSummaryRow {
    pub public_id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub order_count: i64,
}

const USER_COLUMNS: &str =
    "id, public_id, username, email, password_hash, role, created_at, updated_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Insert a new account with the given role.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] when the username or email is already taken,
/// or [`DbError::Sqlx`] if the query fails.
pub async fn create_user(
    pool: &PgPool,
    username: &str,
    email: &str,
    password_hash: &str,
    role: &str,
) -> Result<UserRow, DbError> {
    sqlx::query_as::<_, UserRow>(&format!(
        "INSERT INTO users (username, email, password_hash, role) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await
    .map_err(DbError::from_unique_violation)
}

/// Look up a user by (already normalized) email.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Look up a user by public id, as carried in session tokens.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user_by_public_id(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE public_id = $1"
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Returns `true` if either the username or the email already belongs to an account.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn username_or_email_taken(
    pool: &PgPool,
    username: &str,
    email: &str,
) -> Result<bool, DbError> {
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 OR email = $2)",
    )
    .bind(username)
    .bind(email)
    .fetch_one(pool)
    .await?;
    Ok(taken)
}

/// All users with their order counts, newest account first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_users(pool: &PgPool) -> Result<Vec<UserSummaryRow>, DbError> {
    let rows = sqlx::query_as::<_, UserSummaryRow>(
        "SELECT u.public_id, u.username, u.email, u.role, u.created_at, \
                COUNT(o.id) AS order_count \
         FROM users u \
         LEFT JOIN orders o ON o.user_id = u.id \
         GROUP BY u.id \
         ORDER BY u.created_at DESC, u.id DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Delete a user. Carts, wishlists and orders go with it via `ON DELETE CASCADE`.
///
/// Returns `false` when no such user exists.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn delete_user(pool: &PgPool, public_id: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM users WHERE public_id = $1")
        .bind(public_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
