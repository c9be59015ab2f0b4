//! Checkout and order storage: `orders` and their `order_items` snapshot lines.

use std::collections::HashMap;

use bazaar_core::{price_lines, quote_order, CustomerDetails, OrderStatus, ProductSnapshot};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `orders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub public_id: Uuid,
    pub user_id: i64,
    pub status: String,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub grand_total: Decimal,
    pub customer_name: String,
    pub customer_email: String,
    pub street: String,
    pub city: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A snapshot line. `name` and `image` are `None` when the product was
/// already gone at checkout.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderItemRow {
    pub order_id: i64,
    pub product_id: Uuid,
    pub name: Option<String>,
    pub image: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
}

/// An order annotated with the account that placed it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdminOrderRow {
    #[sqlx(flatten)]
    pub order: OrderRow,
    pub user_public_id: Uuid,
    pub username: String,
    pub user_email: String,
}

/// An order together with its lines.
#[derive(Debug, Clone)]
pub struct PlacedOrder<O = OrderRow> {
    pub order: O,
    pub items: Vec<OrderItemRow>,
}

#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    Placed(PlacedOrder),
    EmptyCart,
}

const ORDER_COLUMNS: &str = "o.id, o.public_id, o.user_id, o.status, o.subtotal, o.delivery_fee, \
     o.grand_total, o.customer_name, o.customer_email, o.street, o.city, o.created_at, o.updated_at";

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

/// Turn the user's cart into a pending order and remove the ordered lines
/// from the cart, atomically.
///
/// Cart lines are locked for the duration so a concurrent checkout or cart
/// edit waits instead of double-spending the same lines. A line inserted
/// while the checkout is in flight is neither ordered nor removed. Lines
/// whose product no longer exists are kept at a price of zero.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; nothing is written in that case.
pub async fn checkout(
    pool: &PgPool,
    user_id: i64,
    customer: &CustomerDetails,
) -> Result<CheckoutOutcome, DbError> {
    let mut tx = pool.begin().await?;

    let cart: Vec<(Uuid, i32)> = sqlx::query_as(
        "SELECT product_id, quantity FROM cart_items \
         WHERE user_id = $1 ORDER BY id FOR UPDATE",
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;

    if cart.is_empty() {
        return Ok(CheckoutOutcome::EmptyCart);
    }

    let ids: Vec<Uuid> = cart.iter().map(|(id, _)| *id).collect();
    let catalog: HashMap<Uuid, ProductSnapshot> =
        sqlx::query_as::<_, (Uuid, String, String, Decimal)>(
            "SELECT public_id, name, image, price FROM products WHERE public_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(id, name, image, price)| (id, ProductSnapshot { name, image, price }))
        .collect();

    let lines = price_lines(&cart, &catalog);
    let quote = quote_order(&lines, &customer.city);

    let order = sqlx::query_as::<_, OrderRow>(
        "INSERT INTO orders \
           (user_id, status, subtotal, delivery_fee, grand_total, \
            customer_name, customer_email, street, city) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING id, public_id, user_id, status, subtotal, delivery_fee, grand_total, \
                   customer_name, customer_email, street, city, created_at, updated_at",
    )
    .bind(user_id)
    .bind(OrderStatus::Pending.as_str())
    .bind(quote.subtotal)
    .bind(quote.delivery_fee)
    .bind(quote.grand_total)
    .bind(&customer.name)
    .bind(&customer.email)
    .bind(&customer.street)
    .bind(&customer.city)
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    for line in &lines {
        let item = sqlx::query_as::<_, OrderItemRow>(
            "INSERT INTO order_items (order_id, product_id, name, image, price, quantity) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING order_id, product_id, name, image, price, quantity",
        )
        .bind(order.id)
        .bind(line.product_id)
        .bind(line.name.as_deref())
        .bind(line.image.as_deref())
        .bind(line.unit_price)
        .bind(line.quantity)
        .fetch_one(&mut *tx)
        .await?;
        items.push(item);
    }

    // Only the lines priced above; lines added meanwhile stay in the cart.
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = ANY($2)")
        .bind(user_id)
        .bind(&ids)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(CheckoutOutcome::Placed(PlacedOrder { order, items }))
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// The user's orders, newest first, with their lines.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn list_orders_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<PlacedOrder>, DbError> {
    let orders = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders o \
         WHERE o.user_id = $1 \
         ORDER BY o.created_at DESC, o.id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
    let mut items = load_items(pool, &ids).await?;

    Ok(orders
        .into_iter()
        .map(|order| PlacedOrder {
            items: items.remove(&order.id).unwrap_or_default(),
            order,
        })
        .collect())
}

/// Every order across all users, newest first, with owner details and lines.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn list_all_orders(pool: &PgPool) -> Result<Vec<PlacedOrder<AdminOrderRow>>, DbError> {
    let orders = sqlx::query_as::<_, AdminOrderRow>(&format!(
        "SELECT {ORDER_COLUMNS}, u.public_id AS user_public_id, u.username, u.email AS user_email \
         FROM orders o \
         JOIN users u ON u.id = o.user_id \
         ORDER BY o.created_at DESC, o.id DESC"
    ))
    .fetch_all(pool)
    .await?;

    let ids: Vec<i64> = orders.iter().map(|o| o.order.id).collect();
    let mut items = load_items(pool, &ids).await?;

    Ok(orders
        .into_iter()
        .map(|order| PlacedOrder {
            items: items.remove(&order.order.id).unwrap_or_default(),
            order,
        })
        .collect())
}

async fn load_items(pool: &PgPool, order_ids: &[i64]) -> Result<HashMap<i64, Vec<OrderItemRow>>, DbError> {
    if order_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, OrderItemRow>(
        "SELECT order_id, product_id, name, image, price, quantity \
         FROM order_items WHERE order_id = ANY($1) ORDER BY id",
    )
    .bind(order_ids)
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<i64, Vec<OrderItemRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.order_id).or_default().push(row);
    }
    Ok(grouped)
}

// ---------------------------------------------------------------------------
// Admin writes
// ---------------------------------------------------------------------------

/// Set an order's status. Any status may replace any other.
///
/// Returns `false` when no order has this public id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn update_order_status(
    pool: &PgPool,
    public_id: Uuid,
    status: OrderStatus,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE orders SET status = $2, updated_at = NOW() WHERE public_id = $1",
    )
    .bind(public_id)
    .bind(status.as_str())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete an order and its lines. Returns `false` when no order has this public id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn delete_order(pool: &PgPool, public_id: Uuid) -> Result<bool, DbError> {
    // order_items rows follow through ON DELETE CASCADE.
    let result = sqlx::query("DELETE FROM orders WHERE public_id = $1")
        .bind(public_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
