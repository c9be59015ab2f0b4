use axum::{extract::State, http::StatusCode, Extension, Json};
use bazaar_core::CustomerDetails;
use bazaar_db::{CheckoutOutcome, OrderItemRow, OrderRow, PlacedOrder};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;
use crate::session::Session;

use super::{map_db_error, require_shopper, shopper, ApiError, ApiResponse, AppState, JsonBody};

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub(in crate::api) struct AddressRequest {
    pub street: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct CheckoutRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub address: AddressRequest,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(in crate::api) struct OrderLineItem {
    pub product_id: Uuid,
    pub name: Option<String>,
    pub image: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct AddressItem {
    pub street: String,
    pub city: String,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct OrderItem {
    pub id: Uuid,
    pub status: String,
    pub items: Vec<OrderLineItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub delivery_fee: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub grand_total: Decimal,
    pub customer_name: String,
    pub customer_email: String,
    pub address: AddressItem,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderItemRow> for OrderLineItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            product_id: row.product_id,
            name: row.name,
            image: row.image,
            price: row.price,
            quantity: row.quantity,
        }
    }
}

impl OrderItem {
    pub(in crate::api) fn from_parts(order: OrderRow, items: Vec<OrderItemRow>) -> Self {
        Self {
            id: order.public_id,
            status: order.status,
            items: items.into_iter().map(OrderLineItem::from).collect(),
            subtotal: order.subtotal,
            delivery_fee: order.delivery_fee,
            grand_total: order.grand_total,
            customer_name: order.customer_name,
            customer_email: order.customer_email,
            address: AddressItem {
                street: order.street,
                city: order.city,
            },
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

impl From<PlacedOrder> for OrderItem {
    fn from(placed: PlacedOrder) -> Self {
        Self::from_parts(placed.order, placed.items)
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /orders — newest first.
pub(in crate::api) async fn list_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<Session>,
) -> Result<Json<ApiResponse<Vec<OrderItem>>>, ApiError> {
    let rid = req_id.0;
    let orders = match shopper(&state, &session, &rid).await? {
        Some(user) => bazaar_db::list_orders_for_user(&state.pool, user.id)
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?
            .into_iter()
            .map(OrderItem::from)
            .collect(),
        None => Vec::new(),
    };
    Ok(Json(ApiResponse::new(rid, orders)))
}

/// POST /orders/checkout — snapshot the cart into a pending order and empty it.
pub(in crate::api) async fn checkout(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<Session>,
    JsonBody(body): JsonBody<CheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderItem>>), ApiError> {
    let rid = req_id.0;
    let user = require_shopper(&state, &session, &rid).await?;

    let customer = CustomerDetails::new(
        body.name.as_deref(),
        body.email.as_deref(),
        body.address.street.as_deref(),
        body.address.city.as_deref(),
    )
    .map_err(|e| ApiError::new(&rid, "bad_request", e.to_string()))?;

    let placed = match bazaar_db::checkout(&state.pool, user.id, &customer)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
    {
        CheckoutOutcome::Placed(placed) => placed,
        CheckoutOutcome::EmptyCart => {
            return Err(ApiError::new(&rid, "bad_request", "Cart is empty"));
        }
    };

    tracing::info!(
        request_id = %rid,
        order_id = %placed.order.public_id,
        user_id = %user.public_id,
        grand_total = %placed.order.grand_total,
        "order placed"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(rid, placed.into())),
    ))
}
