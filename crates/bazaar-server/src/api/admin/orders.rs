use axum::{
    extract::{Path, State},
    Extension, Json,
};
use bazaar_core::OrderStatus;
use bazaar_db::{AdminOrderRow, PlacedOrder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::super::orders::OrderItem;
use super::super::{map_db_error, ApiError, ApiResponse, AppState, JsonBody};
use super::parse_public_id;

#[derive(Debug, Deserialize)]
pub(in crate::api) struct StatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct OrderOwner {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct AdminOrderItem {
    #[serde(flatten)]
    pub order: OrderItem,
    pub user: OrderOwner,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct OrderStatusItem {
    pub id: Uuid,
    pub status: OrderStatus,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct DeletedOrder {
    pub id: Uuid,
    pub deleted: bool,
}

impl From<PlacedOrder<AdminOrderRow>> for AdminOrderItem {
    fn from(placed: PlacedOrder<AdminOrderRow>) -> Self {
        let AdminOrderRow {
            order,
            user_public_id,
            username,
            user_email,
        } = placed.order;
        Self {
            order: OrderItem::from_parts(order, placed.items),
            user: OrderOwner {
                id: user_public_id,
                username,
                email: user_email,
            },
        }
    }
}

/// GET /admin/orders — every order, newest first.
pub(in crate::api) async fn list_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<AdminOrderItem>>>, ApiError> {
    let orders = bazaar_db::list_all_orders(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        orders.into_iter().map(AdminOrderItem::from).collect(),
    )))
}

/// PATCH /admin/orders/{order_id}
///
/// The status is validated before the order is looked up, so an invalid
/// status never changes anything.
pub(in crate::api) async fn update_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(order_id): Path<String>,
    JsonBody(body): JsonBody<StatusRequest>,
) -> Result<Json<ApiResponse<OrderStatusItem>>, ApiError> {
    let rid = req_id.0;

    let status = body
        .status
        .as_deref()
        .and_then(|s| s.parse::<OrderStatus>().ok())
        .ok_or_else(|| ApiError::new(&rid, "bad_request", "Invalid status"))?;
    let order_id = parse_public_id(&rid, &order_id, "Order not found")?;

    let updated = bazaar_db::update_order_status(&state.pool, order_id, status)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !updated {
        return Err(ApiError::new(&rid, "not_found", "Order not found"));
    }

    tracing::info!(request_id = %rid, %order_id, %status, "order status changed");

    Ok(Json(ApiResponse::new(
        rid,
        OrderStatusItem {
            id: order_id,
            status,
        },
    )))
}

/// DELETE /admin/orders/{order_id}
pub(in crate::api) async fn delete_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<DeletedOrder>>, ApiError> {
    let rid = req_id.0;
    let order_id = parse_public_id(&rid, &order_id, "Order not found")?;

    let deleted = bazaar_db::delete_order(&state.pool, order_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !deleted {
        return Err(ApiError::new(&rid, "not_found", "Order not found"));
    }

    tracing::info!(request_id = %rid, %order_id, "order deleted");

    Ok(Json(ApiResponse::new(
        rid,
        DeletedOrder {
            id: order_id,
            deleted: true,
        },
    )))
}
