use std::collections::HashMap;

use axum::{extract::State, Extension, Json};
use bazaar_core::{validate_add_quantity, CartUpdate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;
use crate::session::Session;

use super::products::ProductItem;
use super::{map_db_error, require_shopper, shopper, ApiError, ApiResponse, AppState, JsonBody};

#[derive(Debug, Deserialize)]
pub(in crate::api) struct CartItemRequest {
    #[serde(alias = "productId")]
    pub product_id: Option<Uuid>,
    pub quantity: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct CartLineItem {
    pub product_id: Uuid,
    pub quantity: i32,
    /// `None` once the product has been removed from the catalog.
    pub product: Option<ProductItem>,
}

fn required_product_id(rid: &str, body: &CartItemRequest) -> Result<Uuid, ApiError> {
    body.product_id
        .ok_or_else(|| ApiError::new(rid, "bad_request", "product_id is required"))
}

/// The user's cart lines in insertion order, each joined to its current product.
async fn cart_view(state: &AppState, user_id: i64, rid: &str) -> Result<Vec<CartLineItem>, ApiError> {
    let lines = bazaar_db::list_cart(&state.pool, user_id)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;

    let ids: Vec<Uuid> = lines.iter().map(|line| line.product_id).collect();
    let mut products: HashMap<Uuid, ProductItem> =
        bazaar_db::get_products_by_public_ids(&state.pool, &ids)
            .await
            .map_err(|e| map_db_error(rid.to_owned(), &e))?
            .into_iter()
            .map(|row| (row.public_id, ProductItem::from(row)))
            .collect();

    Ok(lines
        .into_iter()
        .map(|line| CartLineItem {
            product: products.remove(&line.product_id),
            product_id: line.product_id,
            quantity: line.quantity,
        })
        .collect())
}

/// GET /cart
pub(in crate::api) async fn get_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<Session>,
) -> Result<Json<ApiResponse<Vec<CartLineItem>>>, ApiError> {
    let rid = req_id.0;
    let lines = match shopper(&state, &session, &rid).await? {
        Some(user) => cart_view(&state, user.id, &rid).await?,
        None => Vec::new(),
    };
    Ok(Json(ApiResponse::new(rid, lines)))
}

/// POST /cart/add — merges into an existing line.
pub(in crate::api) async fn add_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<Session>,
    JsonBody(body): JsonBody<CartItemRequest>,
) -> Result<Json<ApiResponse<Vec<CartLineItem>>>, ApiError> {
    let rid = req_id.0;
    let user = require_shopper(&state, &session, &rid).await?;

    let product_id = required_product_id(&rid, &body)?;
    let quantity = validate_add_quantity(body.quantity)
        .map_err(|e| ApiError::new(&rid, "bad_request", e.to_string()))?;

    let exists = bazaar_db::get_product_by_public_id(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .is_some();
    if !exists {
        return Err(ApiError::new(&rid, "not_found", "Product not found"));
    }

    let total = bazaar_db::add_to_cart(&state.pool, user.id, product_id, quantity)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    tracing::debug!(request_id = %rid, %product_id, quantity = total, "cart line added");

    let lines = cart_view(&state, user.id, &rid).await?;
    Ok(Json(ApiResponse::new(rid, lines)))
}

/// POST /cart/update — a quantity of zero or less removes the line.
pub(in crate::api) async fn update_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<Session>,
    JsonBody(body): JsonBody<CartItemRequest>,
) -> Result<Json<ApiResponse<Vec<CartLineItem>>>, ApiError> {
    let rid = req_id.0;
    let user = require_shopper(&state, &session, &rid).await?;

    let product_id = required_product_id(&rid, &body)?;
    let quantity = body
        .quantity
        .ok_or_else(|| ApiError::new(&rid, "bad_request", "quantity is required"))?;
    let update = CartUpdate::from_quantity(quantity)
        .map_err(|e| ApiError::new(&rid, "bad_request", e.to_string()))?;

    let found = match update {
        CartUpdate::Set(quantity) => {
            bazaar_db::set_cart_quantity(&state.pool, user.id, product_id, quantity)
                .await
                .map_err(|e| map_db_error(rid.clone(), &e))?
        }
        CartUpdate::Remove => {
            bazaar_db::remove_from_cart(&state.pool, user.id, product_id)
                .await
                .map_err(|e| map_db_error(rid.clone(), &e))?
                > 0
        }
    };
    if !found {
        return Err(ApiError::new(&rid, "not_found", "Item not in cart"));
    }

    let lines = cart_view(&state, user.id, &rid).await?;
    Ok(Json(ApiResponse::new(rid, lines)))
}

/// POST /cart/remove
pub(in crate::api) async fn remove_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<Session>,
    JsonBody(body): JsonBody<CartItemRequest>,
) -> Result<Json<ApiResponse<Vec<CartLineItem>>>, ApiError> {
    let rid = req_id.0;
    let user = require_shopper(&state, &session, &rid).await?;
    let product_id = required_product_id(&rid, &body)?;

    bazaar_db::remove_from_cart(&state.pool, user.id, product_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let lines = cart_view(&state, user.id, &rid).await?;
    Ok(Json(ApiResponse::new(rid, lines)))
}
