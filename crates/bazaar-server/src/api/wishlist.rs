use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;
use crate::session::Session;

use super::products::ProductItem;
use super::{map_db_error, require_shopper, shopper, ApiError, ApiResponse, AppState, JsonBody};

#[derive(Debug, Deserialize)]
pub(in crate::api) struct ToggleRequest {
    #[serde(alias = "productId")]
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct ToggleResponse {
    pub wishlisted: bool,
    pub wishlist: Vec<Uuid>,
}

/// GET /wishlist — entries for deleted products are skipped.
pub(in crate::api) async fn get_wishlist(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<Session>,
) -> Result<Json<ApiResponse<Vec<ProductItem>>>, ApiError> {
    let rid = req_id.0;
    let products = match shopper(&state, &session, &rid).await? {
        Some(user) => bazaar_db::list_wishlist_products(&state.pool, user.id)
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?
            .into_iter()
            .map(ProductItem::from)
            .collect(),
        None => Vec::new(),
    };
    Ok(Json(ApiResponse::new(rid, products)))
}

/// POST /wishlist/toggle
pub(in crate::api) async fn toggle(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<Session>,
    JsonBody(body): JsonBody<ToggleRequest>,
) -> Result<Json<ApiResponse<ToggleResponse>>, ApiError> {
    let rid = req_id.0;
    let user = require_shopper(&state, &session, &rid).await?;
    let product_id = body
        .product_id
        .ok_or_else(|| ApiError::new(&rid, "bad_request", "product_id is required"))?;

    let (wishlisted, wishlist) = bazaar_db::toggle_wishlist(&state.pool, user.id, product_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        rid,
        ToggleResponse {
            wishlisted,
            wishlist,
        },
    )))
}
