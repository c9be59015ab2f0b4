use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use bazaar_db::ProductRow;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(in crate::api) struct ProductListQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct ProductItem {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub category: String,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductRow> for ProductItem {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.public_id,
            name: row.name,
            slug: row.slug,
            price: row.price,
            category: row.category,
            image: row.image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct ShippingCityItem {
    pub name: &'static str,
    #[serde(with = "rust_decimal::serde::float")]
    pub fee: Decimal,
}

pub(in crate::api) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<ApiResponse<Vec<ProductItem>>>, ApiError> {
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let rows = bazaar_db::list_products(&state.pool, category)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        rows.into_iter().map(ProductItem::from).collect(),
    )))
}

pub(in crate::api) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<ProductItem>>, ApiError> {
    let row = bazaar_db::get_product_by_slug(&state.pool, &slug)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "Product not found"))?;

    Ok(Json(ApiResponse::new(req_id.0, row.into())))
}

/// GET /search?q= — blank queries return an empty list without touching the database.
pub(in crate::api) async fn search_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<ProductItem>>>, ApiError> {
    let q = query.q.as_deref().map(str::trim).unwrap_or_default();
    if q.is_empty() {
        return Ok(Json(ApiResponse::new(req_id.0, Vec::new())));
    }

    let rows = bazaar_db::search_products(&state.pool, q)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        rows.into_iter().map(ProductItem::from).collect(),
    )))
}

pub(in crate::api) async fn list_shipping_cities(
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<Vec<ShippingCityItem>>> {
    let cities = bazaar_core::shipping_cities()
        .iter()
        .map(|city| ShippingCityItem {
            name: city.name,
            fee: city.fee(),
        })
        .collect();

    Json(ApiResponse::new(req_id.0, cities))
}
