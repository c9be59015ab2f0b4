//! Catalog write handlers: create, update, delete.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use bazaar_core::{max_price, round_price, slugify};
use bazaar_db::{DbError, NewProduct, ProductPatch};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::super::products::ProductItem;
use super::super::{map_db_error, ApiError, ApiResponse, AppState, JsonBody};

const DUPLICATE_NAME: &str = "Product name already exists";

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(in crate::api) struct CreateProductRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct UpdateProductRequest {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct DeletedProduct {
    pub slug: String,
    pub cart_lines_removed: u64,
    pub wishlist_entries_removed: u64,
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Round to cents, rejecting negative prices and prices the column cannot hold.
fn validate_price(rid: &str, price: Decimal) -> Result<Decimal, ApiError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ApiError::new(
            rid,
            "bad_request",
            "Price must not be negative",
        ));
    }
    let price = round_price(price);
    if price > max_price() {
        return Err(ApiError::new(
            rid,
            "bad_request",
            format!("Price must not exceed {}", max_price()),
        ));
    }
    Ok(price)
}

/// Present-but-blank fields in a patch are errors rather than no-ops.
fn patch_field<'a>(rid: &str, field: &str, value: Option<&'a str>) -> Result<Option<&'a str>, ApiError> {
    match value {
        None => Ok(None),
        Some(v) => non_blank(Some(v))
            .map(Some)
            .ok_or_else(|| ApiError::new(rid, "bad_request", format!("{field} cannot be empty"))),
    }
}

fn map_write_error(rid: &str, error: &DbError) -> ApiError {
    match error {
        DbError::Conflict(constraint) if constraint == "products_slug_key" => {
            ApiError::new(rid, "bad_request", "Product slug already exists")
        }
        DbError::Conflict(_) => ApiError::new(rid, "bad_request", DUPLICATE_NAME),
        DbError::NotFound => ApiError::new(rid, "not_found", "Product not found"),
        other => map_db_error(rid.to_owned(), other),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /admin/products
pub(in crate::api) async fn create_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    JsonBody(body): JsonBody<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductItem>>), ApiError> {
    let rid = req_id.0;

    let (Some(name), Some(price), Some(category), Some(image)) = (
        non_blank(body.name.as_deref()),
        body.price,
        non_blank(body.category.as_deref()),
        non_blank(body.image.as_deref()),
    ) else {
        return Err(ApiError::new(&rid, "bad_request", "Missing fields"));
    };
    let price = validate_price(&rid, price)?;
    let category = category.to_lowercase();

    let taken = bazaar_db::name_taken(&state.pool, name, None)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if taken {
        return Err(ApiError::new(&rid, "bad_request", DUPLICATE_NAME));
    }

    // An explicit slug is honoured when it survives slugification and is free.
    let requested = body.slug.as_deref().map(slugify).filter(|s| !s.is_empty());
    let requested_is_free = match &requested {
        Some(slug) => !bazaar_db::slug_exists(&state.pool, slug)
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?,
        None => false,
    };
    let slug = match requested {
        Some(slug) if requested_is_free => slug,
        _ => bazaar_db::generate_unique_slug(&state.pool, name)
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?,
    };

    let row = bazaar_db::create_product(
        &state.pool,
        &NewProduct {
            name,
            slug: &slug,
            price,
            category: &category,
            image,
        },
    )
    .await
    .map_err(|e| map_write_error(&rid, &e))?;

    tracing::info!(request_id = %rid, slug = %row.slug, "product created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(rid, row.into())),
    ))
}

/// PATCH /admin/products/{slug} — the slug is kept across renames.
pub(in crate::api) async fn update_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(slug): Path<String>,
    JsonBody(body): JsonBody<UpdateProductRequest>,
) -> Result<Json<ApiResponse<ProductItem>>, ApiError> {
    let rid = req_id.0;

    let existing = bazaar_db::get_product_by_slug(&state.pool, &slug)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(&rid, "not_found", "Product not found"))?;

    let name = patch_field(&rid, "name", body.name.as_deref())?;
    let category = patch_field(&rid, "category", body.category.as_deref())?.map(str::to_lowercase);
    let image = patch_field(&rid, "image", body.image.as_deref())?;
    let price = body.price.map(|p| validate_price(&rid, p)).transpose()?;

    if let Some(name) = name {
        let taken = bazaar_db::name_taken(&state.pool, name, Some(existing.id))
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?;
        if taken {
            return Err(ApiError::new(&rid, "bad_request", DUPLICATE_NAME));
        }
    }

    let row = bazaar_db::update_product(
        &state.pool,
        existing.id,
        &ProductPatch {
            name,
            price,
            category: category.as_deref(),
            image,
        },
    )
    .await
    .map_err(|e| map_write_error(&rid, &e))?;

    tracing::info!(request_id = %rid, slug = %row.slug, "product updated");

    Ok(Json(ApiResponse::new(rid, row.into())))
}

/// DELETE /admin/products/{slug} — also clears the product from every cart and wishlist.
pub(in crate::api) async fn delete_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<DeletedProduct>>, ApiError> {
    let rid = req_id.0;

    let existing = bazaar_db::get_product_by_slug(&state.pool, &slug)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(&rid, "not_found", "Product not found"))?;

    let removal = bazaar_db::delete_product_cascade(&state.pool, existing.public_id)
        .await
        .map_err(|e| map_write_error(&rid, &e))?;

    tracing::info!(
        request_id = %rid,
        slug = %existing.slug,
        cart_lines_removed = removal.cart_lines_removed,
        wishlist_entries_removed = removal.wishlist_entries_removed,
        "product deleted"
    );

    Ok(Json(ApiResponse::new(
        rid,
        DeletedProduct {
            slug: existing.slug,
            cart_lines_removed: removal.cart_lines_removed,
            wishlist_entries_removed: removal.wishlist_entries_removed,
        },
    )))
}
