//! Admin-only routes. Every route here sits behind the session and admin layers.

mod orders;
mod products;
mod uploads;
mod users;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
    Router,
};

use uuid::Uuid;

use super::{ApiError, AppState};

/// Multipart framing allowance on top of the configured image size limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub(super) fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(users::list_users))
        .route("/admin/users/{user_id}", delete(users::delete_user))
        .route("/admin/products", post(products::create_product))
        .route(
            "/admin/products/{slug}",
            patch(products::update_product).delete(products::delete_product),
        )
        .route("/admin/orders", get(orders::list_orders))
        .route(
            "/admin/orders/{order_id}",
            patch(orders::update_status).delete(orders::delete_order),
        )
        .route(
            "/upload",
            post(uploads::upload_image).layer(DefaultBodyLimit::max(
                max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
            )),
        )
}

/// Parse a public id from a path segment. Anything that is not a UUID cannot
/// name an existing record, so it is reported as `not_found`.
fn parse_public_id(rid: &str, raw: &str, not_found: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::new(rid, "not_found", not_found))
}
