mod account;
mod admin;
mod cart;
mod orders;
mod products;
mod wishlist;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
    extract::{FromRequest, Request, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use bazaar_core::AppConfig;
use bazaar_db::UserRow;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

use crate::middleware::{
    enforce_rate_limit, request_id, require_admin, require_session, RateLimitState, RequestId,
};
use crate::session::{Session, TokenService};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub tokens: TokenService,
    pub uploads: Arc<UploadSettings>,
    pub cors_origin: HeaderValue,
}

/// Where uploaded images go and how they are addressed afterwards.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub dir: PathBuf,
    pub max_bytes: usize,
    /// Absolute origin prefixed to `/uploads/...` paths, without a trailing slash.
    pub public_url: String,
}

impl AppState {
    /// # Errors
    ///
    /// Fails when the configured CORS origin is not a valid header value.
    pub fn from_config(pool: PgPool, config: &AppConfig) -> anyhow::Result<Self> {
        let cors_origin = HeaderValue::from_str(&config.cors_origin).map_err(|e| {
            anyhow::anyhow!("BAZAAR_CORS_ORIGIN '{}' is invalid: {e}", config.cors_origin)
        })?;

        Ok(Self {
            pool,
            tokens: TokenService::new(
                &config.jwt_secret,
                config.session_ttl_days,
                config.cookie_secure,
            ),
            uploads: Arc::new(UploadSettings {
                dir: config.upload_dir.clone(),
                max_bytes: config.upload_max_bytes,
                public_url: config.public_url.clone(),
            }),
            cors_origin,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Error body: `{ "message", "code", "meta" }`. The status is derived from `code`.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
    pub code: String,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(request_id: String, data: T) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(self)).into_response()
    }
}

pub(super) fn map_db_error(request_id: String, error: &bazaar_db::DbError) -> ApiError {
    tracing::error!(request_id = %request_id, error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "Internal server error")
}

/// `Json` extractor whose rejections are reported as 400 [`ApiError`]s.
pub(super) struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let rid = req
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_default();

        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::new(rid, "bad_request", rejection.body_text())),
        }
    }
}

/// The non-admin account behind `session`, or `None` for admins and for
/// sessions whose user has since been deleted.
pub(super) async fn shopper(
    state: &AppState,
    session: &Session,
    rid: &str,
) -> Result<Option<UserRow>, ApiError> {
    if session.is_admin() {
        return Ok(None);
    }
    bazaar_db::get_user_by_public_id(&state.pool, session.user_id)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))
}

/// Like [`shopper`], but for mutations: admins get 403, vanished users 401.
pub(super) async fn require_shopper(
    state: &AppState,
    session: &Session,
    rid: &str,
) -> Result<UserRow, ApiError> {
    if session.is_admin() {
        return Err(ApiError::new(
            rid,
            "forbidden",
            "Admin accounts cannot shop",
        ));
    }
    shopper(state, session, rid)
        .await?
        .ok_or_else(|| ApiError::new(rid, "unauthorized", "User not found"))
}

fn build_cors(origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

fn public_router(rate_limit: RateLimitState) -> Router<AppState> {
    let credential_routes = Router::new()
        .route("/register", post(account::register))
        .route("/login", post(account::login))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/products", get(products::list_products))
        .route("/products/{slug}", get(products::get_product))
        .route("/search", get(products::search_products))
        .route("/shipping/cities", get(products::list_shipping_cities))
        .route("/me", get(account::me))
        .route("/logout", post(account::logout))
        .merge(credential_routes)
}

fn shopper_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/cart", get(cart::get_cart))
        .route("/cart/add", post(cart::add_item))
        .route("/cart/update", post(cart::update_item))
        .route("/cart/remove", post(cart::remove_item))
        .route("/wishlist", get(wishlist::get_wishlist))
        .route("/wishlist/toggle", post(wishlist::toggle))
        .route("/orders", get(orders::list_orders))
        .route("/orders/checkout", post(orders::checkout))
        .layer(axum::middleware::from_fn_with_state(state, require_session))
}

fn admin_router(state: AppState) -> Router<AppState> {
    admin::router(state.uploads.max_bytes).layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(state, require_session))
                .layer(axum::middleware::from_fn(require_admin)),
        )
}

pub fn build_app(state: AppState, rate_limit: RateLimitState) -> Router {
    let uploads = ServeDir::new(&state.uploads.dir);

    Router::new()
        .merge(public_router(rate_limit))
        .merge(shopper_router(state.clone()))
        .merge(admin_router(state.clone()))
        .nest_service("/uploads", uploads)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_id))
                .layer(TraceLayer::new_for_http())
                .layer(build_cors(state.cors_origin.clone()))
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match bazaar_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

/// Limiter for the credential endpoints: 60 attempts per minute across all clients.
pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(60, Duration::from_secs(60))
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
