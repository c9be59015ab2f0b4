use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::{ApiError, AppState};
use crate::session::{Session, SESSION_COOKIE};

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    /// Request id of `req`, or an empty string when the request-id layer did not run.
    fn of(req: &Request) -> String {
        req.extensions()
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter shared by every request routed through it.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware requiring a valid session cookie. On success the decoded
/// [`Session`] is inserted into request extensions.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let rid = RequestId::of(&req);
    let jar = CookieJar::from_headers(req.headers());

    let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned()) else {
        tracing::debug!(request_id = %rid, "no session cookie");
        return ApiError::new(rid, "unauthorized", "Not authenticated").into_response();
    };

    match state.tokens.verify(&token) {
        Ok(session) => {
            req.extensions_mut().insert(session);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(request_id = %rid, error = %e, "session token rejected");
            ApiError::new(rid, "unauthorized", "Invalid or expired session").into_response()
        }
    }
}

/// Middleware admitting only admin sessions. Must run after [`require_session`].
pub async fn require_admin(req: Request, next: Next) -> Response {
    let is_admin = req
        .extensions()
        .get::<Session>()
        .is_some_and(Session::is_admin);

    if is_admin {
        next.run(req).await
    } else {
        let rid = RequestId::of(&req);
        tracing::debug!(request_id = %rid, "non-admin session on admin route");
        ApiError::new(rid, "forbidden", "Admin access required").into_response()
    }
}

/// Middleware enforcing a fixed request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.state.lock().await;
    let elapsed = window.started_at.elapsed();

    if elapsed >= rate_limit.window {
        window.started_at = Instant::now();
        window.count = 0;
    }

    if window.count >= rate_limit.max_requests {
        drop(window);
        return ApiError::new(RequestId::of(&req), "rate_limited", "Too many requests")
            .into_response();
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}
