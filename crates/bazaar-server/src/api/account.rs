//! Registration, login and session introspection.

use axum::{extract::State, http::StatusCode, Extension, Json};
use axum_extra::extract::cookie::CookieJar;
use bazaar_core::{normalize_email, password, NewAccount, Role};
use bazaar_db::{DbError, UserRow};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;
use crate::session::{Session, SESSION_COOKIE};

use super::{map_db_error, ApiError, ApiResponse, AppState, JsonBody};

const DUPLICATE_ACCOUNT: &str = "Username or email already taken";
const BAD_CREDENTIALS: &str = "Invalid email or password";

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(in crate::api) struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct UserItem {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct MeResponse {
    pub user: Option<UserItem>,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct MessageResponse {
    pub message: &'static str,
}

impl From<Session> for UserItem {
    fn from(session: Session) -> Self {
        Self {
            id: session.user_id,
            username: session.username,
            email: session.email,
            role: session.role,
        }
    }
}

fn session_for(rid: &str, row: &UserRow) -> Result<Session, ApiError> {
    let role = row.role.parse::<Role>().map_err(|e| {
        tracing::error!(request_id = %rid, error = %e, "stored user has an unknown role");
        ApiError::new(rid, "internal_error", "Internal server error")
    })?;
    Ok(Session {
        user_id: row.public_id,
        email: row.email.clone(),
        username: row.username.clone(),
        role,
    })
}

/// Issue a token for `session` and attach it to `jar`.
fn sign_in(
    state: &AppState,
    rid: &str,
    jar: CookieJar,
    session: &Session,
) -> Result<CookieJar, ApiError> {
    let token = state.tokens.issue(session).map_err(|e| {
        tracing::error!(request_id = %rid, error = %e, "failed to sign session token");
        ApiError::new(rid, "internal_error", "Internal server error")
    })?;
    Ok(jar.add(state.tokens.session_cookie(token)))
}

fn hashing_failed(rid: &str, error: &dyn std::fmt::Display) -> ApiError {
    tracing::error!(request_id = %rid, error = %error, "password hashing failed");
    ApiError::new(rid, "internal_error", "Internal server error")
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /register
pub(in crate::api) async fn register(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    jar: CookieJar,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<ApiResponse<UserItem>>), ApiError> {
    let rid = req_id.0;

    let account = NewAccount::new(
        body.username.as_deref(),
        body.email.as_deref(),
        body.password.as_deref(),
    )
    .map_err(|e| ApiError::new(&rid, "bad_request", e.to_string()))?;

    let taken = bazaar_db::username_or_email_taken(&state.pool, &account.username, &account.email)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if taken {
        return Err(ApiError::new(&rid, "bad_request", DUPLICATE_ACCOUNT));
    }

    let plain = account.password.clone();
    let hash = tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| hashing_failed(&rid, &e))?
        .map_err(|e| hashing_failed(&rid, &e))?;

    let row = bazaar_db::create_user(
        &state.pool,
        &account.username,
        &account.email,
        &hash,
        Role::User.as_str(),
    )
    .await
    .map_err(|e| match e {
        DbError::Conflict(_) => ApiError::new(&rid, "bad_request", DUPLICATE_ACCOUNT),
        other => map_db_error(rid.clone(), &other),
    })?;

    let session = session_for(&rid, &row)?;
    let jar = sign_in(&state, &rid, jar, &session)?;

    tracing::info!(request_id = %rid, user_id = %row.public_id, "account registered");

    Ok((
        StatusCode::CREATED,
        jar,
        Json(ApiResponse::new(rid, session.into())),
    ))
}

/// POST /login
pub(in crate::api) async fn login(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    jar: CookieJar,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse<UserItem>>), ApiError> {
    let rid = req_id.0;

    let email = body.email.as_deref().map(normalize_email).unwrap_or_default();
    let plain = body.password.unwrap_or_default();
    if email.is_empty() || plain.is_empty() {
        return Err(ApiError::new(
            &rid,
            "bad_request",
            "Please provide email and password",
        ));
    }

    let Some(row) = bazaar_db::get_user_by_email(&state.pool, &email)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
    else {
        tracing::debug!(request_id = %rid, "login for unknown email");
        return Err(ApiError::new(&rid, "unauthorized", BAD_CREDENTIALS));
    };

    let stored = row.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || password::verify_password(&plain, &stored))
        .await
        .map_err(|e| hashing_failed(&rid, &e))?;
    if !verified {
        tracing::debug!(request_id = %rid, user_id = %row.public_id, "login with wrong password");
        return Err(ApiError::new(&rid, "unauthorized", BAD_CREDENTIALS));
    }

    let session = session_for(&rid, &row)?;
    let jar = sign_in(&state, &rid, jar, &session)?;

    tracing::info!(request_id = %rid, user_id = %row.public_id, "logged in");

    Ok((jar, Json(ApiResponse::new(rid, session.into()))))
}

/// GET /me — the current session's user, or `null`. Never an error.
pub(in crate::api) async fn me(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    jar: CookieJar,
) -> Json<ApiResponse<MeResponse>> {
    let user = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| state.tokens.verify(cookie.value()).ok())
        .map(UserItem::from);

    Json(ApiResponse::new(req_id.0, MeResponse { user }))
}

/// POST /logout
pub(in crate::api) async fn logout(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    jar: CookieJar,
) -> (CookieJar, Json<ApiResponse<MessageResponse>>) {
    (
        jar.add(state.tokens.cleared_cookie()),
        Json(ApiResponse::new(
            req_id.0,
            MessageResponse {
                message: "Logged out",
            },
        )),
    )
}
