use axum::{
    extract::{Path, State},
    Extension, Json,
};
use bazaar_core::Role;
use bazaar_db::UserSummaryRow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::super::{map_db_error, ApiError, ApiResponse, AppState};
use super::parse_public_id;

#[derive(Debug, Serialize)]
pub(in crate::api) struct UserSummaryItem {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub order_count: i64,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct DeletedUser {
    pub id: Uuid,
    pub deleted: bool,
}

impl From<UserSummaryRow> for UserSummaryItem {
    fn from(row: UserSummaryRow) -> Self {
        Self {
            id: row.public_id,
            username: row.username,
            email: row.email,
            role: row.role,
            created_at: row.created_at,
            order_count: row.order_count,
        }
    }
}

/// GET /admin/users
pub(in crate::api) async fn list_users(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<UserSummaryItem>>>, ApiError> {
    let rows = bazaar_db::list_users(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        rows.into_iter().map(UserSummaryItem::from).collect(),
    )))
}

/// DELETE /admin/users/{user_id} — admin accounts are protected.
pub(in crate::api) async fn delete_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<DeletedUser>>, ApiError> {
    let rid = req_id.0;
    let user_id = parse_public_id(&rid, &user_id, "User not found")?;

    let user = bazaar_db::get_user_by_public_id(&state.pool, user_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(&rid, "not_found", "User not found"))?;

    if user.role == Role::Admin.as_str() {
        return Err(ApiError::new(
            &rid,
            "bad_request",
            "Admin accounts cannot be deleted",
        ));
    }

    let deleted = bazaar_db::delete_user(&state.pool, user_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !deleted {
        return Err(ApiError::new(&rid, "not_found", "User not found"));
    }

    tracing::info!(request_id = %rid, user_id = %user_id, "user deleted");

    Ok(Json(ApiResponse::new(
        rid,
        DeletedUser {
            id: user_id,
            deleted: true,
        },
    )))
}
