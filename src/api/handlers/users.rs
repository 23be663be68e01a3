//! User administration routes.

use axum::{
    extract::{Extension, Path, Query},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use super::ListQuery;
use crate::{
    api::{
        payload::{non_empty, GroupList, Payload},
        state::{require_admin, require_auth},
        ApiError, AppState,
    },
    mediawiki::{auth::is_admin, BlockRequest, RightsChangeRequest},
};

const DEFAULT_LIST_LIMIT: u32 = 500;
const DEFAULT_BLOCK_REASON: &str = "Blocked by admin";
const DEFAULT_BLOCK_EXPIRY: &str = "indefinite";
const DEFAULT_ROLE_REASON: &str = "Role changed by admin";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub username: String,
    pub id: u64,
    pub groups: Vec<String>,
    pub rights: Vec<String>,
    pub editcount: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserList {
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    pub username: String,
    pub groups: Vec<String>,
    pub rights: Vec<String>,
    pub is_admin: bool,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct BlockUser {
    pub reason: Option<String>,
    /// MediaWiki expiry, e.g. `1 week` or `indefinite`.
    pub expiry: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BlockResponse {
    pub success: bool,
    pub message: String,
    #[schema(value_type = Object)]
    pub block: Value,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ChangeRole {
    /// Groups to add, as a list or a `|`/`,` separated string.
    #[schema(value_type = Option<Vec<String>>)]
    pub add: Option<GroupList>,
    #[schema(value_type = Option<Vec<String>>)]
    pub remove: Option<GroupList>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoleResponse {
    pub success: bool,
    pub message: String,
    pub user: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(ListQuery),
    responses(
        (status = 200, description = "Registered users", body = UserList),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Admin access required")
    ),
    tag = "users"
)]
pub async fn list_users(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_admin(&state, &headers).await?;
    let users = state
        .wiki()
        .list_users(query.from(), query.limit(DEFAULT_LIST_LIMIT), &principal.cookies)
        .await?
        .into_iter()
        .map(|user| UserSummary {
            username: user.name,
            id: user.userid,
            groups: user.groups,
            rights: user.rights,
            editcount: user.editcount,
        })
        .collect();

    Ok(Json(UserList { users }))
}

#[utoipa::path(
    get,
    path = "/api/users/{username}",
    params(("username" = String, Path, description = "MediaWiki user name")),
    responses(
        (status = 200, description = "Groups and rights of the user", body = UserDetails),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "User not found")
    ),
    tag = "users"
)]
pub async fn get_user(
    Path(username): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&state, &headers).await?;
    let rights = state
        .wiki()
        .user_rights(&username, &principal.cookies)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    Ok(Json(UserDetails {
        is_admin: is_admin(&rights.groups),
        username,
        groups: rights.groups,
        rights: rights.rights,
    }))
}

#[utoipa::path(
    put,
    path = "/api/users/{username}/block",
    params(("username" = String, Path, description = "MediaWiki user name")),
    request_body = BlockUser,
    responses(
        (status = 200, description = "User blocked", body = BlockResponse),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Admin access required")
    ),
    tag = "users"
)]
pub async fn block_user(
    Path(username): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Payload(request): Payload<BlockUser>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_admin(&state, &headers).await?;
    let block = BlockRequest {
        user: username,
        reason: non_empty(request.reason).unwrap_or_else(|| DEFAULT_BLOCK_REASON.to_string()),
        expiry: non_empty(request.expiry).unwrap_or_else(|| DEFAULT_BLOCK_EXPIRY.to_string()),
    };

    let result = state.wiki().block_user(&block, &principal.cookies).await?;
    info!(
        user = %block.user,
        expiry = %block.expiry,
        admin = %principal.user.username,
        "user blocked"
    );

    Ok(Json(BlockResponse {
        success: true,
        message: "User blocked successfully".to_string(),
        block: result,
    }))
}

#[utoipa::path(
    put,
    path = "/api/users/{username}/role",
    params(("username" = String, Path, description = "MediaWiki user name")),
    request_body = ChangeRole,
    responses(
        (status = 200, description = "Group membership changed", body = RoleResponse),
        (status = 400, description = "Neither add nor remove given"),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Admin access required")
    ),
    tag = "users"
)]
pub async fn change_role(
    Path(username): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Payload(request): Payload<ChangeRole>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_admin(&state, &headers).await?;
    let add = request.add.map(|list| list.0).unwrap_or_default();
    let remove = request.remove.map(|list| list.0).unwrap_or_default();
    if add.is_empty() && remove.is_empty() {
        return Err(ApiError::BadRequest(
            "Either add or remove groups must be specified",
        ));
    }

    let change = RightsChangeRequest {
        user: username,
        add,
        remove,
        reason: non_empty(request.reason).unwrap_or_else(|| DEFAULT_ROLE_REASON.to_string()),
    };
    let outcome = state
        .wiki()
        .set_user_rights(&change, &principal.cookies)
        .await?;
    info!(
        user = %outcome.user,
        added = ?outcome.added,
        removed = ?outcome.removed,
        admin = %principal.user.username,
        "user groups changed"
    );

    Ok(Json(RoleResponse {
        success: true,
        message: "User role updated successfully".to_string(),
        user: outcome.user,
        added: outcome.added,
        removed: outcome.removed,
    }))
}
