//! Group membership controller.

use crate::{
    extractors::{CallerId, ValidatedJson},
    responses::{ok, ApiResult},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    routing::{delete, get, patch, post},
    Router,
};
use huddle_core::UserId;
use huddle_service::{GroupSnapshot, GroupSummary, JoinGroupRequest, UpdateConfirmationRequest};
use tracing::debug;

/// Creates the group router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(my_group))
        .route("/token/:token", get(group_by_token))
        .route("/me/confirmation", patch(update_confirmation))
        .route("/me/members/:user_id", delete(delete_member))
        .route("/me/leave", post(leave))
        .route("/join", post(join))
}

/// Get the caller's group, creating it on first use.
async fn my_group(State(state): State<AppState>, CallerId(caller): CallerId) -> ApiResult<GroupSnapshot> {
    debug!(user_id = %caller, "Find group request");

    let group = state.group_service.find_by_user(caller).await?;
    ok(group)
}

/// Preview the group behind an invite token.
async fn group_by_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<GroupSummary> {
    debug!(token = %token, "Find group by token request");

    let summary = state.group_service.find_by_token(&token).await?;
    ok(summary)
}

/// Lock or unlock the caller's group. Leader only.
async fn update_confirmation(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    ValidatedJson(request): ValidatedJson<UpdateConfirmationRequest>,
) -> ApiResult<GroupSnapshot> {
    debug!(leader_id = %caller, is_confirmed = request.is_confirmed, "Update confirmation request");

    let group = state
        .group_service
        .update_confirm(caller, request.is_confirmed)
        .await?;
    ok(group)
}

/// Remove a member from the caller's group. Leader only.
async fn delete_member(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(user_id): Path<String>,
) -> ApiResult<GroupSnapshot> {
    debug!(leader_id = %caller, user_id = %user_id, "Delete member request");

    let target = UserId::parse(&user_id)?;
    let group = state.group_service.delete_member(caller, target).await?;
    ok(group)
}

/// Leave the caller's group for a fresh one.
async fn leave(State(state): State<AppState>, CallerId(caller): CallerId) -> ApiResult<GroupSnapshot> {
    debug!(user_id = %caller, "Leave group request");

    let group = state.group_service.leave(caller).await?;
    ok(group)
}

/// Join a group by invite token.
async fn join(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    ValidatedJson(request): ValidatedJson<JoinGroupRequest>,
) -> ApiResult<GroupSnapshot> {
    debug!(user_id = %caller, "Join group request");

    let group = state.group_service.join(caller, &request.token).await?;
    ok(group)
}
