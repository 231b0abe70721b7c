//! Borrow lifecycle endpoints
//!
//! Each transition is its own POST route so the guards live in the
//! state machine, not in route plumbing. Group routes accept either a
//! real group id or the `individual-<id>` form for singleton borrows.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    lifecycle::{BorrowEvent, GroupAction, TransitionParams},
    models::borrow::{
        ApproveParams, BorrowDetails, ConfirmReturnParams, CreateBorrowRequest, CreatedBorrows,
        GroupActionResult, ReturnRequestParams, UpdateDataRequest,
    },
    models::deficiency::Deficiency,
    services::stats::DashboardSummary,
};

use super::AuthenticatedUser;

/// Result of the overdue sweep
#[derive(Serialize, ToSchema)]
pub struct SweepResponse {
    /// Number of borrows newly marked overdue
    pub swept: u64,
}

/// Submit a borrow request for one or more equipment items
#[utoipa::path(
    post,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = CreateBorrowRequest,
    responses(
        (status = 201, description = "Borrow request created", body = CreatedBorrows),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "No free unit in the requested window")
    )
)]
pub async fn create_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateBorrowRequest>,
) -> AppResult<(StatusCode, Json<CreatedBorrows>)> {
    let created = state
        .services
        .borrows
        .create_request(&claims.actor(), &request)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Get one borrow
#[utoipa::path(
    get,
    path = "/borrows/{id}",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow ID")),
    responses(
        (status = 200, description = "Borrow details", body = BorrowDetails),
        (status = 404, description = "Borrow not found")
    )
)]
pub async fn get_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowDetails>> {
    let details = state.services.borrows.get_details(id).await?;
    Ok(Json(details))
}

/// Get a user's borrows
#[utoipa::path(
    get,
    path = "/users/{id}/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User's borrows, newest request first", body = Vec<BorrowDetails>),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_borrows(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<BorrowDetails>>> {
    let borrows = state.services.borrows.list_for_user(user_id).await?;
    Ok(Json(borrows))
}

/// Get a user's dashboard summary
#[utoipa::path(
    get,
    path = "/users/{id}/dashboard",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Borrow counts by status", body = DashboardSummary)
    )
)]
pub async fn get_dashboard(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<DashboardSummary>> {
    let summary = state.services.stats.dashboard_summary(user_id).await?;
    Ok(Json(summary))
}

/// Approve a pending borrow, optionally narrowing the window
#[utoipa::path(
    post,
    path = "/borrows/{id}/approve",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow ID")),
    request_body = ApproveParams,
    responses(
        (status = 200, description = "Borrow approved", body = BorrowDetails),
        (status = 403, description = "Approver role required"),
        (status = 409, description = "Not pending, or no free unit in the window")
    )
)]
pub async fn approve_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<ApproveParams>,
) -> AppResult<Json<BorrowDetails>> {
    let params = TransitionParams {
        approved_start_time: request.approved_start_time,
        approved_end_time: request.approved_end_time,
        ..Default::default()
    };
    let details = state
        .services
        .borrows
        .transition(id, BorrowEvent::Approve, &claims.actor(), params, &[])
        .await?;
    Ok(Json(details))
}

/// Reject a pending borrow
#[utoipa::path(
    post,
    path = "/borrows/{id}/reject",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow ID")),
    responses(
        (status = 200, description = "Borrow rejected", body = BorrowDetails),
        (status = 403, description = "Approver role required"),
        (status = 409, description = "Borrow is not pending")
    )
)]
pub async fn reject_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowDetails>> {
    let details = state
        .services
        .borrows
        .transition(
            id,
            BorrowEvent::Reject,
            &claims.actor(),
            TransitionParams::default(),
            &[],
        )
        .await?;
    Ok(Json(details))
}

/// Cancel one's own pending borrow
#[utoipa::path(
    post,
    path = "/borrows/{id}/cancel",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow ID")),
    responses(
        (status = 200, description = "Borrow cancelled", body = BorrowDetails),
        (status = 403, description = "Only the borrower may cancel"),
        (status = 409, description = "Borrow is not pending")
    )
)]
pub async fn cancel_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowDetails>> {
    let details = state
        .services
        .borrows
        .transition(
            id,
            BorrowEvent::Cancel,
            &claims.actor(),
            TransitionParams::default(),
            &[],
        )
        .await?;
    Ok(Json(details))
}

/// Hand the equipment over (approved -> active)
#[utoipa::path(
    post,
    path = "/borrows/{id}/checkout",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow ID")),
    responses(
        (status = 200, description = "Equipment checked out", body = BorrowDetails),
        (status = 400, description = "Outside the approved window"),
        (status = 403, description = "Approver role required"),
        (status = 409, description = "Borrow is not approved")
    )
)]
pub async fn checkout_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowDetails>> {
    let details = state
        .services
        .borrows
        .transition(
            id,
            BorrowEvent::Checkout,
            &claims.actor(),
            TransitionParams::default(),
            &[],
        )
        .await?;
    Ok(Json(details))
}

/// Reverse an approval before checkout, releasing the slot
#[utoipa::path(
    post,
    path = "/borrows/{id}/reject-approved",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow ID")),
    responses(
        (status = 200, description = "Approval reversed", body = BorrowDetails),
        (status = 403, description = "Approver role required"),
        (status = 409, description = "Borrow is not approved")
    )
)]
pub async fn reject_approved_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowDetails>> {
    let details = state
        .services
        .borrows
        .transition(
            id,
            BorrowEvent::RejectApproved,
            &claims.actor(),
            TransitionParams::default(),
            &[],
        )
        .await?;
    Ok(Json(details))
}

/// Declare intent to return (active/overdue -> pending return)
#[utoipa::path(
    post,
    path = "/borrows/{id}/request-return",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow ID")),
    request_body = ReturnRequestParams,
    responses(
        (status = 200, description = "Return requested", body = BorrowDetails),
        (status = 400, description = "Return condition missing"),
        (status = 403, description = "Only the borrower may request a return"),
        (status = 409, description = "Borrow is not active")
    )
)]
pub async fn request_return(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<ReturnRequestParams>,
) -> AppResult<Json<BorrowDetails>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let params = TransitionParams {
        return_condition: Some(request.return_condition),
        return_remarks: request.return_remarks,
        ..Default::default()
    };
    let details = state
        .services
        .borrows
        .transition(id, BorrowEvent::RequestReturn, &claims.actor(), params, &[])
        .await?;
    Ok(Json(details))
}

/// Confirm a return, optionally reporting deficiencies. With no
/// deficiencies the borrow completes immediately; otherwise it stays
/// RETURNED until every deficiency is resolved.
#[utoipa::path(
    post,
    path = "/borrows/{id}/confirm-return",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow ID")),
    request_body = ConfirmReturnParams,
    responses(
        (status = 200, description = "Return confirmed", body = BorrowDetails),
        (status = 403, description = "Approver role required"),
        (status = 409, description = "Borrow is not pending return")
    )
)]
pub async fn confirm_return(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<ConfirmReturnParams>,
) -> AppResult<Json<BorrowDetails>> {
    let details = state
        .services
        .borrows
        .transition(
            id,
            BorrowEvent::ConfirmReturn,
            &claims.actor(),
            TransitionParams::default(),
            &request.deficiencies,
        )
        .await?;
    Ok(Json(details))
}

/// Apply a bulk action to a borrow group. Approve and reject are
/// all-or-nothing; checkout and confirm-return report per-item outcomes.
#[utoipa::path(
    post,
    path = "/borrow-groups/{group_id}/{action}",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("group_id" = String, Path, description = "Borrow group ID, or individual-<borrow id>"),
        ("action" = String, Path, description = "approve, reject, checkout, or confirm-return")
    ),
    request_body = ApproveParams,
    responses(
        (status = 200, description = "Group action result", body = GroupActionResult),
        (status = 400, description = "Unknown action"),
        (status = 404, description = "Group not found")
    )
)]
pub async fn group_action(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((group_id, action)): Path<(String, String)>,
    body: Option<Json<ApproveParams>>,
) -> AppResult<Json<GroupActionResult>> {
    let action: GroupAction = action
        .parse()
        .map_err(AppError::BadRequest)?;
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let params = TransitionParams {
        approved_start_time: request.approved_start_time,
        approved_end_time: request.approved_end_time,
        ..Default::default()
    };
    let result = state
        .services
        .borrows
        .apply_group_action(&group_id, action, &claims.actor(), params)
        .await?;
    Ok(Json(result))
}

/// List deficiencies reported against a borrow
#[utoipa::path(
    get,
    path = "/borrows/{id}/deficiencies",
    tag = "deficiencies",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow ID")),
    responses(
        (status = 200, description = "Deficiencies for the borrow", body = Vec<Deficiency>),
        (status = 404, description = "Borrow not found")
    )
)]
pub async fn list_deficiencies(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<Deficiency>>> {
    let deficiencies = state.services.borrows.list_deficiencies(id).await?;
    Ok(Json(deficiencies))
}

/// Resolve a deficiency. Resolving the last one completes the borrow.
#[utoipa::path(
    post,
    path = "/deficiencies/{id}/resolve",
    tag = "deficiencies",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Deficiency ID")),
    responses(
        (status = 200, description = "Deficiency resolved", body = Deficiency),
        (status = 403, description = "Staff privileges required"),
        (status = 404, description = "Deficiency not found"),
        (status = 409, description = "Already resolved")
    )
)]
pub async fn resolve_deficiency(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Deficiency>> {
    claims.require_staff()?;

    let deficiency = state
        .services
        .borrows
        .resolve_deficiency(id, &claims.actor())
        .await?;
    Ok(Json(deficiency))
}

/// Record staff fulfillment of a data request
#[utoipa::path(
    put,
    path = "/borrows/{id}/data-request",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow ID")),
    request_body = UpdateDataRequest,
    responses(
        (status = 200, description = "Data request updated", body = BorrowDetails),
        (status = 400, description = "Borrow did not request data"),
        (status = 403, description = "Staff privileges required")
    )
)]
pub async fn update_data_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateDataRequest>,
) -> AppResult<Json<BorrowDetails>> {
    claims.require_staff()?;

    let details = state
        .services
        .borrows
        .update_data_request(id, &request)
        .await?;
    Ok(Json(details))
}

/// Persist the overdue derivation for active borrows past their end
#[utoipa::path(
    post,
    path = "/borrows/sweep-overdue",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep result", body = SweepResponse),
        (status = 403, description = "Staff privileges required")
    )
)]
pub async fn sweep_overdue(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<SweepResponse>> {
    claims.require_staff()?;

    let swept = state.services.borrows.sweep_overdue().await?;
    Ok(Json(SweepResponse { swept }))
}
