//! Equipment management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::AppResult,
    models::activity::LogEntry,
    models::equipment::{
        AddMaintenanceEntry, AddNote, CreateEquipment, Equipment, EquipmentDetails,
        UpdateEquipment,
    },
    services::stats::UsageSummary,
};

use super::AuthenticatedUser;

/// Query for the availability check
#[derive(Deserialize, IntoParams)]
pub struct AvailabilityQuery {
    /// Window start (ISO 8601)
    pub start: DateTime<Utc>,
    /// Window end, exclusive (ISO 8601)
    pub end: DateTime<Utc>,
}

/// Availability check result
#[derive(Serialize, ToSchema)]
pub struct AvailabilityResponse {
    pub equipment_id: i32,
    pub available: bool,
}

/// Fully-booked dates for calendar display
#[derive(Serialize, ToSchema)]
pub struct UnavailableDatesResponse {
    pub equipment_id: i32,
    pub dates: Vec<NaiveDate>,
}

/// Query for equipment deletion
#[derive(Deserialize, IntoParams)]
pub struct DeleteQuery {
    /// Permanently delete an already-archived item instead of archiving
    #[serde(default)]
    pub permanent: bool,
}

/// List all equipment
#[utoipa::path(
    get,
    path = "/equipment",
    tag = "equipment",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Equipment list with derived statuses", body = Vec<EquipmentDetails>)
    )
)]
pub async fn list_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<EquipmentDetails>>> {
    let items = state.services.equipment.list().await?;
    Ok(Json(items))
}

/// Get one equipment item
#[utoipa::path(
    get,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Equipment details", body = EquipmentDetails),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn get_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<EquipmentDetails>> {
    let details = state.services.equipment.get_details(id).await?;
    Ok(Json(details))
}

/// Register new equipment
#[utoipa::path(
    post,
    path = "/equipment",
    tag = "equipment",
    security(("bearer_auth" = [])),
    request_body = CreateEquipment,
    responses(
        (status = 201, description = "Equipment created", body = Equipment),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Staff privileges required")
    )
)]
pub async fn create_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateEquipment>,
) -> AppResult<(StatusCode, Json<Equipment>)> {
    claims.require_staff()?;

    let equipment = state.services.equipment.create(&request).await?;
    Ok((StatusCode::CREATED, Json(equipment)))
}

/// Update equipment details
#[utoipa::path(
    put,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    request_body = UpdateEquipment,
    responses(
        (status = 200, description = "Equipment updated", body = Equipment),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn update_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateEquipment>,
) -> AppResult<Json<Equipment>> {
    claims.require_staff()?;

    let equipment = state.services.equipment.update(id, &request).await?;
    Ok(Json(equipment))
}

/// Archive equipment, or permanently delete an archived item
#[utoipa::path(
    delete,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Equipment ID"),
        DeleteQuery
    ),
    responses(
        (status = 200, description = "Equipment archived", body = Equipment),
        (status = 204, description = "Equipment permanently deleted"),
        (status = 409, description = "Item is not archived yet")
    )
)]
pub async fn delete_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Query(query): Query<DeleteQuery>,
) -> AppResult<axum::response::Response> {
    use axum::response::IntoResponse;

    claims.require_staff()?;

    match state.services.equipment.delete(id, query.permanent).await? {
        Some(archived) => Ok(Json(archived).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Check availability over a time window
#[utoipa::path(
    get,
    path = "/equipment/{id}/availability",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Equipment ID"),
        AvailabilityQuery
    ),
    responses(
        (status = 200, description = "Availability over the window", body = AvailabilityResponse),
        (status = 400, description = "Invalid window"),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn check_availability(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<AvailabilityResponse>> {
    let available = state
        .services
        .availability
        .is_available(id, query.start, query.end)
        .await?;
    Ok(Json(AvailabilityResponse {
        equipment_id: id,
        available,
    }))
}

/// Get fully-booked dates for calendar display
#[utoipa::path(
    get,
    path = "/equipment/{id}/unavailable-dates",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Dates with no free unit", body = UnavailableDatesResponse),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn unavailable_dates(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<UnavailableDatesResponse>> {
    let dates = state.services.availability.unavailable_dates(id).await?;
    Ok(Json(UnavailableDatesResponse {
        equipment_id: id,
        dates,
    }))
}

/// Get the merged activity log for an equipment item
#[utoipa::path(
    get,
    path = "/equipment/{id}/activity",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Merged activity log, newest first", body = Vec<LogEntry>),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn get_activity_log(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<LogEntry>>> {
    let log = state.services.activity.get_activity_log(id).await?;
    Ok(Json(log))
}

/// Get accumulated contact hours for an equipment item
#[utoipa::path(
    get,
    path = "/equipment/{id}/usage",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Net contact hours", body = UsageSummary),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn get_usage(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<UsageSummary>> {
    let usage = state.services.stats.net_contact_hours(id).await?;
    Ok(Json(usage))
}

/// Append a maintenance log entry
#[utoipa::path(
    post,
    path = "/equipment/{id}/maintenance",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    request_body = AddMaintenanceEntry,
    responses(
        (status = 200, description = "Entry appended", body = Equipment),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn add_maintenance_entry(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<AddMaintenanceEntry>,
) -> AppResult<Json<Equipment>> {
    claims.require_staff()?;

    let equipment = state
        .services
        .equipment
        .add_maintenance_entry(id, &request)
        .await?;
    Ok(Json(equipment))
}

/// Append an admin note
#[utoipa::path(
    post,
    path = "/equipment/{id}/notes",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    request_body = AddNote,
    responses(
        (status = 200, description = "Note appended", body = Equipment),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn add_note(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<AddNote>,
) -> AppResult<Json<Equipment>> {
    claims.require_staff()?;

    let equipment = state
        .services
        .equipment
        .add_note(id, claims.user_id, &request)
        .await?;
    Ok(Json(equipment))
}
