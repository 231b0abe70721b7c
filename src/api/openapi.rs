//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{borrows, equipment, health};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stockroom API",
        version = "0.3.0",
        description = "Laboratory equipment reservation and borrowing REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Equipment
        equipment::list_equipment,
        equipment::get_equipment,
        equipment::create_equipment,
        equipment::update_equipment,
        equipment::delete_equipment,
        equipment::check_availability,
        equipment::unavailable_dates,
        equipment::get_activity_log,
        equipment::get_usage,
        equipment::add_maintenance_entry,
        equipment::add_note,
        // Borrows
        borrows::create_borrow,
        borrows::get_borrow,
        borrows::get_user_borrows,
        borrows::get_dashboard,
        borrows::approve_borrow,
        borrows::reject_borrow,
        borrows::cancel_borrow,
        borrows::checkout_borrow,
        borrows::reject_approved_borrow,
        borrows::request_return,
        borrows::confirm_return,
        borrows::group_action,
        borrows::list_deficiencies,
        borrows::resolve_deficiency,
        borrows::update_data_request,
        borrows::sweep_overdue,
    ),
    components(
        schemas(
            // Equipment
            crate::models::equipment::Equipment,
            crate::models::equipment::EquipmentDetails,
            crate::models::equipment::CreateEquipment,
            crate::models::equipment::UpdateEquipment,
            crate::models::equipment::AddMaintenanceEntry,
            crate::models::equipment::AddNote,
            equipment::AvailabilityResponse,
            equipment::UnavailableDatesResponse,
            // Borrows
            crate::models::borrow::Borrow,
            crate::models::borrow::BorrowDetails,
            crate::models::borrow::CreateBorrowRequest,
            crate::models::borrow::CreatedBorrows,
            crate::models::borrow::ApproveParams,
            crate::models::borrow::ReturnRequestParams,
            crate::models::borrow::ConfirmReturnParams,
            crate::models::borrow::ReportDeficiency,
            crate::models::borrow::UpdateDataRequest,
            crate::models::borrow::GroupItemOutcome,
            crate::models::borrow::GroupActionResult,
            borrows::SweepResponse,
            // Deficiencies
            crate::models::deficiency::Deficiency,
            // Activity
            crate::models::activity::LogEntry,
            crate::models::activity::LogEntryKind,
            // Stats
            crate::services::stats::DashboardSummary,
            crate::services::stats::UsageSummary,
            // Users
            crate::models::user::User,
            // Enums
            crate::models::enums::BorrowStatus,
            crate::models::enums::EquipmentCategory,
            crate::models::enums::EquipmentStatus,
            crate::models::enums::ReservationType,
            crate::models::enums::DataRequestStatus,
            crate::models::enums::DeficiencyType,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "equipment", description = "Equipment inventory management"),
        (name = "borrows", description = "Borrow lifecycle and group actions"),
        (name = "deficiencies", description = "Return deficiency tracking")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
