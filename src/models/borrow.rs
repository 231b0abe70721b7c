//! Borrow (reservation) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::enums::{BorrowStatus, DataRequestStatus, ReservationType};

/// Borrow record from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Borrow {
    pub id: i32,
    pub equipment_id: i32,
    pub borrower_id: i32,
    /// Set for coursework-linked reservations
    pub class_id: Option<i32>,
    /// Shared by borrows submitted together as one transaction
    pub borrow_group_id: Option<String>,
    pub reservation_type: ReservationType,
    pub status: BorrowStatus,
    pub request_submission_time: DateTime<Utc>,
    pub requested_start_time: DateTime<Utc>,
    pub requested_end_time: DateTime<Utc>,
    pub approved_start_time: Option<DateTime<Utc>>,
    pub approved_end_time: Option<DateTime<Utc>>,
    pub checkout_time: Option<DateTime<Utc>>,
    pub actual_return_time: Option<DateTime<Utc>>,
    /// When the request was approved, rejected, or cancelled
    pub decided_at: Option<DateTime<Utc>>,
    pub return_condition: Option<String>,
    pub return_remarks: Option<String>,
    pub data_requested: bool,
    pub data_request_status: Option<DataRequestStatus>,
    pub data_request_remarks: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub data_files: Option<serde_json::Value>,
    /// Snapshot of every equipment id in the original group request
    #[schema(value_type = Option<Object>)]
    pub requested_equipment_ids: Option<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

impl Borrow {
    /// Effective reservation window: the approved window once set,
    /// otherwise the requested one.
    pub fn effective_window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        match (self.approved_start_time, self.approved_end_time) {
            (Some(start), Some(end)) => (start, end),
            _ => (self.requested_start_time, self.requested_end_time),
        }
    }

    /// Group key, normalizing singleton borrows so the group coordinator
    /// has one uniform code path.
    pub fn group_key(&self) -> String {
        self.borrow_group_id
            .clone()
            .unwrap_or_else(|| format!("individual-{}", self.id))
    }

    /// Informational flag: the request was submitted with less lead time
    /// than the given threshold (hours). Never blocks anything.
    pub fn is_late_request(&self, threshold_hours: i64) -> bool {
        let lead = self.requested_start_time - self.request_submission_time;
        lead.num_hours() < threshold_hours
    }
}

/// Borrow with derived fields, for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BorrowDetails {
    #[serde(flatten)]
    pub borrow: Borrow,
    /// Status with overdue derived at read time
    pub effective_status: BorrowStatus,
    pub is_late_request: bool,
    pub group_key: String,
}

/// Create borrow request. More than one equipment id (or any group mates)
/// produces a grouped reservation under one borrow_group_id.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBorrowRequest {
    #[validate(length(min = 1))]
    pub equipment_ids: Vec<i32>,
    pub requested_start_time: DateTime<Utc>,
    pub requested_end_time: DateTime<Utc>,
    pub reservation_type: ReservationType,
    pub class_id: Option<i32>,
    #[serde(default)]
    pub group_mate_ids: Vec<i32>,
    #[serde(default)]
    pub data_requested: bool,
}

/// Insert payload for one borrow record, as normalized by the service
#[derive(Debug, Clone)]
pub struct NewBorrow {
    pub equipment_id: i32,
    pub borrower_id: i32,
    pub class_id: Option<i32>,
    pub borrow_group_id: Option<String>,
    pub reservation_type: ReservationType,
    pub requested_start_time: DateTime<Utc>,
    pub requested_end_time: DateTime<Utc>,
    pub data_requested: bool,
    pub requested_equipment_ids: Option<serde_json::Value>,
}

/// Result of creating a borrow request
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedBorrows {
    pub borrow_ids: Vec<i32>,
    pub borrow_group_id: Option<String>,
}

/// Body for the approve transition: staff may narrow or shift the window
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ApproveParams {
    pub approved_start_time: Option<DateTime<Utc>>,
    pub approved_end_time: Option<DateTime<Utc>>,
}

/// Body for the return-request transition
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReturnRequestParams {
    #[validate(length(min = 1))]
    pub return_condition: String,
    pub return_remarks: Option<String>,
}

/// One deficiency reported while confirming a return
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReportDeficiency {
    pub deficiency_type: crate::models::enums::DeficiencyType,
    pub description: String,
}

/// Body for the confirm-return transition
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ConfirmReturnParams {
    #[serde(default)]
    pub deficiencies: Vec<ReportDeficiency>,
}

/// Staff fulfillment of a data request
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateDataRequest {
    pub data_request_status: DataRequestStatus,
    pub data_request_remarks: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub data_files: Option<serde_json::Value>,
}

/// Outcome of a group action for one member borrow
#[derive(Debug, Serialize, ToSchema)]
pub struct GroupItemOutcome {
    pub borrow_id: i32,
    /// New status when the transition succeeded
    pub status: Option<BorrowStatus>,
    /// Error message when it failed
    pub error: Option<String>,
}

/// Summary of a group action: how many members transitioned, and the
/// per-item outcomes. Partial failure is reported here, never thrown.
#[derive(Debug, Serialize, ToSchema)]
pub struct GroupActionResult {
    pub borrow_group_id: String,
    /// Number of members successfully transitioned
    pub count: usize,
    pub results: Vec<GroupItemOutcome>,
}
