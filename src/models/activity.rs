//! Activity log entry types

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Where an activity log entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LogEntryKind {
    Created,
    BorrowRequested,
    BorrowApproved,
    BorrowRejected,
    BorrowCancelled,
    BorrowCheckedOut,
    BorrowReturned,
    BorrowCompleted,
    Maintenance,
    Edit,
    Note,
}

/// One entry in an equipment item's merged activity log. The log is
/// recomputed on each call; nothing merged is persisted.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: LogEntryKind,
    pub summary: String,
    pub borrow_id: Option<i32>,
    /// Raw source entry for maintenance/edit/note kinds
    #[schema(value_type = Option<Object>)]
    pub detail: Option<serde_json::Value>,
}
