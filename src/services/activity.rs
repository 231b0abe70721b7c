//! Activity log builder
//!
//! Merges heterogeneous event sources for one equipment item into a
//! single newest-first log: the creation event, per-borrow lifecycle
//! events, and the raw JSON maintenance/edit/notes entries. The raw
//! entries are historical data of uneven quality; anything that is not
//! an object with a parseable timestamp is skipped with a warning so
//! the log always renders.

use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::activity::{LogEntry, LogEntryKind},
    models::borrow::Borrow,
    models::enums::BorrowStatus,
    models::equipment::Equipment,
    repository::Repository,
};

#[derive(Clone)]
pub struct ActivityService {
    repository: Repository,
}

impl ActivityService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Merged activity log, recomputed on every call
    pub async fn get_activity_log(&self, equipment_id: i32) -> AppResult<Vec<LogEntry>> {
        let equipment = self.repository.equipment.get_by_id(equipment_id).await?;
        let borrows = self
            .repository
            .borrows
            .list_for_equipment(equipment_id)
            .await?;
        Ok(build_activity_log(&equipment, &borrows))
    }
}

/// Build the merged log, strictly descending by timestamp. Ties keep
/// source-then-insertion order (the sort is stable).
pub fn build_activity_log(equipment: &Equipment, borrows: &[Borrow]) -> Vec<LogEntry> {
    let mut entries = Vec::new();

    entries.push(LogEntry {
        timestamp: equipment.created_at,
        kind: LogEntryKind::Created,
        summary: format!("Equipment '{}' registered", equipment.name),
        borrow_id: None,
        detail: None,
    });

    for borrow in borrows {
        entries.extend(borrow_entries(borrow));
    }

    entries.extend(parse_raw_log(
        &equipment.maintenance_log,
        LogEntryKind::Maintenance,
        "maintenance_log",
    ));
    entries.extend(parse_raw_log(
        &equipment.edit_history,
        LogEntryKind::Edit,
        "edit_history",
    ));
    entries.extend(parse_raw_log(
        &equipment.notes_log,
        LogEntryKind::Note,
        "notes_log",
    ));

    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    entries
}

/// Up to six entries per borrow: request, decision, checkout, return,
/// completion
fn borrow_entries(borrow: &Borrow) -> Vec<LogEntry> {
    let mut entries = Vec::new();
    let entry = |timestamp, kind, summary: String| LogEntry {
        timestamp,
        kind,
        summary,
        borrow_id: Some(borrow.id),
        detail: None,
    };

    entries.push(entry(
        borrow.request_submission_time,
        LogEntryKind::BorrowRequested,
        format!("Borrow requested by user {}", borrow.borrower_id),
    ));

    if let Some(decided) = borrow.decided_at {
        let decision = match borrow.status {
            BorrowStatus::RejectedFic | BorrowStatus::RejectedStaff => entry(
                decided,
                LogEntryKind::BorrowRejected,
                format!("Request rejected ({})", borrow.status),
            ),
            BorrowStatus::Cancelled => entry(
                decided,
                LogEntryKind::BorrowCancelled,
                "Request cancelled by borrower".to_string(),
            ),
            _ => entry(
                decided,
                LogEntryKind::BorrowApproved,
                "Request approved".to_string(),
            ),
        };
        entries.push(decision);
    }

    if let Some(checkout) = borrow.checkout_time {
        entries.push(entry(
            checkout,
            LogEntryKind::BorrowCheckedOut,
            "Equipment checked out".to_string(),
        ));
    }

    if let Some(returned) = borrow.actual_return_time {
        entries.push(entry(
            returned,
            LogEntryKind::BorrowReturned,
            "Return confirmed".to_string(),
        ));
    }

    if borrow.status == BorrowStatus::Completed {
        entries.push(entry(
            borrow.updated_at,
            LogEntryKind::BorrowCompleted,
            "Borrow completed".to_string(),
        ));
    }

    entries
}

/// Validate and convert one raw JSON log column. Entries must be objects
/// carrying a parseable `timestamp`; everything else is dropped with a
/// warning rather than failing the whole build.
fn parse_raw_log(raw: &serde_json::Value, kind: LogEntryKind, source: &str) -> Vec<LogEntry> {
    let Some(items) = raw.as_array() else {
        if !raw.is_null() {
            tracing::warn!(source, "Log column is not a JSON array, skipping");
        }
        return Vec::new();
    };

    let mut entries = Vec::new();
    for item in items {
        let Some(object) = item.as_object() else {
            tracing::warn!(source, "Skipping non-object log entry");
            continue;
        };
        let Some(timestamp) = object
            .get("timestamp")
            .and_then(|t| t.as_str())
            .and_then(parse_timestamp)
        else {
            tracing::warn!(source, "Skipping log entry with missing or malformed timestamp");
            continue;
        };

        let summary = object
            .get("description")
            .or_else(|| object.get("note"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| match kind {
                LogEntryKind::Edit => "Equipment details edited".to_string(),
                LogEntryKind::Maintenance => "Maintenance performed".to_string(),
                _ => "Note added".to_string(),
            });

        entries.push(LogEntry {
            timestamp,
            kind,
            summary,
            borrow_id: None,
            detail: Some(item.clone()),
        });
    }
    entries
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{EquipmentCategory, EquipmentStatus, ReservationType};
    use chrono::TimeZone;
    use serde_json::json;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, 0, 0).unwrap()
    }

    fn equipment() -> Equipment {
        Equipment {
            id: 1,
            name: "Signal generator".to_string(),
            category: EquipmentCategory::Instruments,
            stock_count: 1,
            status: EquipmentStatus::Available,
            is_data_generating: false,
            condition: None,
            description: None,
            purchase_cost: None,
            maintenance_log: json!([]),
            edit_history: json!([]),
            notes_log: json!([]),
            created_at: ts(1),
            updated_at: ts(1),
        }
    }

    fn borrow() -> Borrow {
        Borrow {
            id: 9,
            equipment_id: 1,
            borrower_id: 42,
            class_id: None,
            borrow_group_id: None,
            reservation_type: ReservationType::OutOfClass,
            status: BorrowStatus::Active,
            request_submission_time: ts(2),
            requested_start_time: ts(9),
            requested_end_time: ts(17),
            approved_start_time: Some(ts(9)),
            approved_end_time: Some(ts(17)),
            checkout_time: Some(ts(4)),
            actual_return_time: None,
            decided_at: Some(ts(3)),
            return_condition: None,
            return_remarks: None,
            data_requested: false,
            data_request_status: None,
            data_request_remarks: None,
            data_files: None,
            requested_equipment_ids: None,
            updated_at: ts(4),
        }
    }

    #[test]
    fn test_log_is_newest_first() {
        // Creation at T-3, request at T-2, approval at T-1, checkout at T-0
        let log = build_activity_log(&equipment(), &[borrow()]);
        let kinds: Vec<LogEntryKind> = log.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LogEntryKind::BorrowCheckedOut,
                LogEntryKind::BorrowApproved,
                LogEntryKind::BorrowRequested,
                LogEntryKind::Created,
            ]
        );
        assert!(log.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn test_rejected_borrow_entries() {
        let mut b = borrow();
        b.status = BorrowStatus::RejectedFic;
        b.checkout_time = None;
        let log = build_activity_log(&equipment(), &[b]);
        assert!(log.iter().any(|e| e.kind == LogEntryKind::BorrowRejected));
        assert!(!log.iter().any(|e| e.kind == LogEntryKind::BorrowApproved));
    }

    #[test]
    fn test_malformed_maintenance_entries_are_skipped() {
        let mut eq = equipment();
        eq.maintenance_log = json!([
            {"timestamp": "2026-03-10T05:00:00Z", "description": "Recalibrated"},
            {"description": "No timestamp here"},
            {"timestamp": "not-a-date", "description": "Bad timestamp"},
            "just a string",
            42,
        ]);
        let log = build_activity_log(&eq, &[]);
        let maintenance: Vec<_> = log
            .iter()
            .filter(|e| e.kind == LogEntryKind::Maintenance)
            .collect();
        assert_eq!(maintenance.len(), 1);
        assert_eq!(maintenance[0].summary, "Recalibrated");
    }

    #[test]
    fn test_non_array_log_column_is_tolerated() {
        let mut eq = equipment();
        eq.notes_log = json!({"oops": "not an array"});
        let log = build_activity_log(&eq, &[]);
        assert_eq!(log.len(), 1); // just the creation entry
    }

    #[test]
    fn test_completed_borrow_has_completion_entry() {
        let mut b = borrow();
        b.status = BorrowStatus::Completed;
        b.actual_return_time = Some(ts(6));
        b.updated_at = ts(6);
        let log = build_activity_log(&equipment(), &[b]);
        assert!(log.iter().any(|e| e.kind == LogEntryKind::BorrowCompleted));
        assert!(log.iter().any(|e| e.kind == LogEntryKind::BorrowReturned));
    }
}
