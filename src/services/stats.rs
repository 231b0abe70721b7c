//! Dashboard and usage statistics

use chrono::Duration;
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::borrow::Borrow,
    repository::Repository,
};

/// Borrow counts by status for one user
#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub total: i64,
    /// Status slug -> count
    pub counts: BTreeMap<String, i64>,
}

/// Accumulated contact hours for one equipment item
#[derive(Debug, Serialize, ToSchema)]
pub struct UsageSummary {
    pub total_minutes: i64,
    /// Human-readable form, e.g. "1h 35m"
    pub formatted: String,
}

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Borrow counts by status for the user's dashboard
    pub async fn dashboard_summary(&self, user_id: i32) -> AppResult<DashboardSummary> {
        let rows = self
            .repository
            .borrows
            .counts_by_status_for_user(user_id)
            .await?;
        let mut counts = BTreeMap::new();
        let mut total = 0;
        for (status, count) in rows {
            counts.insert(status.as_str().to_string(), count);
            total += count;
        }
        Ok(DashboardSummary { total, counts })
    }

    /// Net contact hours over all returned/completed borrows of an item
    pub async fn net_contact_hours(&self, equipment_id: i32) -> AppResult<UsageSummary> {
        // Verify the item exists so a bad id is a 404, not an empty total
        self.repository.equipment.get_by_id(equipment_id).await?;
        let finished = self
            .repository
            .borrows
            .list_finished_for_equipment(equipment_id)
            .await?;
        let total = contact_duration(&finished);
        Ok(UsageSummary {
            total_minutes: total.num_minutes(),
            formatted: format_contact_hours(total),
        })
    }
}

/// Sum checkout-to-return durations, discarding records with a missing
/// timestamp or a negative duration (logged, not thrown)
pub fn contact_duration(borrows: &[Borrow]) -> Duration {
    let mut total = Duration::zero();
    for borrow in borrows {
        match (borrow.checkout_time, borrow.actual_return_time) {
            (Some(checkout), Some(returned)) => {
                let duration = returned - checkout;
                if duration < Duration::zero() {
                    tracing::warn!(
                        borrow_id = borrow.id,
                        "Skipping borrow with negative contact duration"
                    );
                    continue;
                }
                total = total + duration;
            }
            _ => {
                tracing::warn!(
                    borrow_id = borrow.id,
                    "Skipping finished borrow with missing checkout/return timestamp"
                );
            }
        }
    }
    total
}

/// Format a duration as "<h>h <m>m"
pub fn format_contact_hours(duration: Duration) -> String {
    let minutes = duration.num_minutes();
    format!("{}h {}m", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{BorrowStatus, ReservationType};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, m, 0).unwrap()
    }

    fn finished(id: i32, checkout: Option<DateTime<Utc>>, returned: Option<DateTime<Utc>>) -> Borrow {
        Borrow {
            id,
            equipment_id: 1,
            borrower_id: 42,
            class_id: None,
            borrow_group_id: None,
            reservation_type: ReservationType::OutOfClass,
            status: BorrowStatus::Completed,
            request_submission_time: at(0, 0),
            requested_start_time: at(9, 0),
            requested_end_time: at(17, 0),
            approved_start_time: None,
            approved_end_time: None,
            checkout_time: checkout,
            actual_return_time: returned,
            decided_at: None,
            return_condition: None,
            return_remarks: None,
            data_requested: false,
            data_request_status: None,
            data_request_remarks: None,
            data_files: None,
            requested_equipment_ids: None,
            updated_at: at(0, 0),
        }
    }

    #[test]
    fn test_contact_hours_sums_pairs() {
        // (10:00-11:30) + (14:00-14:05) = 1h 35m
        let borrows = vec![
            finished(1, Some(at(10, 0)), Some(at(11, 30))),
            finished(2, Some(at(14, 0)), Some(at(14, 5))),
        ];
        let total = contact_duration(&borrows);
        assert_eq!(total.num_minutes(), 95);
        assert_eq!(format_contact_hours(total), "1h 35m");
    }

    #[test]
    fn test_invalid_pairs_are_discarded() {
        let borrows = vec![
            finished(1, Some(at(10, 0)), Some(at(11, 0))),
            // Negative duration
            finished(2, Some(at(15, 0)), Some(at(14, 0))),
            // Missing return
            finished(3, Some(at(9, 0)), None),
            // Missing checkout
            finished(4, None, Some(at(12, 0))),
        ];
        let total = contact_duration(&borrows);
        assert_eq!(total.num_minutes(), 60);
    }

    #[test]
    fn test_format_zero() {
        assert_eq!(format_contact_hours(Duration::zero()), "0h 0m");
    }
}
