//! Equipment availability calculator
//!
//! Pure window-overlap math over occupying borrows, plus the read-only
//! service queries built on it. These reads are advisory: the
//! authoritative check re-runs inside the transition transaction with
//! the equipment row locked (see the borrows service).

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::BTreeMap;

use crate::{
    error::{AppError, AppResult},
    models::borrow::Borrow,
    models::equipment::Equipment,
    repository::Repository,
};

/// Half-open interval overlap: `[a_start, a_end)` vs `[b_start, b_end)`
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Number of borrows occupying the item over `[start, end)`, using each
/// borrow's effective window (approved if set, else requested)
pub fn count_occupying(borrows: &[Borrow], start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    borrows
        .iter()
        .filter(|b| b.status.is_occupying())
        .filter(|b| {
            let (b_start, b_end) = b.effective_window();
            overlaps(b_start, b_end, start, end)
        })
        .count() as i64
}

/// Whether a unit is free over `[start, end)` given the item's stored
/// status and its current borrows
pub fn is_available(
    equipment: &Equipment,
    borrows: &[Borrow],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> bool {
    if equipment.status.is_unavailable() {
        return false;
    }
    count_occupying(borrows, start, end) < equipment.stock_count as i64
}

/// How far ahead the calendar reports blocked dates for an item with an
/// unavailable override status (the outage itself is open-ended)
pub const CALENDAR_HORIZON_DAYS: i64 = 90;

/// Calendar dates on which no unit is free, starting from `today`. An
/// item carrying an unavailable override status blocks every day of the
/// horizon regardless of borrows.
pub fn unavailable_dates(
    equipment: &Equipment,
    borrows: &[Borrow],
    today: NaiveDate,
) -> Vec<NaiveDate> {
    if equipment.status.is_unavailable() {
        return (0..CALENDAR_HORIZON_DAYS)
            .map(|offset| today + Duration::days(offset))
            .collect();
    }

    let mut per_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();

    for borrow in borrows.iter().filter(|b| b.status.is_occupying()) {
        let (start, end) = borrow.effective_window();
        let mut day = start.date_naive();
        let last = end.date_naive();
        while day <= last {
            let day_start = day.and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc();
            let day_end = day_start + Duration::days(1);
            if overlaps(start, end, day_start, day_end) {
                *per_day.entry(day).or_insert(0) += 1;
            }
            day += Duration::days(1);
        }
    }

    per_day
        .into_iter()
        .filter(|(_, count)| *count >= equipment.stock_count as i64)
        .map(|(day, _)| day)
        .collect()
}

#[derive(Clone)]
pub struct AvailabilityService {
    repository: Repository,
}

impl AvailabilityService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Whether the item has a free unit over `[start, end)`
    pub async fn is_available(
        &self,
        equipment_id: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<bool> {
        if end <= start {
            return Err(AppError::Validation(
                "End time must be after the start time".to_string(),
            ));
        }
        let equipment = self.repository.equipment.get_by_id(equipment_id).await?;
        let borrows = self
            .repository
            .borrows
            .list_occupying_for_equipment(equipment_id)
            .await?;
        Ok(is_available(&equipment, &borrows, start, end))
    }

    /// Fully-booked dates for calendar display
    pub async fn unavailable_dates(&self, equipment_id: i32) -> AppResult<Vec<NaiveDate>> {
        let equipment = self.repository.equipment.get_by_id(equipment_id).await?;
        let borrows = self
            .repository
            .borrows
            .list_occupying_for_equipment(equipment_id)
            .await?;
        Ok(unavailable_dates(
            &equipment,
            &borrows,
            Utc::now().date_naive(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{
        BorrowStatus, EquipmentCategory, EquipmentStatus, ReservationType,
    };
    use chrono::TimeZone;

    fn ts(day: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, h, 0, 0).unwrap()
    }

    fn equipment(stock: i32, status: EquipmentStatus) -> Equipment {
        Equipment {
            id: 1,
            name: "Oscilloscope".to_string(),
            category: EquipmentCategory::Instruments,
            stock_count: stock,
            status,
            is_data_generating: false,
            condition: None,
            description: None,
            purchase_cost: None,
            maintenance_log: serde_json::json!([]),
            edit_history: serde_json::json!([]),
            notes_log: serde_json::json!([]),
            created_at: ts(1, 0),
            updated_at: ts(1, 0),
        }
    }

    fn borrow(id: i32, status: BorrowStatus, start: DateTime<Utc>, end: DateTime<Utc>) -> Borrow {
        Borrow {
            id,
            equipment_id: 1,
            borrower_id: 42,
            class_id: None,
            borrow_group_id: None,
            reservation_type: ReservationType::OutOfClass,
            status,
            request_submission_time: ts(1, 0),
            requested_start_time: start,
            requested_end_time: end,
            approved_start_time: None,
            approved_end_time: None,
            checkout_time: None,
            actual_return_time: None,
            decided_at: None,
            return_condition: None,
            return_remarks: None,
            data_requested: false,
            data_request_status: None,
            data_request_remarks: None,
            data_files: None,
            requested_equipment_ids: None,
            updated_at: ts(1, 0),
        }
    }

    #[test]
    fn test_overlap_half_open() {
        // Touching endpoints do not overlap
        assert!(!overlaps(ts(1, 9), ts(1, 12), ts(1, 12), ts(1, 15)));
        assert!(overlaps(ts(1, 9), ts(1, 12), ts(1, 11), ts(1, 15)));
        assert!(overlaps(ts(1, 9), ts(1, 17), ts(1, 10), ts(1, 11)));
    }

    #[test]
    fn test_terminal_borrows_do_not_occupy() {
        let borrows = vec![
            borrow(1, BorrowStatus::Cancelled, ts(1, 9), ts(1, 17)),
            borrow(2, BorrowStatus::Completed, ts(1, 9), ts(1, 17)),
            borrow(3, BorrowStatus::RejectedStaff, ts(1, 9), ts(1, 17)),
        ];
        assert_eq!(count_occupying(&borrows, ts(1, 9), ts(1, 17)), 0);
    }

    #[test]
    fn test_stock_exhaustion() {
        let eq = equipment(2, EquipmentStatus::Available);
        let borrows = vec![
            borrow(1, BorrowStatus::Pending, ts(1, 9), ts(1, 17)),
            borrow(2, BorrowStatus::Approved, ts(1, 10), ts(1, 14)),
        ];
        assert!(!is_available(&eq, &borrows, ts(1, 11), ts(1, 13)));
        // A non-overlapping window is still free
        assert!(is_available(&eq, &borrows, ts(2, 9), ts(2, 17)));
        // One overlapping borrow leaves a unit free
        assert!(is_available(&eq, &borrows, ts(1, 15), ts(1, 16)));
    }

    #[test]
    fn test_approved_window_takes_precedence() {
        let eq = equipment(1, EquipmentStatus::Available);
        let mut b = borrow(1, BorrowStatus::Approved, ts(1, 9), ts(1, 17));
        // Approval narrowed the window to the afternoon
        b.approved_start_time = Some(ts(1, 13));
        b.approved_end_time = Some(ts(1, 17));
        let borrows = vec![b];
        assert!(is_available(&eq, &borrows, ts(1, 9), ts(1, 12)));
        assert!(!is_available(&eq, &borrows, ts(1, 14), ts(1, 16)));
    }

    #[test]
    fn test_unavailable_override_blocks_everything() {
        let eq = equipment(5, EquipmentStatus::UnderMaintenance);
        assert!(!is_available(&eq, &[], ts(1, 9), ts(1, 17)));
    }

    #[test]
    fn test_unavailable_dates_at_stock_limit() {
        let eq = equipment(2, EquipmentStatus::Available);
        let borrows = vec![
            borrow(1, BorrowStatus::Approved, ts(1, 9), ts(2, 17)),
            borrow(2, BorrowStatus::Pending, ts(2, 9), ts(3, 17)),
        ];
        // Only March 2 has both units taken
        let dates = unavailable_dates(&eq, &borrows, ts(1, 0).date_naive());
        assert_eq!(dates, vec![ts(2, 0).date_naive()]);
    }

    #[test]
    fn test_unavailable_dates_midnight_boundary() {
        let eq = equipment(1, EquipmentStatus::Available);
        // Ends exactly at midnight: March 3 is not touched
        let borrows = vec![borrow(1, BorrowStatus::Approved, ts(1, 9), ts(3, 0))];
        let dates = unavailable_dates(&eq, &borrows, ts(1, 0).date_naive());
        assert_eq!(dates, vec![ts(1, 0).date_naive(), ts(2, 0).date_naive()]);
    }

    #[test]
    fn test_override_status_blocks_whole_horizon() {
        // No borrows at all: the calendar must still show the outage
        let eq = equipment(3, EquipmentStatus::UnderMaintenance);
        let today = ts(1, 0).date_naive();
        let dates = unavailable_dates(&eq, &[], today);
        assert_eq!(dates.len() as i64, CALENDAR_HORIZON_DAYS);
        assert_eq!(dates[0], today);
        assert_eq!(
            *dates.last().unwrap(),
            today + Duration::days(CALENDAR_HORIZON_DAYS - 1)
        );
    }
}
