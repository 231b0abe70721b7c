//! Group transaction semantics
//!
//! A borrow group is every borrow sharing one `borrow_group_id`
//! (singletons are normalized to `individual-<id>` keys). Approve and
//! reject treat the group as a single unit: one failing member aborts
//! the whole action. Checkout and confirm-return are best effort, since
//! a single already-returned or cancelled item should not block the
//! rest of the group.

use chrono::{DateTime, Utc};

use crate::lifecycle::machine::{self, BorrowEvent, LifecyclePolicy, TransitionParams};
use crate::models::borrow::{Borrow, GroupItemOutcome};
use crate::models::user::Actor;

/// Bulk actions applicable to a borrow group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAction {
    Approve,
    Reject,
    Checkout,
    ConfirmReturn,
}

impl GroupAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupAction::Approve => "approve",
            GroupAction::Reject => "reject",
            GroupAction::Checkout => "checkout",
            GroupAction::ConfirmReturn => "confirm-return",
        }
    }

    /// The single-item event this action applies to every member
    pub fn event(&self) -> BorrowEvent {
        match self {
            GroupAction::Approve => BorrowEvent::Approve,
            GroupAction::Reject => BorrowEvent::Reject,
            GroupAction::Checkout => BorrowEvent::Checkout,
            GroupAction::ConfirmReturn => BorrowEvent::ConfirmReturn,
        }
    }

    /// All-or-nothing actions run in one transaction spanning the group;
    /// the rest apply per member and report individual failures.
    pub fn is_atomic(&self) -> bool {
        matches!(self, GroupAction::Approve | GroupAction::Reject)
    }
}

impl std::str::FromStr for GroupAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(GroupAction::Approve),
            "reject" => Ok(GroupAction::Reject),
            "checkout" => Ok(GroupAction::Checkout),
            "confirm-return" => Ok(GroupAction::ConfirmReturn),
            _ => Err(format!("Invalid group action: {}", s)),
        }
    }
}

/// Machine-level plan for an atomic group action: every member's outcome,
/// or the per-item guard failures that abort the action. Availability is
/// re-checked later, inside the transaction.
pub fn plan_atomic(
    members: &[Borrow],
    event: BorrowEvent,
    actor: &Actor,
    params: &TransitionParams,
    now: DateTime<Utc>,
    policy: &LifecyclePolicy,
) -> Result<Vec<(i32, machine::TransitionOutcome)>, Vec<GroupItemOutcome>> {
    let mut outcomes = Vec::with_capacity(members.len());
    let mut failures = Vec::new();

    for member in members {
        match machine::apply(member, event, actor, params, now, policy) {
            Ok(outcome) => outcomes.push((member.id, outcome)),
            Err(e) => failures.push(GroupItemOutcome {
                borrow_id: member.id,
                status: None,
                error: Some(e.to_string()),
            }),
        }
    }

    if failures.is_empty() {
        Ok(outcomes)
    } else {
        Err(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{BorrowStatus, ReservationType, Role};
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, 0, 0).unwrap()
    }

    fn member(id: i32, status: BorrowStatus) -> Borrow {
        Borrow {
            id,
            equipment_id: id,
            borrower_id: 42,
            class_id: None,
            borrow_group_id: Some("g-1".to_string()),
            reservation_type: ReservationType::OutOfClass,
            status,
            request_submission_time: ts(0),
            requested_start_time: ts(9),
            requested_end_time: ts(17),
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
            updated_at: ts(0),
        }
    }

    fn staff() -> Actor {
        Actor {
            user_id: 1,
            roles: vec![Role::Staff],
        }
    }

    #[test]
    fn test_action_policies() {
        assert!(GroupAction::Approve.is_atomic());
        assert!(GroupAction::Reject.is_atomic());
        assert!(!GroupAction::Checkout.is_atomic());
        assert!(!GroupAction::ConfirmReturn.is_atomic());
    }

    #[test]
    fn test_group_key_normalizes_singletons() {
        let grouped = member(1, BorrowStatus::Pending);
        assert_eq!(grouped.group_key(), "g-1");

        let mut single = member(5, BorrowStatus::Pending);
        single.borrow_group_id = None;
        assert_eq!(single.group_key(), "individual-5");
    }

    #[test]
    fn test_plan_atomic_all_pending_succeeds() {
        let members = vec![
            member(1, BorrowStatus::Pending),
            member(2, BorrowStatus::Pending),
            member(3, BorrowStatus::Pending),
        ];
        let plan = plan_atomic(
            &members,
            BorrowEvent::Approve,
            &staff(),
            &TransitionParams::default(),
            ts(1),
            &LifecyclePolicy::default(),
        )
        .unwrap();
        assert_eq!(plan.len(), 3);
        assert!(plan.iter().all(|(_, o)| o.status == BorrowStatus::Approved));
    }

    #[test]
    fn test_plan_atomic_one_bad_member_aborts_all() {
        let members = vec![
            member(1, BorrowStatus::Pending),
            member(2, BorrowStatus::Cancelled),
            member(3, BorrowStatus::Pending),
        ];
        let failures = plan_atomic(
            &members,
            BorrowEvent::Approve,
            &staff(),
            &TransitionParams::default(),
            ts(1),
            &LifecyclePolicy::default(),
        )
        .unwrap_err();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].borrow_id, 2);
        assert!(failures[0].error.is_some());
    }
}
