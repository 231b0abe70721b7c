//! Borrow state machine
//!
//! Pure transition logic for a single borrow record: which events are
//! legal from which state, who may trigger them, and which fields they
//! write. Persistence happens elsewhere; a guard failure here returns an
//! error before anything is written, so a failed transition never
//! mutates the record.

use chrono::{DateTime, Duration, Utc};

use crate::config::LifecycleConfig;
use crate::error::{AppError, AppResult};
use crate::models::borrow::Borrow;
use crate::models::enums::{BorrowStatus, Role};
use crate::models::user::Actor;

/// Events that drive the borrow state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowEvent {
    Approve,
    Reject,
    Cancel,
    Checkout,
    RejectApproved,
    RequestReturn,
    ConfirmReturn,
    Finalize,
}

impl BorrowEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowEvent::Approve => "approve",
            BorrowEvent::Reject => "reject",
            BorrowEvent::Cancel => "cancel",
            BorrowEvent::Checkout => "checkout",
            BorrowEvent::RejectApproved => "reject-approved",
            BorrowEvent::RequestReturn => "request-return",
            BorrowEvent::ConfirmReturn => "confirm-return",
            BorrowEvent::Finalize => "finalize",
        }
    }

    /// Events that commit stock and therefore must re-check availability
    /// inside the same transaction that writes the new state.
    pub fn requires_availability_check(&self) -> bool {
        matches!(self, BorrowEvent::Approve | BorrowEvent::Checkout)
    }
}

impl std::fmt::Display for BorrowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle tunables resolved from configuration
#[derive(Debug, Clone)]
pub struct LifecyclePolicy {
    /// First role in this list held by the actor decides the rejection kind
    pub rejection_precedence: Vec<Role>,
    /// Checkout is allowed from this long before the approved start
    pub checkout_grace: Duration,
    pub late_request_threshold_hours: i64,
}

impl LifecyclePolicy {
    pub fn from_config(config: &LifecycleConfig) -> Self {
        let rejection_precedence = config
            .rejection_precedence
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        Self {
            rejection_precedence,
            checkout_grace: Duration::hours(config.checkout_grace_hours),
            late_request_threshold_hours: config.late_request_threshold_hours,
        }
    }
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self::from_config(&LifecycleConfig::default())
    }
}

/// Caller-supplied inputs for a transition
#[derive(Debug, Clone, Default)]
pub struct TransitionParams {
    pub approved_start_time: Option<DateTime<Utc>>,
    pub approved_end_time: Option<DateTime<Utc>>,
    pub return_condition: Option<String>,
    pub return_remarks: Option<String>,
}

/// Field writes produced by a successful transition. `None` means leave
/// the column untouched.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub status: BorrowStatus,
    pub approved_start_time: Option<DateTime<Utc>>,
    pub approved_end_time: Option<DateTime<Utc>>,
    pub checkout_time: Option<DateTime<Utc>>,
    pub actual_return_time: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    pub return_condition: Option<String>,
    pub return_remarks: Option<String>,
}

impl TransitionOutcome {
    fn status_only(status: BorrowStatus) -> Self {
        Self {
            status,
            approved_start_time: None,
            approved_end_time: None,
            checkout_time: None,
            actual_return_time: None,
            decided_at: None,
            return_condition: None,
            return_remarks: None,
        }
    }
}

/// Derive the read-time status: an active borrow past its approved end is
/// overdue. Nothing is persisted; re-deriving is always a no-op.
pub fn effective_status(
    status: BorrowStatus,
    approved_end_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> BorrowStatus {
    match (status, approved_end_time) {
        (BorrowStatus::Active, Some(end)) if now > end => BorrowStatus::Overdue,
        _ => status,
    }
}

/// Which rejection kind a rejection by this actor produces. Resolved from
/// the configured role precedence list so multi-role users behave
/// deterministically.
pub fn rejection_status(actor: &Actor, precedence: &[Role]) -> BorrowStatus {
    for role in precedence {
        if actor.has_role(*role) {
            return match role {
                Role::Fic => BorrowStatus::RejectedFic,
                _ => BorrowStatus::RejectedStaff,
            };
        }
    }
    BorrowStatus::RejectedStaff
}

fn invalid(from: BorrowStatus, event: BorrowEvent) -> AppError {
    AppError::InvalidTransition {
        from: from.as_str().to_string(),
        event: event.as_str().to_string(),
    }
}

fn require_approver(actor: &Actor, event: BorrowEvent) -> AppResult<()> {
    if actor.is_approver() {
        Ok(())
    } else {
        Err(AppError::Authorization(format!(
            "Only faculty or staff may {}",
            event
        )))
    }
}

fn require_borrower(actor: &Actor, borrow: &Borrow, event: BorrowEvent) -> AppResult<()> {
    if actor.user_id == borrow.borrower_id {
        Ok(())
    } else {
        Err(AppError::Authorization(format!(
            "Only the borrower may {}",
            event
        )))
    }
}

/// Validate and compute a single transition. Returns the field writes to
/// apply, or an error when a guard fails. Callers handle availability
/// checks (for events that commit stock) and persistence.
pub fn apply(
    borrow: &Borrow,
    event: BorrowEvent,
    actor: &Actor,
    params: &TransitionParams,
    now: DateTime<Utc>,
    policy: &LifecyclePolicy,
) -> AppResult<TransitionOutcome> {
    let current = effective_status(borrow.status, borrow.approved_end_time, now);

    match (current, event) {
        (BorrowStatus::Pending, BorrowEvent::Approve) => {
            require_approver(actor, event)?;
            // Default window is the requested one unless staff narrows it
            let start = params
                .approved_start_time
                .unwrap_or(borrow.requested_start_time);
            let end = params.approved_end_time.unwrap_or(borrow.requested_end_time);
            if end <= start {
                return Err(AppError::Validation(
                    "Approved end time must be after the start time".to_string(),
                ));
            }
            Ok(TransitionOutcome {
                approved_start_time: Some(start),
                approved_end_time: Some(end),
                decided_at: Some(now),
                ..TransitionOutcome::status_only(BorrowStatus::Approved)
            })
        }
        (BorrowStatus::Pending, BorrowEvent::Reject) => {
            require_approver(actor, event)?;
            Ok(TransitionOutcome {
                decided_at: Some(now),
                ..TransitionOutcome::status_only(rejection_status(
                    actor,
                    &policy.rejection_precedence,
                ))
            })
        }
        (BorrowStatus::Pending, BorrowEvent::Cancel) => {
            require_borrower(actor, borrow, event)?;
            Ok(TransitionOutcome {
                decided_at: Some(now),
                ..TransitionOutcome::status_only(BorrowStatus::Cancelled)
            })
        }
        (BorrowStatus::Approved, BorrowEvent::Checkout) => {
            require_approver(actor, event)?;
            let (start, end) = borrow.effective_window();
            if now < start - policy.checkout_grace || now >= end {
                return Err(AppError::Validation(format!(
                    "Checkout outside the approved window ({} to {})",
                    start, end
                )));
            }
            Ok(TransitionOutcome {
                checkout_time: Some(now),
                ..TransitionOutcome::status_only(BorrowStatus::Active)
            })
        }
        (BorrowStatus::Approved, BorrowEvent::RejectApproved) => {
            // Reversing an approval before checkout releases the slot
            require_approver(actor, event)?;
            Ok(TransitionOutcome {
                decided_at: Some(now),
                ..TransitionOutcome::status_only(rejection_status(
                    actor,
                    &policy.rejection_precedence,
                ))
            })
        }
        (BorrowStatus::Active | BorrowStatus::Overdue, BorrowEvent::RequestReturn) => {
            require_borrower(actor, borrow, event)?;
            let condition = params.return_condition.clone().ok_or_else(|| {
                AppError::Validation("Return condition is required".to_string())
            })?;
            Ok(TransitionOutcome {
                return_condition: Some(condition),
                return_remarks: params.return_remarks.clone(),
                ..TransitionOutcome::status_only(BorrowStatus::PendingReturn)
            })
        }
        (BorrowStatus::PendingReturn, BorrowEvent::ConfirmReturn) => {
            require_approver(actor, event)?;
            Ok(TransitionOutcome {
                actual_return_time: Some(now),
                ..TransitionOutcome::status_only(BorrowStatus::Returned)
            })
        }
        // Automatic once nothing further is pending; no actor guard
        (BorrowStatus::Returned, BorrowEvent::Finalize) => {
            Ok(TransitionOutcome::status_only(BorrowStatus::Completed))
        }
        (from, event) => Err(invalid(from, event)),
    }
}
