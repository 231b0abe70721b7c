//! Borrow lifecycle service
//!
//! Orchestrates the pure state machine against the store: every
//! transition is one read-modify-write transaction, and events that
//! commit stock re-run the availability check with the equipment row
//! locked so concurrent approvals cannot jointly overcommit it.

use chrono::Utc;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    lifecycle::{
        group::{self, GroupAction},
        machine::{self, BorrowEvent, LifecyclePolicy, TransitionOutcome, TransitionParams},
    },
    models::borrow::{
        Borrow, BorrowDetails, CreateBorrowRequest, CreatedBorrows, GroupActionResult,
        GroupItemOutcome, NewBorrow, ReportDeficiency, UpdateDataRequest,
    },
    models::deficiency::Deficiency,
    models::enums::{BorrowStatus, ReservationType},
    models::user::Actor,
    repository::Repository,
};

#[derive(Clone)]
pub struct BorrowsService {
    repository: Repository,
    policy: LifecyclePolicy,
}

impl BorrowsService {
    pub fn new(repository: Repository, policy: LifecyclePolicy) -> Self {
        Self { repository, policy }
    }

    fn details(&self, borrow: Borrow) -> BorrowDetails {
        let now = Utc::now();
        let effective_status =
            machine::effective_status(borrow.status, borrow.approved_end_time, now);
        let is_late_request = borrow.is_late_request(self.policy.late_request_threshold_hours);
        let group_key = borrow.group_key();
        BorrowDetails {
            borrow,
            effective_status,
            is_late_request,
            group_key,
        }
    }

    /// Get one borrow with derived fields
    pub async fn get_details(&self, id: i32) -> AppResult<BorrowDetails> {
        let borrow = self.repository.borrows.get_by_id(id).await?;
        Ok(self.details(borrow))
    }

    /// Get a user's borrows, newest request first
    pub async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<BorrowDetails>> {
        self.repository.users.get_by_id(user_id).await?;
        let borrows = self.repository.borrows.list_for_user(user_id).await?;
        Ok(borrows.into_iter().map(|b| self.details(b)).collect())
    }

    /// Create one or more PENDING borrows. More than one equipment id (or
    /// any group mates) groups them under one borrow_group_id.
    pub async fn create_request(
        &self,
        actor: &Actor,
        request: &CreateBorrowRequest,
    ) -> AppResult<CreatedBorrows> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        if request.requested_end_time <= request.requested_start_time {
            return Err(AppError::Validation(
                "Requested end time must be after the start time".to_string(),
            ));
        }
        if request.reservation_type == ReservationType::InClass && request.class_id.is_none() {
            return Err(AppError::Validation(
                "In-class reservations require a class".to_string(),
            ));
        }
        // A duplicate id would create two borrows fighting over the same
        // unit; a multi-unit need is expressed once per physical item
        let mut seen = std::collections::HashSet::new();
        if !request.equipment_ids.iter().all(|id| seen.insert(*id)) {
            return Err(AppError::Validation(
                "Duplicate equipment ids in request".to_string(),
            ));
        }
        self.repository.users.get_by_id(actor.user_id).await?;

        // Advisory availability pre-check for a friendly error before any
        // write; the binding check happens again at approval time.
        for &equipment_id in &request.equipment_ids {
            let equipment = self.repository.equipment.get_by_id(equipment_id).await?;
            if equipment.status.is_unavailable() {
                return Err(AppError::AvailabilityConflict(format!(
                    "Equipment '{}' is {}",
                    equipment.name, equipment.status
                )));
            }
            let occupying = self
                .repository
                .borrows
                .count_overlapping_occupying(
                    &self.repository.pool,
                    equipment_id,
                    request.requested_start_time,
                    request.requested_end_time,
                    &[],
                )
                .await?;
            if occupying >= equipment.stock_count as i64 {
                return Err(AppError::AvailabilityConflict(format!(
                    "Equipment '{}' has no free unit in the requested window",
                    equipment.name
                )));
            }
        }

        let grouped = request.equipment_ids.len() > 1 || !request.group_mate_ids.is_empty();
        let borrow_group_id = grouped.then(|| Uuid::new_v4().to_string());
        let requested_equipment_ids =
            grouped.then(|| serde_json::json!(request.equipment_ids.clone()));

        let now = Utc::now();
        let mut tx = self.repository.pool.begin().await?;
        let mut borrow_ids = Vec::with_capacity(request.equipment_ids.len());
        for &equipment_id in &request.equipment_ids {
            let new_borrow = NewBorrow {
                equipment_id,
                borrower_id: actor.user_id,
                class_id: request.class_id,
                borrow_group_id: borrow_group_id.clone(),
                reservation_type: request.reservation_type,
                requested_start_time: request.requested_start_time,
                requested_end_time: request.requested_end_time,
                data_requested: request.data_requested,
                requested_equipment_ids: requested_equipment_ids.clone(),
            };
            let created = self.repository.borrows.create(&mut tx, &new_borrow, now).await?;
            borrow_ids.push(created.id);
        }
        tx.commit().await?;

        tracing::info!(
            borrower_id = actor.user_id,
            count = borrow_ids.len(),
            group_id = ?borrow_group_id,
            "Borrow request created"
        );

        Ok(CreatedBorrows {
            borrow_ids,
            borrow_group_id,
        })
    }

    /// Apply one state-machine event to one borrow. The whole transition
    /// is a single transaction; a guard or availability failure aborts it
    /// with the record untouched.
    pub async fn transition(
        &self,
        id: i32,
        event: BorrowEvent,
        actor: &Actor,
        params: TransitionParams,
        deficiencies: &[ReportDeficiency],
    ) -> AppResult<BorrowDetails> {
        let now = Utc::now();
        let mut tx = self.repository.pool.begin().await?;
        let borrow = self.repository.borrows.get_for_update(&mut tx, id).await?;
        let outcome = machine::apply(&borrow, event, actor, &params, now, &self.policy)?;

        if event.requires_availability_check() {
            self.check_availability_locked(&mut tx, &borrow, &outcome).await?;
        }

        let mut updated = self
            .repository
            .borrows
            .apply_outcome(&mut *tx, id, &outcome, now)
            .await?;

        if updated.status == BorrowStatus::Returned {
            for report in deficiencies {
                self.repository
                    .deficiencies
                    .create(&mut tx, id, report, now)
                    .await?;
            }
            // Nothing further pending: finalize in the same transaction
            if deficiencies.is_empty() {
                let finalize = machine::apply(
                    &updated,
                    BorrowEvent::Finalize,
                    actor,
                    &TransitionParams::default(),
                    now,
                    &self.policy,
                )?;
                updated = self
                    .repository
                    .borrows
                    .apply_outcome(&mut *tx, id, &finalize, now)
                    .await?;
            }
        }
        tx.commit().await?;

        tracing::info!(
            borrow_id = id,
            event = event.as_str(),
            status = updated.status.as_str(),
            "Borrow transitioned"
        );
        Ok(self.details(updated))
    }

    /// Availability check for events that commit stock, run with the
    /// equipment row locked so concurrent transitions for the same item
    /// serialize on it.
    async fn check_availability_locked(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        borrow: &Borrow,
        outcome: &TransitionOutcome,
    ) -> AppResult<()> {
        let equipment = self
            .repository
            .equipment
            .get_for_update(tx, borrow.equipment_id)
            .await?;
        if equipment.status.is_unavailable() {
            return Err(AppError::AvailabilityConflict(format!(
                "Equipment '{}' is {}",
                equipment.name, equipment.status
            )));
        }
        // The window being committed: the outcome's approved window for an
        // approval, the already-approved window for a checkout
        let (start, end) = match (outcome.approved_start_time, outcome.approved_end_time) {
            (Some(start), Some(end)) => (start, end),
            _ => borrow.effective_window(),
        };
        let occupying = self
            .repository
            .borrows
            .count_overlapping_occupying(&mut **tx, borrow.equipment_id, start, end, &[borrow.id])
            .await?;
        if occupying >= equipment.stock_count as i64 {
            return Err(AppError::AvailabilityConflict(format!(
                "Equipment '{}' has no free unit in the requested window",
                equipment.name
            )));
        }
        Ok(())
    }

    /// Apply a bulk action to every member of a borrow group. Approve and
    /// reject are all-or-nothing in one transaction; checkout and
    /// confirm-return are best effort with one transaction per member.
    /// Partial failure is reported in the result, never thrown.
    pub async fn apply_group_action(
        &self,
        group_id: &str,
        action: GroupAction,
        actor: &Actor,
        params: TransitionParams,
    ) -> AppResult<GroupActionResult> {
        if action.is_atomic() {
            self.apply_group_atomic(group_id, action, actor, params).await
        } else {
            self.apply_group_best_effort(group_id, action, actor, params).await
        }
    }

    async fn apply_group_atomic(
        &self,
        group_id: &str,
        action: GroupAction,
        actor: &Actor,
        params: TransitionParams,
    ) -> AppResult<GroupActionResult> {
        let now = Utc::now();
        let event = action.event();
        let mut tx = self.repository.pool.begin().await?;
        let members = self.load_group_for_update(&mut tx, group_id).await?;

        let plan = match group::plan_atomic(&members, event, actor, &params, now, &self.policy) {
            Ok(plan) => plan,
            Err(failures) => {
                // At the request stage the group is a single unit: nothing
                // is mutated when any member fails its guard
                tx.rollback().await?;
                tracing::warn!(
                    group_id,
                    action = action.as_str(),
                    failed = failures.len(),
                    "Group action aborted, no members mutated"
                );
                return Ok(GroupActionResult {
                    borrow_group_id: group_id.to_string(),
                    count: 0,
                    results: failures,
                });
            }
        };

        let mut results = Vec::with_capacity(plan.len());
        for (member, (borrow_id, outcome)) in members.iter().zip(&plan) {
            if event.requires_availability_check() {
                if let Err(e) = self.check_availability_locked(&mut tx, member, outcome).await {
                    tx.rollback().await?;
                    tracing::warn!(
                        group_id,
                        borrow_id = member.id,
                        "Group action aborted on availability, no members mutated"
                    );
                    return Ok(GroupActionResult {
                        borrow_group_id: group_id.to_string(),
                        count: 0,
                        results: vec![GroupItemOutcome {
                            borrow_id: member.id,
                            status: None,
                            error: Some(e.to_string()),
                        }],
                    });
                }
            }
            let updated = self
                .repository
                .borrows
                .apply_outcome(&mut *tx, *borrow_id, outcome, now)
                .await?;
            results.push(GroupItemOutcome {
                borrow_id: *borrow_id,
                status: Some(updated.status),
                error: None,
            });
        }
        tx.commit().await?;

        Ok(GroupActionResult {
            borrow_group_id: group_id.to_string(),
            count: results.len(),
            results,
        })
    }

    async fn apply_group_best_effort(
        &self,
        group_id: &str,
        action: GroupAction,
        actor: &Actor,
        params: TransitionParams,
    ) -> AppResult<GroupActionResult> {
        let members = self.load_group(group_id).await?;
        let event = action.event();

        let mut results = Vec::with_capacity(members.len());
        let mut count = 0;
        for member in &members {
            match self
                .transition(member.id, event, actor, params.clone(), &[])
                .await
            {
                Ok(details) => {
                    count += 1;
                    results.push(GroupItemOutcome {
                        borrow_id: member.id,
                        status: Some(details.borrow.status),
                        error: None,
                    });
                }
                Err(e) => results.push(GroupItemOutcome {
                    borrow_id: member.id,
                    status: None,
                    error: Some(e.to_string()),
                }),
            }
        }

        tracing::info!(
            group_id,
            action = action.as_str(),
            count,
            total = members.len(),
            "Group action applied"
        );
        Ok(GroupActionResult {
            borrow_group_id: group_id.to_string(),
            count,
            results,
        })
    }

    /// Borrows without a group id are addressed as `individual-<id>`
    /// singleton groups, so bulk and single reservations share one path.
    async fn load_group(&self, group_id: &str) -> AppResult<Vec<Borrow>> {
        let members = if let Some(id) = parse_individual_key(group_id)? {
            vec![self.repository.borrows.get_by_id(id).await?]
        } else {
            self.repository.borrows.list_by_group_id(group_id).await?
        };
        if members.is_empty() {
            return Err(AppError::NotFound(format!(
                "Borrow group {} not found",
                group_id
            )));
        }
        Ok(members)
    }

    async fn load_group_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        group_id: &str,
    ) -> AppResult<Vec<Borrow>> {
        let members = if let Some(id) = parse_individual_key(group_id)? {
            vec![self.repository.borrows.get_for_update(tx, id).await?]
        } else {
            self.repository
                .borrows
                .list_by_group_id_for_update(tx, group_id)
                .await?
        };
        if members.is_empty() {
            return Err(AppError::NotFound(format!(
                "Borrow group {} not found",
                group_id
            )));
        }
        Ok(members)
    }

    /// List deficiencies attached to a borrow
    pub async fn list_deficiencies(&self, borrow_id: i32) -> AppResult<Vec<Deficiency>> {
        self.repository.borrows.get_by_id(borrow_id).await?;
        self.repository.deficiencies.list_for_borrow(borrow_id).await
    }

    /// Resolve a deficiency; when it was the last unresolved one and the
    /// borrow is still RETURNED, the borrow finalizes.
    pub async fn resolve_deficiency(&self, id: i32, actor: &Actor) -> AppResult<Deficiency> {
        let now = Utc::now();
        let resolved = self.repository.deficiencies.resolve(id, now).await?;

        let borrow = self.repository.borrows.get_by_id(resolved.borrow_id).await?;
        let unresolved = self
            .repository
            .deficiencies
            .count_unresolved_for_borrow(resolved.borrow_id)
            .await?;
        if borrow.status == BorrowStatus::Returned && unresolved == 0 {
            self.transition(
                borrow.id,
                BorrowEvent::Finalize,
                actor,
                TransitionParams::default(),
                &[],
            )
            .await?;
        }
        Ok(resolved)
    }

    /// Staff fulfillment of a data request on a data-generating item
    pub async fn update_data_request(
        &self,
        borrow_id: i32,
        data: &UpdateDataRequest,
    ) -> AppResult<BorrowDetails> {
        let borrow = self.repository.borrows.get_by_id(borrow_id).await?;
        if !borrow.data_requested {
            return Err(AppError::Validation(format!(
                "Borrow {} did not request data",
                borrow_id
            )));
        }
        let updated = self
            .repository
            .borrows
            .update_data_request(borrow_id, data)
            .await?;
        Ok(self.details(updated))
    }

    /// Persist the overdue derivation for active borrows past their
    /// approved end. Idempotent; safe to call from any read path.
    pub async fn sweep_overdue(&self) -> AppResult<u64> {
        let swept = self.repository.borrows.sweep_overdue(Utc::now()).await?;
        if swept > 0 {
            tracing::info!(swept, "Marked overdue borrows");
        }
        Ok(swept)
    }
}

fn parse_individual_key(group_id: &str) -> AppResult<Option<i32>> {
    match group_id.strip_prefix("individual-") {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("Invalid group id: {}", group_id))),
        None => Ok(None),
    }
}
