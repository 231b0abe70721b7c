//! Borrows repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, Pool, Postgres, Row, Transaction};

use crate::{
    error::{AppError, AppResult},
    lifecycle::TransitionOutcome,
    models::borrow::{Borrow, NewBorrow, UpdateDataRequest},
    models::enums::BorrowStatus,
};

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get borrow by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Borrow> {
        sqlx::query_as::<_, Borrow>("SELECT * FROM borrows WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", id)))
    }

    /// Get borrow by ID with a row lock, for read-modify-write transitions
    pub async fn get_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i32,
    ) -> AppResult<Borrow> {
        sqlx::query_as::<_, Borrow>("SELECT * FROM borrows WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", id)))
    }

    /// Get borrows for a user, newest request first
    pub async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<Borrow>> {
        let rows = sqlx::query_as::<_, Borrow>(
            "SELECT * FROM borrows WHERE borrower_id = $1 ORDER BY request_submission_time DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Get all members of a borrow group
    pub async fn list_by_group_id(&self, group_id: &str) -> AppResult<Vec<Borrow>> {
        let rows = sqlx::query_as::<_, Borrow>(
            "SELECT * FROM borrows WHERE borrow_group_id = $1 ORDER BY id",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Get all members of a borrow group, locked for a group transaction
    pub async fn list_by_group_id_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        group_id: &str,
    ) -> AppResult<Vec<Borrow>> {
        let rows = sqlx::query_as::<_, Borrow>(
            "SELECT * FROM borrows WHERE borrow_group_id = $1 ORDER BY id FOR UPDATE",
        )
        .bind(group_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(rows)
    }

    /// Get every borrow for an equipment item (activity log source)
    pub async fn list_for_equipment(&self, equipment_id: i32) -> AppResult<Vec<Borrow>> {
        let rows = sqlx::query_as::<_, Borrow>(
            "SELECT * FROM borrows WHERE equipment_id = $1 ORDER BY request_submission_time",
        )
        .bind(equipment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Get borrows currently occupying an equipment item
    pub async fn list_occupying_for_equipment(&self, equipment_id: i32) -> AppResult<Vec<Borrow>> {
        let rows = sqlx::query_as::<_, Borrow>(
            "SELECT * FROM borrows WHERE equipment_id = $1 AND status = ANY($2)",
        )
        .bind(equipment_id)
        .bind(occupying_slugs())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Count borrows occupying an equipment item whose effective window
    /// (approved if set, else requested) overlaps `[start, end)`. Runs on
    /// the pool for advisory reads or inside a transaction for the
    /// authoritative check at transition time.
    pub async fn count_overlapping_occupying(
        &self,
        executor: impl PgExecutor<'_>,
        equipment_id: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_ids: &[i32],
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM borrows
            WHERE equipment_id = $1
              AND status = ANY($2)
              AND COALESCE(approved_start_time, requested_start_time) < $4
              AND COALESCE(approved_end_time, requested_end_time) > $3
              AND NOT (id = ANY($5))
            "#,
        )
        .bind(equipment_id)
        .bind(occupying_slugs())
        .bind(start)
        .bind(end)
        .bind(exclude_ids)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    /// Occupying borrow counts per equipment item at one instant, for
    /// deriving effective equipment statuses in list views
    pub async fn counts_occupying_now(
        &self,
        now: DateTime<Utc>,
    ) -> AppResult<std::collections::HashMap<i32, i64>> {
        let rows = sqlx::query(
            r#"
            SELECT equipment_id, COUNT(*) as count FROM borrows
            WHERE status = ANY($1)
              AND COALESCE(approved_start_time, requested_start_time) <= $2
              AND COALESCE(approved_end_time, requested_end_time) > $2
            GROUP BY equipment_id
            "#,
        )
        .bind(occupying_slugs())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = std::collections::HashMap::with_capacity(rows.len());
        for row in rows {
            counts.insert(row.get::<i32, _>("equipment_id"), row.get::<i64, _>("count"));
        }
        Ok(counts)
    }

    /// Insert one borrow record in PENDING state
    pub async fn create(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        data: &NewBorrow,
        now: DateTime<Utc>,
    ) -> AppResult<Borrow> {
        let row = sqlx::query_as::<_, Borrow>(
            r#"
            INSERT INTO borrows
                (equipment_id, borrower_id, class_id, borrow_group_id,
                 reservation_type, status, request_submission_time,
                 requested_start_time, requested_end_time, data_requested,
                 requested_equipment_ids, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7, $8, $9, $10, $6)
            RETURNING *
            "#,
        )
        .bind(data.equipment_id)
        .bind(data.borrower_id)
        .bind(data.class_id)
        .bind(&data.borrow_group_id)
        .bind(data.reservation_type)
        .bind(now)
        .bind(data.requested_start_time)
        .bind(data.requested_end_time)
        .bind(data.data_requested)
        .bind(&data.requested_equipment_ids)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row)
    }

    /// Write the field updates produced by a state transition. Columns the
    /// outcome leaves as None are untouched.
    pub async fn apply_outcome(
        &self,
        executor: impl PgExecutor<'_>,
        id: i32,
        outcome: &TransitionOutcome,
        now: DateTime<Utc>,
    ) -> AppResult<Borrow> {
        let row = sqlx::query_as::<_, Borrow>(
            r#"
            UPDATE borrows
            SET status = $2,
                approved_start_time = COALESCE($3, approved_start_time),
                approved_end_time = COALESCE($4, approved_end_time),
                checkout_time = COALESCE($5, checkout_time),
                actual_return_time = COALESCE($6, actual_return_time),
                decided_at = COALESCE($7, decided_at),
                return_condition = COALESCE($8, return_condition),
                return_remarks = COALESCE($9, return_remarks),
                updated_at = $10
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(outcome.status)
        .bind(outcome.approved_start_time)
        .bind(outcome.approved_end_time)
        .bind(outcome.checkout_time)
        .bind(outcome.actual_return_time)
        .bind(outcome.decided_at)
        .bind(&outcome.return_condition)
        .bind(&outcome.return_remarks)
        .bind(now)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", id)))?;
        Ok(row)
    }

    /// Staff fulfillment of a data request
    pub async fn update_data_request(
        &self,
        id: i32,
        data: &UpdateDataRequest,
    ) -> AppResult<Borrow> {
        let row = sqlx::query_as::<_, Borrow>(
            r#"
            UPDATE borrows
            SET data_request_status = $2,
                data_request_remarks = COALESCE($3, data_request_remarks),
                data_files = COALESCE($4, data_files),
                updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.data_request_status)
        .bind(&data.data_request_remarks)
        .bind(&data.data_files)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", id)))?;
        Ok(row)
    }

    /// Borrow counts per status for a user's dashboard
    pub async fn counts_by_status_for_user(
        &self,
        user_id: i32,
    ) -> AppResult<Vec<(BorrowStatus, i64)>> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) as count FROM borrows WHERE borrower_id = $1 GROUP BY status",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            let status: BorrowStatus = row.get("status");
            let count: i64 = row.get("count");
            counts.push((status, count));
        }
        Ok(counts)
    }

    /// Persist the overdue derivation for query efficiency. Idempotent:
    /// re-running when everything is already swept updates nothing.
    pub async fn sweep_overdue(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE borrows
            SET status = 'overdue', updated_at = $1
            WHERE status = 'active' AND approved_end_time < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Returned/completed borrows for an equipment item (contact-hours input)
    pub async fn list_finished_for_equipment(&self, equipment_id: i32) -> AppResult<Vec<Borrow>> {
        let rows = sqlx::query_as::<_, Borrow>(
            r#"
            SELECT * FROM borrows
            WHERE equipment_id = $1 AND status IN ('returned', 'completed')
            ORDER BY checkout_time
            "#,
        )
        .bind(equipment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

fn occupying_slugs() -> Vec<String> {
    BorrowStatus::occupying_slugs()
        .iter()
        .map(|s| s.to_string())
        .collect()
}
