//! Deficiencies repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::borrow::ReportDeficiency,
    models::deficiency::Deficiency,
};

#[derive(Clone)]
pub struct DeficienciesRepository {
    pool: Pool<Postgres>,
}

impl DeficienciesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get deficiency by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Deficiency> {
        sqlx::query_as::<_, Deficiency>("SELECT * FROM deficiencies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Deficiency {} not found", id)))
    }

    /// List deficiencies for a borrow
    pub async fn list_for_borrow(&self, borrow_id: i32) -> AppResult<Vec<Deficiency>> {
        let rows = sqlx::query_as::<_, Deficiency>(
            "SELECT * FROM deficiencies WHERE borrow_id = $1 ORDER BY created_at",
        )
        .bind(borrow_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Create a deficiency inside the confirm-return transaction
    pub async fn create(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        borrow_id: i32,
        report: &ReportDeficiency,
        now: DateTime<Utc>,
    ) -> AppResult<Deficiency> {
        let row = sqlx::query_as::<_, Deficiency>(
            r#"
            INSERT INTO deficiencies (borrow_id, deficiency_type, description, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(borrow_id)
        .bind(report.deficiency_type)
        .bind(&report.description)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row)
    }

    /// Mark a deficiency resolved. Resolving twice is a conflict.
    pub async fn resolve(&self, id: i32, now: DateTime<Utc>) -> AppResult<Deficiency> {
        let existing = self.get_by_id(id).await?;
        if existing.resolved_at.is_some() {
            return Err(AppError::Conflict(format!(
                "Deficiency {} is already resolved",
                id
            )));
        }
        let row = sqlx::query_as::<_, Deficiency>(
            "UPDATE deficiencies SET resolved_at = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Count unresolved deficiencies for a borrow (blocks finalization)
    pub async fn count_unresolved_for_borrow(&self, borrow_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM deficiencies WHERE borrow_id = $1 AND resolved_at IS NULL",
        )
        .bind(borrow_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
