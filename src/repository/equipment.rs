//! Equipment repository for database operations

use chrono::Utc;
use serde_json::json;
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::enums::EquipmentStatus,
    models::equipment::{CreateEquipment, Equipment, UpdateEquipment},
};

#[derive(Clone)]
pub struct EquipmentRepository {
    pool: Pool<Postgres>,
}

impl EquipmentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List all equipment
    pub async fn list(&self) -> AppResult<Vec<Equipment>> {
        let rows = sqlx::query_as::<_, Equipment>("SELECT * FROM equipment ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Get equipment by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Equipment> {
        sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    /// Get equipment by ID with a row lock, serializing concurrent
    /// availability checks against the same item.
    pub async fn get_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i32,
    ) -> AppResult<Equipment> {
        sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    /// Create equipment
    pub async fn create(&self, data: &CreateEquipment) -> AppResult<Equipment> {
        let row = sqlx::query_as::<_, Equipment>(
            r#"
            INSERT INTO equipment
                (name, category, stock_count, status, is_data_generating,
                 condition, description, purchase_cost)
            VALUES ($1, $2, $3, 'available', $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(data.category)
        .bind(data.stock_count)
        .bind(data.is_data_generating)
        .bind(&data.condition)
        .bind(&data.description)
        .bind(data.purchase_cost)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Update equipment, appending a change-diff entry to its edit history
    pub async fn update(&self, id: i32, data: &UpdateEquipment) -> AppResult<Equipment> {
        let current = self.get_by_id(id).await?;
        let now = Utc::now();

        let mut changes = serde_json::Map::new();

        let name = match &data.name {
            Some(v) if *v != current.name => {
                changes.insert("name".into(), json!({"from": current.name, "to": v}));
                v.clone()
            }
            _ => current.name.clone(),
        };
        let category = match data.category {
            Some(v) if v != current.category => {
                changes.insert(
                    "category".into(),
                    json!({"from": current.category.as_str(), "to": v.as_str()}),
                );
                v
            }
            _ => current.category,
        };
        let stock_count = match data.stock_count {
            Some(v) if v != current.stock_count => {
                changes.insert(
                    "stock_count".into(),
                    json!({"from": current.stock_count, "to": v}),
                );
                v
            }
            _ => current.stock_count,
        };
        let status = match data.status {
            Some(v) if v != current.status => {
                changes.insert(
                    "status".into(),
                    json!({"from": current.status.as_str(), "to": v.as_str()}),
                );
                v
            }
            _ => current.status,
        };
        let is_data_generating = match data.is_data_generating {
            Some(v) if v != current.is_data_generating => {
                changes.insert(
                    "is_data_generating".into(),
                    json!({"from": current.is_data_generating, "to": v}),
                );
                v
            }
            _ => current.is_data_generating,
        };
        let condition = match &data.condition {
            Some(v) if Some(v) != current.condition.as_ref() => {
                changes.insert(
                    "condition".into(),
                    json!({"from": current.condition, "to": v}),
                );
                Some(v.clone())
            }
            _ => current.condition.clone(),
        };
        let description = match &data.description {
            Some(v) if Some(v) != current.description.as_ref() => {
                changes.insert(
                    "description".into(),
                    json!({"from": current.description, "to": v}),
                );
                Some(v.clone())
            }
            _ => current.description.clone(),
        };
        let purchase_cost = match data.purchase_cost {
            Some(v) if Some(v) != current.purchase_cost => {
                changes.insert(
                    "purchase_cost".into(),
                    json!({"from": current.purchase_cost, "to": v}),
                );
                Some(v)
            }
            _ => current.purchase_cost,
        };

        let history_entry = if changes.is_empty() {
            json!([])
        } else {
            json!([{ "timestamp": now.to_rfc3339(), "changes": changes }])
        };

        let row = sqlx::query_as::<_, Equipment>(
            r#"
            UPDATE equipment
            SET name = $2, category = $3, stock_count = $4, status = $5,
                is_data_generating = $6, condition = $7, description = $8,
                purchase_cost = $9, edit_history = edit_history || $10::jsonb,
                updated_at = $11
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&name)
        .bind(category)
        .bind(stock_count)
        .bind(status)
        .bind(is_data_generating)
        .bind(&condition)
        .bind(&description)
        .bind(purchase_cost)
        .bind(&history_entry)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Archive equipment (soft delete)
    pub async fn archive(&self, id: i32) -> AppResult<Equipment> {
        let row = sqlx::query_as::<_, Equipment>(
            "UPDATE equipment SET status = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(EquipmentStatus::Archived)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;
        Ok(row)
    }

    /// Permanently delete equipment. Callers must verify it is archived
    /// and that the deletion was explicitly confirmed.
    pub async fn delete_permanent(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM equipment WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Equipment {} not found", id)));
        }
        Ok(())
    }

    /// Append an entry to the maintenance log
    pub async fn add_maintenance_entry(
        &self,
        id: i32,
        entry: serde_json::Value,
    ) -> AppResult<Equipment> {
        let row = sqlx::query_as::<_, Equipment>(
            r#"
            UPDATE equipment
            SET maintenance_log = maintenance_log || $2::jsonb, updated_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(serde_json::Value::Array(vec![entry]))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;
        Ok(row)
    }

    /// Append an admin note to the notes log
    pub async fn add_note(&self, id: i32, entry: serde_json::Value) -> AppResult<Equipment> {
        let row = sqlx::query_as::<_, Equipment>(
            r#"
            UPDATE equipment
            SET notes_log = notes_log || $2::jsonb, updated_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(serde_json::Value::Array(vec![entry]))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;
        Ok(row)
    }
}
