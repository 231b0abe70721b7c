//! Equipment management service

use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::equipment::{
        AddMaintenanceEntry, AddNote, CreateEquipment, Equipment, EquipmentDetails,
        UpdateEquipment,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct EquipmentService {
    repository: Repository,
}

impl EquipmentService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// List all equipment with derived statuses
    pub async fn list(&self) -> AppResult<Vec<EquipmentDetails>> {
        let now = Utc::now();
        let items = self.repository.equipment.list().await?;
        let occupancy = self.repository.borrows.counts_occupying_now(now).await?;
        Ok(items
            .into_iter()
            .map(|equipment| {
                let occupying = occupancy.get(&equipment.id).copied().unwrap_or(0);
                let effective_status = equipment.effective_status(occupying);
                EquipmentDetails {
                    equipment,
                    effective_status,
                }
            })
            .collect())
    }

    /// Get one equipment item with its derived status
    pub async fn get_details(&self, id: i32) -> AppResult<EquipmentDetails> {
        let now = Utc::now();
        let equipment = self.repository.equipment.get_by_id(id).await?;
        let occupying = self
            .repository
            .borrows
            .count_overlapping_occupying(&self.repository.pool, id, now, now, &[])
            .await?;
        let effective_status = equipment.effective_status(occupying);
        Ok(EquipmentDetails {
            equipment,
            effective_status,
        })
    }

    /// Create equipment
    pub async fn create(&self, data: &CreateEquipment) -> AppResult<Equipment> {
        data.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        self.repository.equipment.create(data).await
    }

    /// Update equipment, recording the diff in its edit history
    pub async fn update(&self, id: i32, data: &UpdateEquipment) -> AppResult<Equipment> {
        data.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        self.repository.equipment.update(id, data).await
    }

    /// Archive equipment, or permanently delete an already-archived item
    /// when the caller explicitly confirms.
    pub async fn delete(&self, id: i32, permanent: bool) -> AppResult<Option<Equipment>> {
        if !permanent {
            return Ok(Some(self.repository.equipment.archive(id).await?));
        }
        let current = self.repository.equipment.get_by_id(id).await?;
        if current.status != crate::models::enums::EquipmentStatus::Archived {
            return Err(AppError::Conflict(
                "Only archived equipment can be permanently deleted".to_string(),
            ));
        }
        self.repository.equipment.delete_permanent(id).await?;
        Ok(None)
    }

    /// Append a maintenance log entry
    pub async fn add_maintenance_entry(
        &self,
        id: i32,
        data: &AddMaintenanceEntry,
    ) -> AppResult<Equipment> {
        data.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "description": data.description,
            "performed_by": data.performed_by,
        });
        self.repository.equipment.add_maintenance_entry(id, entry).await
    }

    /// Append an admin note
    pub async fn add_note(&self, id: i32, author_id: i32, data: &AddNote) -> AppResult<Equipment> {
        data.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "note": data.note,
            "author_id": author_id,
        });
        self.repository.equipment.add_note(id, entry).await
    }
}
