//! Equipment model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::enums::{EquipmentCategory, EquipmentStatus};

/// Equipment record from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Equipment {
    pub id: i32,
    pub name: String,
    pub category: EquipmentCategory,
    /// Total units owned
    pub stock_count: i32,
    /// Stored status. Only override statuses (reserved, under_maintenance,
    /// defective, out_of_commission, archived) are authoritative here;
    /// available/borrowed is derived on read from current occupancy.
    pub status: EquipmentStatus,
    pub is_data_generating: bool,
    pub condition: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub purchase_cost: Option<Decimal>,
    /// Loosely-typed JSON array of maintenance entries
    #[schema(value_type = Object)]
    pub maintenance_log: serde_json::Value,
    /// Loosely-typed JSON array of change-diff entries
    #[schema(value_type = Object)]
    pub edit_history: serde_json::Value,
    /// Loosely-typed JSON array of admin notes
    #[schema(value_type = Object)]
    pub notes_log: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Equipment {
    /// Effective status, given the number of borrows occupying the item
    /// right now. Staff-set overrides win; otherwise derived from stock.
    pub fn effective_status(&self, occupying_now: i64) -> EquipmentStatus {
        if self.status.is_override() {
            self.status
        } else if occupying_now >= self.stock_count as i64 {
            EquipmentStatus::Borrowed
        } else {
            EquipmentStatus::Available
        }
    }
}

/// Equipment with its derived status, for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EquipmentDetails {
    #[serde(flatten)]
    pub equipment: Equipment,
    /// Derived status (stored overrides win over computed available/borrowed)
    pub effective_status: EquipmentStatus,
}

/// Create equipment request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateEquipment {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub category: EquipmentCategory,
    #[validate(range(min = 0))]
    pub stock_count: i32,
    #[serde(default)]
    pub is_data_generating: bool,
    pub condition: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub purchase_cost: Option<Decimal>,
}

/// Update equipment request. Changed fields are appended to the item's
/// edit history.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateEquipment {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub category: Option<EquipmentCategory>,
    #[validate(range(min = 0))]
    pub stock_count: Option<i32>,
    pub status: Option<EquipmentStatus>,
    pub is_data_generating: Option<bool>,
    pub condition: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub purchase_cost: Option<Decimal>,
}

/// Append a maintenance log entry
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddMaintenanceEntry {
    #[validate(length(min = 1))]
    pub description: String,
    pub performed_by: Option<String>,
}

/// Append an admin note
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddNote {
    #[validate(length(min = 1))]
    pub note: String,
}
