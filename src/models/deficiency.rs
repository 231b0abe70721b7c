//! Deficiency (damage report) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::models::enums::DeficiencyType;

/// Damage/loss report tied to one borrow, created at return time.
/// Never auto-resolved; staff must resolve explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Deficiency {
    pub id: i32,
    pub borrow_id: i32,
    pub deficiency_type: DeficiencyType,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}
