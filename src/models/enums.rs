//! Shared domain enums

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, Postgres};
use utoipa::ToSchema;

macro_rules! slug_enum_sqlx {
    ($name:ident) => {
        impl sqlx::Type<Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<Postgres>>::type_info()
            }
        }

        impl<'r> Decode<'r, Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s: String = Decode::<Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl Encode<'_, Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> sqlx::encode::IsNull {
                let s: String = self.as_str().to_string();
                <String as Encode<Postgres>>::encode(s, buf)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

// ---------------------------------------------------------------------------
// BorrowStatus
// ---------------------------------------------------------------------------

/// Borrow lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BorrowStatus {
    Pending,
    Approved,
    Active,
    Overdue,
    PendingReturn,
    Returned,
    Completed,
    RejectedFic,
    RejectedStaff,
    Cancelled,
}

impl BorrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowStatus::Pending => "pending",
            BorrowStatus::Approved => "approved",
            BorrowStatus::Active => "active",
            BorrowStatus::Overdue => "overdue",
            BorrowStatus::PendingReturn => "pending_return",
            BorrowStatus::Returned => "returned",
            BorrowStatus::Completed => "completed",
            BorrowStatus::RejectedFic => "rejected_fic",
            BorrowStatus::RejectedStaff => "rejected_staff",
            BorrowStatus::Cancelled => "cancelled",
        }
    }

    /// States from which no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BorrowStatus::Completed
                | BorrowStatus::RejectedFic
                | BorrowStatus::RejectedStaff
                | BorrowStatus::Cancelled
        )
    }

    /// States that count against equipment stock
    pub fn is_occupying(&self) -> bool {
        matches!(
            self,
            BorrowStatus::Pending
                | BorrowStatus::Approved
                | BorrowStatus::Active
                | BorrowStatus::Overdue
                | BorrowStatus::PendingReturn
        )
    }

    /// All occupying states, for SQL IN clauses
    pub fn occupying_slugs() -> [&'static str; 5] {
        ["pending", "approved", "active", "overdue", "pending_return"]
    }
}

impl std::str::FromStr for BorrowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BorrowStatus::Pending),
            "approved" => Ok(BorrowStatus::Approved),
            "active" => Ok(BorrowStatus::Active),
            "overdue" => Ok(BorrowStatus::Overdue),
            "pending_return" => Ok(BorrowStatus::PendingReturn),
            "returned" => Ok(BorrowStatus::Returned),
            "completed" => Ok(BorrowStatus::Completed),
            "rejected_fic" => Ok(BorrowStatus::RejectedFic),
            "rejected_staff" => Ok(BorrowStatus::RejectedStaff),
            "cancelled" => Ok(BorrowStatus::Cancelled),
            _ => Err(format!("Invalid borrow status: {}", s)),
        }
    }
}

slug_enum_sqlx!(BorrowStatus);

// ---------------------------------------------------------------------------
// EquipmentCategory
// ---------------------------------------------------------------------------

/// Equipment category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentCategory {
    Instruments,
    Accessories,
    Tools,
    Consumables,
    Other,
}

impl EquipmentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentCategory::Instruments => "instruments",
            EquipmentCategory::Accessories => "accessories",
            EquipmentCategory::Tools => "tools",
            EquipmentCategory::Consumables => "consumables",
            EquipmentCategory::Other => "other",
        }
    }
}

impl std::str::FromStr for EquipmentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instruments" => Ok(EquipmentCategory::Instruments),
            "accessories" => Ok(EquipmentCategory::Accessories),
            "tools" => Ok(EquipmentCategory::Tools),
            "consumables" => Ok(EquipmentCategory::Consumables),
            "other" => Ok(EquipmentCategory::Other),
            _ => Err(format!("Invalid equipment category: {}", s)),
        }
    }
}

slug_enum_sqlx!(EquipmentCategory);

// ---------------------------------------------------------------------------
// EquipmentStatus
// ---------------------------------------------------------------------------

/// Equipment status. Only override statuses are persisted; `available` and
/// `borrowed` are derived from current occupancy on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    Available,
    Borrowed,
    Reserved,
    UnderMaintenance,
    Defective,
    OutOfCommission,
    Archived,
}

impl EquipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentStatus::Available => "available",
            EquipmentStatus::Borrowed => "borrowed",
            EquipmentStatus::Reserved => "reserved",
            EquipmentStatus::UnderMaintenance => "under_maintenance",
            EquipmentStatus::Defective => "defective",
            EquipmentStatus::OutOfCommission => "out_of_commission",
            EquipmentStatus::Archived => "archived",
        }
    }

    /// Statuses under which the item can never be reserved or checked out
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            EquipmentStatus::UnderMaintenance
                | EquipmentStatus::Defective
                | EquipmentStatus::OutOfCommission
                | EquipmentStatus::Archived
        )
    }

    /// Statuses that take precedence over the computed available/borrowed
    pub fn is_override(&self) -> bool {
        self.is_unavailable() || matches!(self, EquipmentStatus::Reserved)
    }
}

impl std::str::FromStr for EquipmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(EquipmentStatus::Available),
            "borrowed" => Ok(EquipmentStatus::Borrowed),
            "reserved" => Ok(EquipmentStatus::Reserved),
            "under_maintenance" => Ok(EquipmentStatus::UnderMaintenance),
            "defective" => Ok(EquipmentStatus::Defective),
            "out_of_commission" => Ok(EquipmentStatus::OutOfCommission),
            "archived" => Ok(EquipmentStatus::Archived),
            _ => Err(format!("Invalid equipment status: {}", s)),
        }
    }
}

slug_enum_sqlx!(EquipmentStatus);

// ---------------------------------------------------------------------------
// ReservationType
// ---------------------------------------------------------------------------

/// Whether a reservation is tied to coursework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReservationType {
    InClass,
    OutOfClass,
}

impl ReservationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationType::InClass => "in_class",
            ReservationType::OutOfClass => "out_of_class",
        }
    }
}

impl std::str::FromStr for ReservationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_class" => Ok(ReservationType::InClass),
            "out_of_class" => Ok(ReservationType::OutOfClass),
            _ => Err(format!("Invalid reservation type: {}", s)),
        }
    }
}

slug_enum_sqlx!(ReservationType);

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// User roles. FIC (faculty-in-charge) is a staff-equivalent approver for
/// class-linked reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Faculty,
    Staff,
    Fic,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Staff => "staff",
            Role::Fic => "fic",
        }
    }

    /// Roles allowed to approve, check out, and confirm returns
    pub fn is_approver(&self) -> bool {
        matches!(self, Role::Faculty | Role::Staff | Role::Fic)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "faculty" => Ok(Role::Faculty),
            "staff" => Ok(Role::Staff),
            "fic" => Ok(Role::Fic),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

slug_enum_sqlx!(Role);

// ---------------------------------------------------------------------------
// DataRequestStatus
// ---------------------------------------------------------------------------

/// Fulfillment status of a data request on a data-generating item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DataRequestStatus {
    Pending,
    Fulfilled,
    Rejected,
}

impl DataRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataRequestStatus::Pending => "pending",
            DataRequestStatus::Fulfilled => "fulfilled",
            DataRequestStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for DataRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DataRequestStatus::Pending),
            "fulfilled" => Ok(DataRequestStatus::Fulfilled),
            "rejected" => Ok(DataRequestStatus::Rejected),
            _ => Err(format!("Invalid data request status: {}", s)),
        }
    }
}

slug_enum_sqlx!(DataRequestStatus);

// ---------------------------------------------------------------------------
// DeficiencyType
// ---------------------------------------------------------------------------

/// Kind of damage report filed at return time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeficiencyType {
    Damage,
    Loss,
    Malfunction,
    Other,
}

impl DeficiencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeficiencyType::Damage => "damage",
            DeficiencyType::Loss => "loss",
            DeficiencyType::Malfunction => "malfunction",
            DeficiencyType::Other => "other",
        }
    }
}

impl std::str::FromStr for DeficiencyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "damage" => Ok(DeficiencyType::Damage),
            "loss" => Ok(DeficiencyType::Loss),
            "malfunction" => Ok(DeficiencyType::Malfunction),
            "other" => Ok(DeficiencyType::Other),
            _ => Err(format!("Invalid deficiency type: {}", s)),
        }
    }
}

slug_enum_sqlx!(DeficiencyType);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occupying_states() {
        assert!(BorrowStatus::Pending.is_occupying());
        assert!(BorrowStatus::Overdue.is_occupying());
        assert!(!BorrowStatus::Returned.is_occupying());
        assert!(!BorrowStatus::Cancelled.is_occupying());
    }

    #[test]
    fn test_terminal_states() {
        assert!(BorrowStatus::Completed.is_terminal());
        assert!(BorrowStatus::RejectedFic.is_terminal());
        assert!(!BorrowStatus::Returned.is_terminal());
    }

    #[test]
    fn test_equipment_status_overrides() {
        assert!(EquipmentStatus::Archived.is_unavailable());
        assert!(EquipmentStatus::Reserved.is_override());
        assert!(!EquipmentStatus::Reserved.is_unavailable());
        assert!(!EquipmentStatus::Available.is_override());
    }
}
