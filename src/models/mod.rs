//! Data models for Stockroom

pub mod activity;
pub mod borrow;
pub mod deficiency;
pub mod enums;
pub mod equipment;
pub mod user;

// Re-export commonly used types
pub use borrow::{Borrow, BorrowDetails};
pub use deficiency::Deficiency;
pub use enums::{BorrowStatus, EquipmentCategory, EquipmentStatus, ReservationType, Role};
pub use equipment::Equipment;
pub use user::{Actor, User, UserClaims};
