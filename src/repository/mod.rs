//! Repository layer for database operations

pub mod borrows;
pub mod deficiencies;
pub mod equipment;
pub mod users;

use sqlx::{Pool, Postgres};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub equipment: equipment::EquipmentRepository,
    pub borrows: borrows::BorrowsRepository,
    pub deficiencies: deficiencies::DeficienciesRepository,
    pub users: users::UsersRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            equipment: equipment::EquipmentRepository::new(pool.clone()),
            borrows: borrows::BorrowsRepository::new(pool.clone()),
            deficiencies: deficiencies::DeficienciesRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            pool,
        }
    }
}
