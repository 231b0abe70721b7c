//! User model and JWT claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::models::enums::Role;

/// User record. Account management lives outside this server; the table
/// exists for referential integrity and role lookup.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    /// Role slugs as stored ("student", "faculty", "staff", "fic")
    pub roles: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// The acting user for a state transition, as resolved from claims
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: i32,
    pub roles: Vec<Role>,
}

impl Actor {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_approver(&self) -> bool {
        self.roles.iter().any(Role::is_approver)
    }
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub roles: Vec<Role>,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            roles: self.roles.clone(),
        }
    }

    // Authorization checks

    /// Require a role allowed to approve, check out, and confirm returns
    pub fn require_approver(&self) -> Result<(), AppError> {
        if self.roles.iter().any(Role::is_approver) {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Faculty or staff privileges required".to_string(),
            ))
        }
    }

    /// Require the staff role (equipment management, data fulfillment)
    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.roles.contains(&Role::Staff) {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Staff privileges required".to_string(),
            ))
        }
    }
}
