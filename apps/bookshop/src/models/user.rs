// apps/bookshop/src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "user_role_enum", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
  Customer,
  Staff,
  Admin,
}

impl UserRole {
  pub fn is_staff(self) -> bool {
    matches!(self, UserRole::Staff | UserRole::Admin)
  }
}

/// Identities are issued by the upstream authentication layer; this is the local profile.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
  #[serde(rename = "userId")]
  pub id: Uuid,
  pub full_name: String,
  pub email: String,
  pub role: UserRole,
  pub created_at: DateTime<Utc>,
}

/// The verified caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
  pub user_id: Uuid,
  pub role: UserRole,
}

impl Actor {
  pub fn is_staff(&self) -> bool {
    self.role.is_staff()
  }

  /// Staff may act on any order; customers only on their own.
  pub fn may_access(&self, owner_id: Uuid) -> bool {
    self.is_staff() || self.user_id == owner_id
  }
}

impl From<&User> for Actor {
  fn from(user: &User) -> Self {
    Actor {
      user_id: user.id,
      role: user.role,
    }
  }
}
