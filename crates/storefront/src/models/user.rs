//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use mercato_core::{Email, Role, UserId};

/// A storefront account.
///
/// The password hash never leaves the repository layer, so it is not part of
/// this type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
