//! User repository: accounts, password hashes and the embedded cart.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use mercato_core::{Email, Role, UserId};

use super::{RepositoryError, map_unique_violation};
use crate::models::{Cart, User};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
    role: Role,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            name: row.name,
            email,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    cart_items: serde_json::Value,
    cart_version: i64,
}

impl TryFrom<CartRow> for (Cart, i64) {
    type Error = RepositoryError;

    fn try_from(row: CartRow) -> Result<Self, Self::Error> {
        let cart: Cart = serde_json::from_value(row.cart_items).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid cart document: {e}"))
        })?;
        Ok((cart, row.cart_version))
    }
}

const USER_COLUMNS: &str = "id, name, email, role, created_at, updated_at";

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user together with their password hash, for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| Ok((User::try_from(r.user)?, r.password_hash)))
            .transpose()
    }

    /// Create a new customer with an already-hashed password.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_with_password(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(name)
        .bind(email.as_str())
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "email"))?;

        User::try_from(row)
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no user has this email.
    pub async fn set_role(&self, email: &Email, role: Role) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET role = $2, updated_at = now() WHERE email = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email.as_str())
        .bind(role)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        User::try_from(row)
    }

    /// Count all accounts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Load a user's cart and its version.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::DataCorruption` if the stored cart is malformed.
    pub async fn load_cart(&self, id: UserId) -> Result<(Cart, i64), RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT cart_items, cart_version FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Replace a user's cart if nobody wrote it since `expected_version`.
    ///
    /// Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` when the stored version moved on.
    pub async fn save_cart(
        &self,
        id: UserId,
        cart: &Cart,
        expected_version: i64,
    ) -> Result<i64, RepositoryError> {
        let document = serde_json::to_value(cart)
            .map_err(|e| RepositoryError::DataCorruption(format!("unencodable cart: {e}")))?;

        let version: Option<i64> = sqlx::query_scalar(
            "UPDATE users \
             SET cart_items = $2, cart_version = cart_version + 1, updated_at = now() \
             WHERE id = $1 AND cart_version = $3 \
             RETURNING cart_version",
        )
        .bind(id)
        .bind(document)
        .bind(expected_version)
        .fetch_optional(self.pool)
        .await?;

        version.ok_or_else(|| {
            tracing::debug!(user_id = %id, expected_version, "cart write lost compare-and-swap");
            RepositoryError::Conflict("cart was modified concurrently".to_owned())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(email: &str) -> UserRow {
        UserRow {
            id: 7,
            name: "Asha".to_string(),
            email: email.to_string(),
            role: Role::Customer,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_conversion() {
        let user = User::try_from(row("asha@example.com")).unwrap();
        assert_eq!(user.id, UserId::new(7));
        assert_eq!(user.email.as_str(), "asha@example.com");
    }

    #[test]
    fn test_row_with_bad_email_is_corruption() {
        let err = User::try_from(row("nonsense")).unwrap_err();
        assert!(matches!(err, RepositoryError::DataCorruption(_)));
    }

    #[test]
    fn test_cart_row_conversion() {
        let row = CartRow {
            cart_items: serde_json::json!([{"productId": 1, "quantity": 3}]),
            cart_version: 4,
        };
        let (cart, version): (Cart, i64) = row.try_into().unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(version, 4);
    }

    #[test]
    fn test_malformed_cart_is_corruption() {
        let row = CartRow {
            cart_items: serde_json::json!({"not": "a list"}),
            cart_version: 0,
        };
        let result: Result<(Cart, i64), _> = row.try_into();
        assert!(matches!(result, Err(RepositoryError::DataCorruption(_))));
    }
}
