//! Account role management.
//!
//! # Usage
//!
//! ```bash
//! # Promote an account to admin
//! mercato user role -e admin@example.com -r admin
//!
//! # Demote back to customer
//! mercato user role -e admin@example.com -r customer
//! ```

use mercato_core::{Email, Role};
use mercato_storefront::db::{self, RepositoryError, UserRepository};
use thiserror::Error;

use super::{CommandError, database_url};

/// Errors from user commands.
#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: customer, admin")]
    InvalidRole(String),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No account with this email.
    #[error("No user with email: {0}")]
    NotFound(String),

    #[error("Repository error: {0}")]
    Repository(RepositoryError),
}

/// Set the role of the account registered under `email`.
///
/// # Errors
///
/// Returns `UserError` for an invalid email or role, an unknown account, or a
/// database failure.
pub async fn set_role(email: &str, role: &str) -> Result<Role, UserError> {
    let role: Role = role
        .parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))?;
    let email = Email::parse(email).map_err(|_| UserError::InvalidEmail(email.to_owned()))?;

    let database_url = database_url()?;
    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url)
        .await
        .map_err(CommandError::from)?;

    let user = UserRepository::new(&pool)
        .set_role(&email, role)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => UserError::NotFound(email.to_string()),
            other => UserError::Repository(other),
        })?;

    tracing::info!(user_id = %user.id, email = %user.email, role = %user.role, "Role updated");
    Ok(user.role)
}
