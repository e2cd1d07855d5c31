/// User model and database operations
///
/// This module provides the User model, CRUD operations for user accounts, and
/// the narrow set of billing-projection writes used by the subscription
/// reconciler. Profile updates go through [`User::update_profile`], which cannot
/// reach the billing columns.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash VARCHAR(255),
///     provider auth_provider NOT NULL DEFAULT 'local',
///     has_active_subscription BOOLEAN NOT NULL DEFAULT FALSE,
///     external_customer_id VARCHAR(255) UNIQUE,
///     external_subscription_id VARCHAR(255),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use tasklane_shared::models::user::{User, CreateUser, AuthProvider};
/// use tasklane_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "user@example.com".to_string(),
///     password_hash: Some("$argon2id$...".to_string()),
///     provider: AuthProvider::Local,
/// }).await?;
///
/// let found = User::find_by_email(&pool, "USER@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::billing::projection::BillingProjection;

const USER_COLUMNS: &str = "id, email, password_hash, provider, has_active_subscription, \
     external_customer_id, external_subscription_id, created_at, updated_at, last_login_at";

/// How a user authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "auth_provider", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    /// Email and password
    Local,
    /// Third-party identity provider; no local password
    External,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Local => "local",
            AuthProvider::External => "external",
        }
    }
}

/// User account with its billing projection
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Email address, stored lowercase
    pub email: String,

    /// Argon2id password hash
    ///
    /// `None` for users of an external identity provider. Never serialized.
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,

    pub provider: AuthProvider,

    /// Last subscription status reported by the payment gateway
    pub has_active_subscription: bool,

    /// Customer id at the payment gateway, set on first checkout
    pub external_customer_id: Option<String>,

    /// Subscription id at the payment gateway
    pub external_subscription_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Email address (lowercased before insert)
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: Option<String>,

    pub provider: AuthProvider,
}

/// Profile fields a user may change about themselves
///
/// Billing columns are deliberately absent: they belong to the reconciler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

/// Normalizes an email address for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    /// Returns the current billing projection of this user
    pub fn billing_projection(&self) -> BillingProjection {
        BillingProjection {
            has_active_subscription: self.has_active_subscription,
            external_subscription_id: self.external_subscription_id.clone(),
        }
    }

    /// Creates a new user in the database
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Email already exists (unique constraint violation)
    /// - A local user is created without a password hash
    /// - Database connection fails
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (email, password_hash, provider) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(normalize_email(&data.email))
            .bind(data.password_hash)
            .bind(data.provider)
            .fetch_one(pool)
            .await?;

        Ok(user)
    }

    /// Finds a user by ID
    ///
    /// # Returns
    ///
    /// The user if found, None otherwise
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email address (case-insensitive)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&query)
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await
    }

    /// Finds the user owning a payment-gateway customer id
    pub async fn find_by_external_customer_id(
        pool: &PgPool,
        customer_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM users WHERE external_customer_id = $1",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(customer_id)
            .fetch_optional(pool)
            .await
    }

    /// Updates email and/or password of a user
    ///
    /// Only non-None fields in `data` are written. The `updated_at` timestamp is
    /// always refreshed.
    ///
    /// # Returns
    ///
    /// The updated user if found, None if the user doesn't exist
    ///
    /// # Errors
    ///
    /// Returns an error if the new email already belongs to another user or the
    /// database connection fails
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.email.is_some() {
            bind_count += 1;
            query.push_str(&format!(", email = ${}", bind_count));
        }
        if data.password_hash.is_some() {
            bind_count += 1;
            query.push_str(&format!(", password_hash = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {}", USER_COLUMNS));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(email) = data.email {
            q = q.bind(normalize_email(&email));
        }
        if let Some(password_hash) = data.password_hash {
            q = q.bind(password_hash);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes a user by ID
    ///
    /// Tasks owned by the user are removed by the `ON DELETE CASCADE` foreign key.
    ///
    /// # Returns
    ///
    /// True if the user was deleted, false if the user didn't exist
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records a successful login
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Lists users, newest first
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Counts all users
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count.0)
    }

    /// Attaches a payment-gateway customer id to a user
    ///
    /// The write only happens while the column is still NULL, so a customer id
    /// is never overwritten once set.
    ///
    /// # Returns
    ///
    /// The customer id stored on the row afterwards (the given one, or the one
    /// that was already there), or None if the user doesn't exist
    pub async fn set_external_customer_id(
        pool: &PgPool,
        id: Uuid,
        customer_id: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let stored: Option<(Option<String>,)> = sqlx::query_as(
            r#"
            UPDATE users
            SET external_customer_id = COALESCE(external_customer_id, $2),
                updated_at = NOW()
            WHERE id = $1
            RETURNING external_customer_id
            "#,
        )
        .bind(id)
        .bind(customer_id)
        .fetch_optional(pool)
        .await?;

        Ok(stored.and_then(|(customer,)| customer))
    }

    /// Locks the user owning `customer_id` for a billing read-modify-write
    ///
    /// Issues `SELECT ... FOR UPDATE` inside the caller's transaction. The row
    /// stays locked until that transaction commits or rolls back, which
    /// serializes concurrent webhook deliveries for the same user.
    pub async fn lock_for_billing(
        tx: &mut Transaction<'_, Postgres>,
        customer_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM users WHERE external_customer_id = $1 FOR UPDATE",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(customer_id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Writes the billing projection of a user inside the caller's transaction
    pub async fn write_billing_projection(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        projection: &BillingProjection,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET has_active_subscription = $2,
                external_subscription_id = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(projection.has_active_subscription)
        .bind(projection.external_subscription_id.as_deref())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            password_hash: Some("$argon2id$secret".to_string()),
            provider: AuthProvider::Local,
            has_active_subscription: true,
            external_customer_id: Some("cus_123".to_string()),
            external_subscription_id: Some("sub_123".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login_at: None,
        }
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  User@Example.COM "), "user@example.com");
    }

    #[test]
    fn test_password_hash_is_never_serialized() {
        let json = serde_json::to_value(sample_user()).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["hasActiveSubscription"], true);
        assert_eq!(json["provider"], "local");
    }

    #[test]
    fn test_billing_projection_mirrors_columns() {
        let user = sample_user();
        let projection = user.billing_projection();
        assert!(projection.has_active_subscription);
        assert_eq!(projection.external_subscription_id.as_deref(), Some("sub_123"));
    }

    #[test]
    fn test_auth_provider_as_str() {
        assert_eq!(AuthProvider::Local.as_str(), "local");
        assert_eq!(AuthProvider::External.as_str(), "external");
    }
}
