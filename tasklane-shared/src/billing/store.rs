/// Persistence port for the reconciler
///
/// [`BillingStore`] is the only way the reconciler reads or writes billing
/// state. [`PgBillingStore`] implements it on top of the `users` table.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::error::BillingError;
use super::projection::{BillingProjection, Transition};
use crate::models::user::User;

/// Billing-relevant view of a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingAccount {
    pub user_id: Uuid,
    pub email: String,
    pub external_customer_id: Option<String>,
    pub projection: BillingProjection,
}

impl From<User> for BillingAccount {
    fn from(user: User) -> Self {
        let projection = user.billing_projection();
        Self {
            user_id: user.id,
            email: user.email,
            external_customer_id: user.external_customer_id,
            projection,
        }
    }
}

/// Outcome of applying a transition under the row lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedTransition {
    pub user_id: Uuid,
    pub previous: BillingProjection,
    pub current: BillingProjection,
}

impl AppliedTransition {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn find_account(&self, user_id: Uuid) -> Result<Option<BillingAccount>, BillingError>;

    /// Stores the gateway customer id unless one is already set
    ///
    /// Returns the customer id held by the row after the write. Only returns
    /// once the write is durable.
    async fn attach_customer(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> Result<String, BillingError>;

    /// Resolves `customer_id` to a user and applies `transition` atomically
    ///
    /// Concurrent calls for the same user are serialized.
    ///
    /// # Errors
    ///
    /// `UnresolvedCustomer` if no user owns the customer id
    async fn apply_transition(
        &self,
        customer_id: &str,
        transition: &Transition,
    ) -> Result<AppliedTransition, BillingError>;
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgBillingStore {
    pool: PgPool,
}

impl PgBillingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BillingStore for PgBillingStore {
    async fn find_account(&self, user_id: Uuid) -> Result<Option<BillingAccount>, BillingError> {
        Ok(User::find_by_id(&self.pool, user_id)
            .await?
            .map(BillingAccount::from))
    }

    async fn attach_customer(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> Result<String, BillingError> {
        User::set_external_customer_id(&self.pool, user_id, customer_id)
            .await?
            .ok_or(BillingError::NotFound)
    }

    async fn apply_transition(
        &self,
        customer_id: &str,
        transition: &Transition,
    ) -> Result<AppliedTransition, BillingError> {
        let mut tx = self.pool.begin().await?;

        let user = User::lock_for_billing(&mut tx, customer_id)
            .await?
            .ok_or_else(|| BillingError::UnresolvedCustomer(customer_id.to_string()))?;

        let previous = user.billing_projection();
        let current = transition.apply(&previous);

        if current != previous {
            User::write_billing_projection(&mut tx, user.id, &current).await?;
        } else {
            debug!(user_id = %user.id, "Billing projection already up to date");
        }

        tx.commit().await?;

        Ok(AppliedTransition {
            user_id: user.id,
            previous,
            current,
        })
    }
}
