/// Subscription reconciler
///
/// The reconciler is the only writer of a user's billing projection. It serves
/// the session-creation paths used by authenticated users and applies verified
/// gateway webhooks.
///
/// Cancellation is webhook-confirmed: [`SubscriptionReconciler::cancel_subscription`]
/// asks the gateway to cancel but leaves the local flag alone; the
/// `customer.subscription.deleted` delivery that follows performs the write.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tasklane_shared::billing::{
///     PgBillingStore, ReconcilerSettings, StripeGateway, StripeSettings, SubscriptionReconciler,
/// };
/// # use sqlx::PgPool;
/// # async fn example(pool: PgPool, user_id: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let reconciler = SubscriptionReconciler::new(
///     Arc::new(PgBillingStore::new(pool)),
///     Arc::new(StripeGateway::new(StripeSettings::new("sk_test_..."))?),
///     ReconcilerSettings::for_frontend("http://localhost:3000", "price_123", "whsec_..."),
/// );
///
/// let url = reconciler.create_checkout_session(user_id).await?;
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::error::BillingError;
use super::events::GatewayEvent;
use super::gateway::{CheckoutRequest, GatewaySubscription, PaymentGateway};
use super::projection::transition_for;
use super::store::{AppliedTransition, BillingStore};

/// Static inputs of the reconciler
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub price_id: String,
    pub webhook_secret: String,
    pub success_url: String,
    pub cancel_url: String,
    pub portal_return_url: String,
}

impl ReconcilerSettings {
    /// Return URLs under `{frontend_url}/billing`
    pub fn for_frontend(
        frontend_url: &str,
        price_id: impl Into<String>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        let base = frontend_url.trim_end_matches('/');

        Self {
            price_id: price_id.into(),
            webhook_secret: webhook_secret.into(),
            success_url: format!("{}/billing/success", base),
            cancel_url: format!("{}/billing/cancel", base),
            portal_return_url: format!("{}/billing", base),
        }
    }
}

/// Live subscription status read from the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatus {
    pub has_active_subscription: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriptions: Option<Vec<GatewaySubscription>>,
}

/// What happened to a verified webhook delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Applied {
        event_id: String,
        transition: AppliedTransition,
    },
    Ignored {
        event_id: String,
        event_type: String,
    },
}

/// Idempotency key for the gateway customer of `user_id`
pub fn customer_idempotency_key(user_id: Uuid) -> String {
    format!("customer-create-{}", user_id)
}

pub struct SubscriptionReconciler {
    store: Arc<dyn BillingStore>,
    gateway: Arc<dyn PaymentGateway>,
    settings: ReconcilerSettings,
}

impl SubscriptionReconciler {
    pub fn new(
        store: Arc<dyn BillingStore>,
        gateway: Arc<dyn PaymentGateway>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            settings,
        }
    }

    /// Returns the hosted checkout URL for a user
    ///
    /// Creates and persists a gateway customer first if the user has none.
    /// The checkout call is only made once that write has been confirmed.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown user
    /// - `AlreadySubscribed` if the stored flag says the user is subscribed
    /// - `UpstreamUnavailable` / `Gateway` from the gateway
    #[instrument(skip(self))]
    pub async fn create_checkout_session(&self, user_id: Uuid) -> Result<String, BillingError> {
        let account = self
            .store
            .find_account(user_id)
            .await?
            .ok_or(BillingError::NotFound)?;

        if account.projection.has_active_subscription {
            return Err(BillingError::AlreadySubscribed);
        }

        let customer_id = match account.external_customer_id {
            Some(customer_id) => customer_id,
            None => {
                let created = self
                    .gateway
                    .create_customer(&account.email, &customer_idempotency_key(user_id))
                    .await?;
                let stored = self.store.attach_customer(user_id, &created).await?;

                if stored != created {
                    warn!(created = %created, stored = %stored, "Customer id already attached, keeping stored one");
                }
                info!(customer_id = %stored, "Attached gateway customer");
                stored
            }
        };

        let user_ref = user_id.to_string();
        self.gateway
            .create_checkout_session(CheckoutRequest {
                customer_id: &customer_id,
                price_id: &self.settings.price_id,
                success_url: &self.settings.success_url,
                cancel_url: &self.settings.cancel_url,
                client_reference_id: &user_ref,
            })
            .await
    }

    /// Returns the hosted billing-portal URL for a user
    ///
    /// # Errors
    ///
    /// `NoBillingAccount` if the user never started a checkout
    #[instrument(skip(self))]
    pub async fn create_billing_portal_session(
        &self,
        user_id: Uuid,
    ) -> Result<String, BillingError> {
        let customer_id = self
            .store
            .find_account(user_id)
            .await?
            .ok_or(BillingError::NotFound)?
            .external_customer_id
            .ok_or(BillingError::NoBillingAccount)?;

        self.gateway
            .create_portal_session(&customer_id, &self.settings.portal_return_url)
            .await
    }

    /// Requests cancellation of the user's first active subscription
    ///
    /// Nothing is written locally.
    ///
    /// # Errors
    ///
    /// `NoActiveSubscription` if the user has no customer id or the gateway
    /// lists no active subscription
    #[instrument(skip(self))]
    pub async fn cancel_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<GatewaySubscription, BillingError> {
        let customer_id = self
            .store
            .find_account(user_id)
            .await?
            .ok_or(BillingError::NotFound)?
            .external_customer_id
            .ok_or(BillingError::NoActiveSubscription)?;

        let first = self
            .gateway
            .list_active_subscriptions(&customer_id)
            .await?
            .into_iter()
            .next()
            .ok_or(BillingError::NoActiveSubscription)?;

        let cancelled = self.gateway.cancel_subscription(&first.id).await?;
        info!(subscription_id = %cancelled.id, status = %cancelled.status, "Cancellation requested");

        Ok(cancelled)
    }

    /// Reads subscription status live from the gateway
    ///
    /// May disagree with the stored flag until the next webhook lands.
    #[instrument(skip(self))]
    pub async fn get_subscription_status(
        &self,
        user_id: Uuid,
    ) -> Result<SubscriptionStatus, BillingError> {
        let account = self
            .store
            .find_account(user_id)
            .await?
            .ok_or(BillingError::NotFound)?;

        let Some(customer_id) = account.external_customer_id else {
            return Ok(SubscriptionStatus {
                has_active_subscription: false,
                subscriptions: None,
            });
        };

        let subscriptions = self.gateway.list_subscriptions(&customer_id).await?;

        Ok(SubscriptionStatus {
            has_active_subscription: subscriptions.iter().any(GatewaySubscription::is_live),
            subscriptions: Some(subscriptions),
        })
    }

    /// Verifies, resolves and applies one webhook delivery
    ///
    /// # Errors
    ///
    /// - `InvalidSignature` / `InvalidPayload` before any state is read
    /// - `UnresolvedCustomer` if no user owns the event's customer id
    /// - `Persistence` if the projection write fails
    #[instrument(skip_all)]
    pub async fn handle_event(
        &self,
        raw_body: &[u8],
        signature: &str,
    ) -> Result<EventOutcome, BillingError> {
        let event = self
            .gateway
            .verify_and_parse_event(raw_body, signature, &self.settings.webhook_secret)
            .map_err(|e| {
                warn!(error = %e, "Rejected webhook delivery");
                e
            })?;

        let event = match event {
            GatewayEvent::Subscription(event) => event,
            GatewayEvent::Ignored { id, event_type } => {
                info!(event_id = %id, event_type = %event_type, "Ignoring webhook event");
                return Ok(EventOutcome::Ignored {
                    event_id: id,
                    event_type,
                });
            }
        };

        let transition = transition_for(&event);
        let applied = self
            .store
            .apply_transition(&event.customer_id, &transition)
            .await
            .map_err(|e| {
                error!(
                    event_id = %event.id,
                    event_type = event.kind.as_event_type(),
                    customer_id = %event.customer_id,
                    error = %e,
                    "Failed to apply webhook event"
                );
                e
            })?;

        info!(
            event_id = %event.id,
            event_type = event.kind.as_event_type(),
            user_id = %applied.user_id,
            active = applied.current.has_active_subscription,
            changed = applied.changed(),
            "Applied webhook event"
        );

        Ok(EventOutcome::Applied {
            event_id: event.id,
            transition: applied,
        })
    }
}
