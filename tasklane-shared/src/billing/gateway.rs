/// Payment gateway port
///
/// The reconciler only talks to the gateway through [`PaymentGateway`], held
/// as an `Arc<dyn PaymentGateway>`. Production wires in
/// [`super::stripe::StripeGateway`]; tests use in-memory fakes.
///
/// Implementations do not retry. A network failure or timeout surfaces as
/// [`BillingError::UpstreamUnavailable`].

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::error::BillingError;
use super::events::GatewayEvent;
use super::signature::construct_event;

/// Gateway statuses that count as a live subscription in status reads
pub const LIVE_STATUSES: [&str; 2] = ["active", "trialing"];

/// Subscription summary as reported by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

impl GatewaySubscription {
    /// True for `active` and `trialing`
    pub fn is_live(&self) -> bool {
        LIVE_STATUSES.contains(&self.status.as_str())
    }
}

/// Inputs for a hosted checkout page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest<'a> {
    pub customer_id: &'a str,
    pub price_id: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
    /// Internal user id, echoed back by the gateway
    pub client_reference_id: &'a str,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a customer and returns its id
    ///
    /// `idempotency_key` must be stable per user so a retried call after a
    /// lost response returns the same customer instead of a duplicate.
    async fn create_customer(&self, email: &str, idempotency_key: &str)
        -> Result<String, BillingError>;

    /// Creates a subscription checkout session and returns its redirect URL
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest<'_>,
    ) -> Result<String, BillingError>;

    /// Creates a billing-portal session and returns its redirect URL
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, BillingError>;

    /// Lists the customer's subscriptions with status `active`, in gateway order
    async fn list_active_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<GatewaySubscription>, BillingError>;

    /// Lists every subscription of the customer, in gateway order
    async fn list_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<GatewaySubscription>, BillingError>;

    /// Requests cancellation of a subscription
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<GatewaySubscription, BillingError>;

    /// Verifies a webhook delivery and parses it
    ///
    /// The default implementation checks the Stripe-compatible signature
    /// scheme against the current time.
    fn verify_and_parse_event(
        &self,
        raw_body: &[u8],
        signature: &str,
        secret: &str,
    ) -> Result<GatewayEvent, BillingError> {
        construct_event(raw_body, signature, secret, Utc::now().timestamp())
    }
}
