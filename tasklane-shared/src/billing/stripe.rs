/// Stripe implementation of [`PaymentGateway`]
///
/// Talks to the Stripe REST API with form-encoded requests. The HTTP client has
/// finite connect and request timeouts; a timeout, connection failure or 5xx
/// answer is reported as `UpstreamUnavailable`, a 4xx answer as `Gateway`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, warn};

use super::error::BillingError;
use super::gateway::{CheckoutRequest, GatewaySubscription, PaymentGateway};

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com/v1";

/// API version the wire types and webhook parser are written against
pub const DEFAULT_API_VERSION: &str = "2022-08-01";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for [`StripeGateway`]
#[derive(Debug, Clone)]
pub struct StripeSettings {
    pub secret_key: String,
    pub api_base: String,

    /// Sent as `Stripe-Version` on every request
    pub api_version: String,

    pub timeout: Duration,
}

impl StripeSettings {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    secret_key: String,
    api_base: String,
    api_version: String,
}

impl StripeGateway {
    pub fn new(settings: StripeSettings) -> Result<Self, BillingError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| BillingError::Gateway(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            secret_key: settings.secret_key,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_version: settings.api_version,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", &self.api_version)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BillingError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, "Failed to parse Stripe response");
            BillingError::Gateway(format!("Unexpected Stripe response: {}", e))
        })
    }
}

fn transport_error(e: reqwest::Error) -> BillingError {
    warn!(error = %e, timeout = e.is_timeout(), connect = e.is_connect(), "Stripe request failed");
    BillingError::UpstreamUnavailable(e.to_string())
}

fn api_error(status: StatusCode, body: &str) -> BillingError {
    let message = serde_json::from_str::<StripeErrorResponse>(body)
        .ok()
        .map(|e| e.error.message.unwrap_or(e.error.error_type))
        .unwrap_or_else(|| status.to_string());

    error!(status = %status, message = %message, "Stripe API error");

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        BillingError::UpstreamUnavailable(message)
    } else {
        BillingError::Gateway(message)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_customer(
        &self,
        email: &str,
        idempotency_key: &str,
    ) -> Result<String, BillingError> {
        debug!(idempotency_key, "Creating Stripe customer");

        let customer: StripeCustomer = self
            .send(
                self.client
                    .post(self.url("customers"))
                    .header("Idempotency-Key", idempotency_key)
                    .form(&[("email", email)]),
            )
            .await?;

        Ok(customer.id)
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutRequest<'_>,
    ) -> Result<String, BillingError> {
        let params = [
            ("customer", request.customer_id),
            ("mode", "subscription"),
            ("line_items[0][price]", request.price_id),
            ("line_items[0][quantity]", "1"),
            ("success_url", request.success_url),
            ("cancel_url", request.cancel_url),
            ("client_reference_id", request.client_reference_id),
        ];

        let session: StripeCheckoutSession = self
            .send(self.client.post(self.url("checkout/sessions")).form(&params))
            .await?;

        session
            .url
            .ok_or_else(|| BillingError::Gateway("Checkout session has no URL".into()))
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, BillingError> {
        let session: StripePortalSession = self
            .send(
                self.client
                    .post(self.url("billing_portal/sessions"))
                    .form(&[("customer", customer_id), ("return_url", return_url)]),
            )
            .await?;

        Ok(session.url)
    }

    async fn list_active_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<GatewaySubscription>, BillingError> {
        let list: StripeList<StripeSubscription> = self
            .send(
                self.client
                    .get(self.url("subscriptions"))
                    .query(&[("customer", customer_id), ("status", "active")]),
            )
            .await?;

        Ok(list.data.into_iter().map(Into::into).collect())
    }

    async fn list_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<GatewaySubscription>, BillingError> {
        let list: StripeList<StripeSubscription> = self
            .send(
                self.client
                    .get(self.url("subscriptions"))
                    .query(&[("customer", customer_id), ("status", "all")]),
            )
            .await?;

        Ok(list.data.into_iter().map(Into::into).collect())
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<GatewaySubscription, BillingError> {
        let subscription: StripeSubscription = self
            .send(self.client.delete(self.url(&format!("subscriptions/{}", subscription_id))))
            .await?;

        Ok(subscription.into())
    }
}

// Wire types

#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeCheckoutSession {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripePortalSession {
    url: String,
}

#[derive(Debug, Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StripeSubscription {
    id: String,
    customer: String,
    status: String,
    #[serde(default)]
    cancel_at_period_end: bool,
    current_period_end: Option<i64>,
}

impl From<StripeSubscription> for GatewaySubscription {
    fn from(s: StripeSubscription) -> Self {
        Self {
            id: s.id,
            customer: s.customer,
            status: s.status,
            cancel_at_period_end: s.cancel_at_period_end,
            current_period_end: s.current_period_end,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    message: Option<String>,
}
