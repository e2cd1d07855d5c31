/// Billing endpoints
///
/// Thin HTTP layer over [`SubscriptionReconciler`]. Session endpoints return a
/// single redirect URL for the web client.
///
/// # Endpoints
///
/// - `POST /v1/billing/create-checkout-session` - Hosted checkout URL
/// - `POST /v1/billing/create-portal-session` - Hosted billing portal URL
/// - `POST /v1/billing/cancel-subscription` - Request cancellation
/// - `GET /v1/billing/subscription-status` - Live status from the gateway
/// - `POST /v1/billing/webhook` - Gateway event delivery (public, signed)
///
/// [`SubscriptionReconciler`]: tasklane_shared::billing::SubscriptionReconciler

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::HeaderMap, Extension, Json};
use bytes::Bytes;
use serde::Serialize;
use tasklane_shared::{
    auth::context::AuthContext,
    billing::{EventOutcome, GatewaySubscription, SubscriptionStatus},
};

/// Header carrying the webhook signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize)]
pub struct RedirectResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Create a checkout session
///
/// # Response
///
/// ```json
/// { "url": "https://checkout.stripe.com/c/pay/cs_..." }
/// ```
///
/// # Errors
///
/// - `404 Not Found`: User no longer exists
/// - `409 Conflict`: Already subscribed
/// - `502 Bad Gateway` / `503 Service Unavailable`: Gateway failure
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<RedirectResponse>> {
    let url = state.billing.create_checkout_session(auth.user_id).await?;
    Ok(Json(RedirectResponse { url }))
}

/// Create a billing portal session
///
/// # Errors
///
/// - `400 Bad Request`: User has no billing account yet
pub async fn create_portal_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<RedirectResponse>> {
    let url = state
        .billing
        .create_billing_portal_session(auth.user_id)
        .await?;
    Ok(Json(RedirectResponse { url }))
}

/// Request cancellation of the caller's subscription
///
/// The stored flag changes only when the gateway confirms through the webhook.
///
/// # Errors
///
/// - `400 Bad Request`: No active subscription
pub async fn cancel_subscription(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<GatewaySubscription>> {
    Ok(Json(state.billing.cancel_subscription(auth.user_id).await?))
}

/// Live subscription status
///
/// # Response
///
/// ```json
/// { "hasActiveSubscription": true, "subscriptions": [ ... ] }
/// ```
pub async fn subscription_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<SubscriptionStatus>> {
    Ok(Json(
        state.billing.get_subscription_status(auth.user_id).await?,
    ))
}

/// Gateway webhook
///
/// Takes the raw body; the signature is computed over the exact bytes.
///
/// # Errors
///
/// - `400 Bad Request`: Missing or invalid signature, malformed event
/// - `500 Internal Server Error`: Unknown customer or storage failure, so the
///   gateway redelivers
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    match state.billing.handle_event(&body, signature).await? {
        EventOutcome::Applied {
            event_id,
            transition,
        } => {
            tracing::info!(
                event_id = %event_id,
                user_id = %transition.user_id,
                changed = transition.changed(),
                "Webhook applied"
            );
        }
        EventOutcome::Ignored { event_id, .. } => {
            tracing::debug!(event_id = %event_id, "Webhook acknowledged without changes");
        }
    }

    Ok(Json(WebhookAck { received: true }))
}
