/// Errors raised by the billing module
///
/// None of these are retried inside the process. The HTTP layer maps each one
/// to a status code; the webhook path relies on 5xx responses to make the
/// gateway redeliver.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("User not found")]
    NotFound,

    #[error("User already has an active subscription")]
    AlreadySubscribed,

    #[error("User has no billing account")]
    NoBillingAccount,

    #[error("No active subscription found")]
    NoActiveSubscription,

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("No user for gateway customer {0}")]
    UnresolvedCustomer(String),

    #[error("Payment gateway unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Payment gateway rejected the request: {0}")]
    Gateway(String),

    #[error("Failed to persist billing state: {0}")]
    Persistence(String),
}

impl BillingError {
    /// True for failures where the gateway should redeliver the webhook
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BillingError::UnresolvedCustomer(_)
                | BillingError::Persistence(_)
                | BillingError::UpstreamUnavailable(_)
        )
    }
}

impl From<sqlx::Error> for BillingError {
    fn from(e: sqlx::Error) -> Self {
        BillingError::Persistence(e.to_string())
    }
}
