/// Subscription billing
///
/// # Modules
///
/// - [`gateway`]: the payment-gateway port
/// - [`stripe`]: Stripe implementation of the port
/// - [`signature`]: webhook signature verification
/// - [`events`]: webhook event parsing
/// - [`projection`]: the pure event-to-projection transition
/// - [`store`]: persistence port and its PostgreSQL implementation
/// - [`reconciler`]: the service tying them together

pub mod error;
pub mod events;
pub mod gateway;
pub mod projection;
pub mod reconciler;
pub mod signature;
pub mod store;
pub mod stripe;

pub use error::BillingError;
pub use gateway::{GatewaySubscription, PaymentGateway};
pub use reconciler::{EventOutcome, ReconcilerSettings, SubscriptionReconciler, SubscriptionStatus};
pub use store::{BillingStore, PgBillingStore};
pub use stripe::{StripeGateway, StripeSettings};
