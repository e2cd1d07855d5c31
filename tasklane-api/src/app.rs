/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use tasklane_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config)?;
/// let app = tasklane_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tasklane_shared::auth::context::authenticate_bearer;
use tasklane_shared::billing::{
    BillingError, PaymentGateway, PgBillingStore, StripeGateway, SubscriptionReconciler,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Sole writer of subscription state
    pub billing: Arc<SubscriptionReconciler>,

    pub started_at: Instant,
}

impl AppState {
    /// Creates application state backed by the Stripe gateway
    pub fn new(db: PgPool, config: Config) -> Result<Self, BillingError> {
        let gateway = StripeGateway::new(config.stripe_settings())?;
        Ok(Self::with_gateway(db, config, Arc::new(gateway)))
    }

    /// Creates application state with an explicit payment gateway
    pub fn with_gateway(db: PgPool, config: Config, gateway: Arc<dyn PaymentGateway>) -> Self {
        let billing = SubscriptionReconciler::new(
            Arc::new(PgBillingStore::new(db.clone())),
            gateway,
            config.reconciler_settings(),
        );

        Self {
            db,
            config: Arc::new(config),
            billing: Arc::new(billing),
            started_at: Instant::now(),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health                               (public)
/// └── /v1/
///     ├── /auth/                                (public)
///     │   ├── POST /register
///     │   ├── POST /login
///     │   └── POST /refresh
///     ├── /users/                               (bearer)
///     │   ├── GET    /profile
///     │   └── GET | PUT | DELETE /:id
///     ├── /tasks/                               (bearer)
///     │   ├── POST | GET /
///     │   └── GET | PUT | DELETE /:id
///     └── /billing/
///         ├── POST /create-checkout-session     (bearer)
///         ├── POST /create-portal-session       (bearer)
///         ├── POST /cancel-subscription         (bearer)
///         ├── GET  /subscription-status         (bearer)
///         └── POST /webhook                     (public, signed)
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Authentication (per-route basis)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let auth_layer = || axum::middleware::from_fn_with_state(state.clone(), jwt_auth_layer);

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let user_routes = Router::new()
        .route("/profile", get(routes::users::get_profile))
        .route(
            "/:id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .layer(auth_layer());

    let task_routes = Router::new()
        .route(
            "/",
            post(routes::tasks::create_task).get(routes::tasks::list_tasks),
        )
        .route(
            "/:id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .layer(auth_layer());

    let billing_routes = Router::new()
        .route(
            "/create-checkout-session",
            post(routes::billing::create_checkout_session),
        )
        .route(
            "/create-portal-session",
            post(routes::billing::create_portal_session),
        )
        .route(
            "/cancel-subscription",
            post(routes::billing::cancel_subscription),
        )
        .route(
            "/subscription-status",
            get(routes::billing::subscription_status),
        )
        .layer(auth_layer())
        .route("/webhook", post(routes::billing::webhook));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/tasks", task_routes)
        .nest("/billing", billing_routes);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// CORS from `CORS_ORIGINS`; `*` is permissive and meant for development
fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// JWT authentication middleware layer
///
/// Validates the bearer token and injects an `AuthContext` into request
/// extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let auth_context = authenticate_bearer(header, state.jwt_secret())?;
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
