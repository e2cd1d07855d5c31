/// Authentication endpoints
///
/// This module provides user authentication endpoints:
/// - Registration
/// - Login
/// - Token refresh
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Register new user
/// - `POST /v1/auth/login` - Login and get tokens
/// - `POST /v1/auth/refresh` - Refresh access token

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tasklane_shared::{
    auth::{jwt, password},
    models::user::{normalize_email, AuthProvider, CreateUser, User},
};
use uuid::Uuid;
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password (will be validated for strength)
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// Refresh token
    pub refresh_token: String,
}

/// Public view of the authenticated user
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub has_active_subscription: bool,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            has_active_subscription: user.has_active_subscription,
        }
    }
}

/// Register and login response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Access token (24h by default)
    pub access_token: String,

    /// Refresh token (30d)
    pub refresh_token: String,

    pub user: UserSummary,
}

/// Refresh token response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    /// New access token
    pub access_token: String,
}

/// Hashes a password off the async runtime
pub(crate) async fn hash_password_blocking(plain: String) -> ApiResult<String> {
    let hash = tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| ApiError::InternalError(format!("Password task failed: {}", e)))??;

    Ok(hash)
}

async fn verify_password_blocking(plain: String, hash: String) -> ApiResult<bool> {
    let valid = tokio::task::spawn_blocking(move || password::verify_password(&plain, &hash))
        .await
        .map_err(|e| ApiError::InternalError(format!("Password task failed: {}", e)))??;

    Ok(valid)
}

/// Rejects passwords outside the length policy with a 422 on `password`
pub(crate) fn check_password_strength(plain: &str) -> ApiResult<()> {
    password::validate_password_strength(plain).map_err(|message| {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "password".to_string(),
            message,
        }])
    })
}

fn issue_tokens(state: &AppState, user: &User) -> ApiResult<AuthResponse> {
    let access_claims = jwt::Claims::with_expiration(
        user.id,
        user.email.clone(),
        jwt::TokenType::Access,
        state.config.access_token_ttl(),
    );
    let refresh_claims = jwt::Claims::new(user.id, user.email.clone(), jwt::TokenType::Refresh);

    Ok(AuthResponse {
        access_token: jwt::create_token(&access_claims, state.jwt_secret())?,
        refresh_token: jwt::create_token(&refresh_claims, state.jwt_secret())?,
        user: UserSummary::from(user),
    })
}

/// Register a new user
///
/// Creates a local account with an Argon2id password hash and signs the user
/// in.
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/register
/// Content-Type: application/json
///
/// {
///   "email": "user@example.com",
///   "password": "secret1"
/// }
/// ```
///
/// # Response
///
/// `201 Created`
///
/// ```json
/// {
///   "accessToken": "eyJ...",
///   "refreshToken": "eyJ...",
///   "user": { "id": "uuid", "email": "user@example.com", "hasActiveSubscription": false }
/// }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Email already exists
/// - `422 Unprocessable Entity`: Validation failed
/// - `500 Internal Server Error`: Server error
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;
    check_password_strength(&req.password)?;

    let email = normalize_email(&req.email);
    if User::find_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::Conflict("Email already exists".to_string()));
    }

    let password_hash = hash_password_blocking(req.password).await?;

    // A concurrent registration loses on the unique index and maps to 409.
    let user = User::create(
        &state.db,
        CreateUser {
            email,
            password_hash: Some(password_hash),
            provider: AuthProvider::Local,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(issue_tokens(&state, &user)?)))
}

/// Login endpoint
///
/// Authenticates a local user and returns JWT tokens.
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/login
/// Content-Type: application/json
///
/// {
///   "email": "user@example.com",
///   "password": "secret1"
/// }
/// ```
///
/// # Response
///
/// Same body as registration.
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials, or the account signs in through
///   an external provider
/// - `422 Unprocessable Entity`: Validation failed
/// - `500 Internal Server Error`: Server error
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(invalid)?;

    let password_hash = match (user.provider, user.password_hash.clone()) {
        (AuthProvider::Local, Some(hash)) => hash,
        _ => {
            tracing::debug!(user_id = %user.id, provider = user.provider.as_str(), "Password login refused");
            return Err(invalid());
        }
    };

    if !verify_password_blocking(req.password, password_hash).await? {
        return Err(invalid());
    }

    User::update_last_login(&state.db, user.id).await?;

    Ok(Json(issue_tokens(&state, &user)?))
}

/// Token refresh endpoint
///
/// Exchanges a refresh token for a new access token.
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/refresh
/// Content-Type: application/json
///
/// {
///   "refreshToken": "eyJ..."
/// }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "accessToken": "eyJ..."
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid or expired refresh token
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let access_token = jwt::refresh_access_token(
        &req.refresh_token,
        state.jwt_secret(),
        state.config.access_token_ttl(),
    )?;

    Ok(Json(RefreshResponse { access_token }))
}
