/// User profile endpoints
///
/// Every endpoint is scoped to the authenticated user; addressing another
/// user's id is forbidden rather than hidden.
///
/// # Endpoints
///
/// - `GET /v1/users/profile` - Caller's profile
/// - `GET /v1/users/:id` - Get own user
/// - `PUT /v1/users/:id` - Change own email or password
/// - `DELETE /v1/users/:id` - Delete own account and its tasks

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::auth::{check_password_strength, hash_password_blocking},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use tasklane_shared::{
    auth::context::AuthContext,
    models::user::{UpdateProfile, User},
};
use uuid::Uuid;
use validator::Validate;

/// Update profile request
///
/// Billing fields are not accepted here; unknown keys are ignored.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub password: Option<String>,
}

fn require_self(auth: &AuthContext, id: Uuid) -> ApiResult<()> {
    if auth.is_user(id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "You can only access your own account".to_string(),
        ))
    }
}

async fn load(state: &AppState, id: Uuid) -> ApiResult<User> {
    User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// Returns the caller's profile
///
/// # Errors
///
/// - `404 Not Found`: The account was deleted after the token was issued
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<User>> {
    Ok(Json(load(&state, auth.user_id).await?))
}

/// Returns a user by id
///
/// # Errors
///
/// - `403 Forbidden`: `id` is not the caller
/// - `404 Not Found`: User doesn't exist
pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    require_self(&auth, id)?;
    Ok(Json(load(&state, id).await?))
}

/// Updates the caller's email and/or password
///
/// # Endpoint
///
/// ```text
/// PUT /v1/users/:id
/// Content-Type: application/json
///
/// { "email": "new@example.com", "password": "new-secret" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Nothing to update
/// - `403 Forbidden`: `id` is not the caller
/// - `409 Conflict`: Email already in use
/// - `422 Unprocessable Entity`: Validation failed
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    require_self(&auth, id)?;
    req.validate()?;

    if req.email.is_none() && req.password.is_none() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let password_hash = match req.password {
        Some(plain) => {
            check_password_strength(&plain)?;
            Some(hash_password_blocking(plain).await?)
        }
        None => None,
    };

    let user = User::update_profile(
        &state.db,
        id,
        UpdateProfile {
            email: req.email,
            password_hash,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %user.id, "Profile updated");

    Ok(Json(user))
}

/// Deletes the caller's account
///
/// Tasks are removed with it. The gateway customer is left in place.
///
/// # Errors
///
/// - `403 Forbidden`: `id` is not the caller
/// - `404 Not Found`: User doesn't exist
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_self(&auth, id)?;

    if !User::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = %id, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}
