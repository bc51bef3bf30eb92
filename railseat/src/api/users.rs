//! User directory endpoints.

use crate::app::SignUp;
use crate::server::state::AppState;
use crate::types::{RiderId, RiderProfile};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use railseat_web::AppError;
use serde::{Deserialize, Serialize};

/// Login request.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Login name
    pub username: String,
    /// Plaintext password
    pub password: String,
}

/// Login response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Authenticated rider
    pub user_id: RiderId,
}

/// Create an account.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/v1/users/signup \
///   -H "Content-Type: application/json" \
///   -d '{"username":"ada","name":"Ada","email":"ada@example.com","password":"pw"}'
/// ```
///
/// # Errors
///
/// 400 `DUPLICATE_RIDER` or `INVALID_INPUT`.
pub async fn sign_up(
    State(state): State<AppState>,
    Json(request): Json<SignUp>,
) -> Result<(StatusCode, Json<RiderProfile>), AppError> {
    let profile = state.users.sign_up(request).await?;
    tracing::info!(rider_id = %profile.id, username = %profile.username, "Rider signed up");
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Check a password.
///
/// # Errors
///
/// 400 `RIDER_NOT_FOUND` or `WRONG_CREDENTIALS`.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user_id = state
        .users
        .login(&request.username, &request.password)
        .await?;
    Ok(Json(LoginResponse { user_id }))
}

/// One rider profile.
///
/// # Errors
///
/// 400 `RIDER_NOT_FOUND`.
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<RiderId>,
) -> Result<Json<RiderProfile>, AppError> {
    Ok(Json(state.users.get(id).await?))
}
