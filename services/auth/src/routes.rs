//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    AppState,
    error::AuthError,
    jwt::Identity,
    middleware::{authenticate, require_user, require_vendor},
    models::{ApiResponse, LoginRequest, Role},
    validation,
};

/// Response for token generation
#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in: u64,
}

/// Request for a password change
#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/logout", post(logout))
        .route("/password", post(change_password))
        .route("/me", get(me));

    let users = Router::new()
        .route("/users/me", get(me))
        .route_layer(from_fn(require_user));

    let vendors = Router::new()
        .route("/vendors/me", get(me))
        .route_layer(from_fn(require_vendor));

    let protected = authenticated
        .merge(users)
        .merge(vendors)
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .route("/health", get(health_check))
        .route("/users/login", post(user_login))
        .route("/vendors/login", post(vendor_login))
        .merge(protected)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

/// User login endpoint
pub async fn user_login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    login(state, Role::User, payload).await
}

/// Vendor login endpoint
pub async fn vendor_login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    login(state, Role::Vendor, payload).await
}

async fn login(
    state: AppState,
    role: Role,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let Json(payload) = payload.map_err(|e| AuthError::BadRequest(e.body_text()))?;
    info!("Login attempt for {}", role);

    validation::validate_login(&payload.email, &payload.password)
        .map_err(AuthError::BadRequest)?;

    let issued = state
        .sessions
        .login(role, &payload.email, &payload.password)
        .await?;

    let response = TokenResponse {
        token: issued.token,
        token_type: "Bearer".to_string(),
        expires_at: issued.expires_at,
        expires_in: state.sessions.token_lifetime(),
    };

    Ok((StatusCode::OK, Json(ApiResponse::ok("login successful", response))))
}

/// Logout endpoint
pub async fn logout(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, AuthError> {
    state.sessions.logout(&identity).await?;

    Ok((StatusCode::OK, Json(ApiResponse::message("logged out"))))
}

/// Password change endpoint; the presenting token is revoked on success
pub async fn change_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let Json(payload) = payload.map_err(|e| AuthError::BadRequest(e.body_text()))?;

    state
        .sessions
        .change_password(&identity, &payload.current_password, &payload.new_password)
        .await?;

    Ok((StatusCode::OK, Json(ApiResponse::message("password changed"))))
}

/// Identity of the authenticated principal
pub async fn me(Extension(identity): Extension<Identity>) -> impl IntoResponse {
    Json(ApiResponse::ok("authenticated", identity))
}
