//! Access gate: bearer-token authentication and role predicates
//!
//! `authenticate` must run before any role predicate. Axum runs the
//! outermost layer first, so add role layers before `authenticate`:
//!
//! ```ignore
//! Router::new()
//!     .route("/vendors/me", get(me))
//!     .route_layer(from_fn(require_vendor))
//!     .route_layer(from_fn_with_state(state, authenticate))
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::{AppState, error::AuthError, jwt::Identity, models::Role};

/// Extract the bearer token from the Authorization header
fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_owned())
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}

/// Verify the bearer token, check revocation, and attach the [`Identity`]
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers())?;
    let identity = state.sessions.authenticate(&token).await?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Admit only user tokens
pub async fn require_user(req: Request<Body>, next: Next) -> Result<Response, AuthError> {
    require_role(Role::User, req, next).await
}

/// Admit only vendor tokens
pub async fn require_vendor(req: Request<Body>, next: Next) -> Result<Response, AuthError> {
    require_role(Role::Vendor, req, next).await
}

/// Reject requests whose identity has another role.
///
/// A request with no identity attached never passes.
async fn require_role(
    required: Role,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let actual = req
        .extensions()
        .get::<Identity>()
        .map(|identity| identity.role)
        .ok_or(AuthError::MissingToken)?;

    if actual != required {
        return Err(AuthError::WrongRole { required, actual });
    }

    Ok(next.run(req).await)
}
