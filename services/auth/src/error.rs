//! Custom error types for the authentication service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use thiserror::Error;
use tracing::{debug, error};

use crate::{jwt::TokenError, models::ApiResponse, models::Role, password::CredentialError};

/// Shared message for every token that fails verification or is revoked
const INVALID_TOKEN_MESSAGE: &str = "invalid or expired token";

/// Custom error type for authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// No `Authorization: Bearer` header, or one that cannot be parsed
    #[error("missing or malformed authorization header")]
    MissingToken,

    /// Bad signature, wrong algorithm, or expired
    #[error("token failed verification: {0}")]
    InvalidToken(#[from] TokenError),

    /// Structurally valid token that was logged out
    #[error("token has been revoked")]
    Revoked,

    /// Authenticated, but the route is for another principal kind
    #[error("wrong client type: route requires {required}, token is {actual}")]
    WrongRole { required: Role, actual: Role },

    /// Unknown e-mail or wrong password
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Request payload failed validation
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Revocation or credential store failure, including timeouts
    #[error("{operation} failed: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: DatabaseError,
    },

    #[error("credential hashing failed: {0}")]
    Credential(#[from] CredentialError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Wrap a store error with the operation that hit it
    pub fn store(operation: &'static str) -> impl FnOnce(DatabaseError) -> AuthError {
        move |source| AuthError::Store { operation, source }
    }

    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AuthError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "missing or invalid authorization token".to_string(),
            ),
            AuthError::InvalidToken(_) | AuthError::Revoked => {
                (StatusCode::UNAUTHORIZED, INVALID_TOKEN_MESSAGE.to_string())
            }
            AuthError::WrongRole { .. } => {
                (StatusCode::FORBIDDEN, "wrong client type".to_string())
            }
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid email or password".to_string(),
            ),
            AuthError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AuthError::Store { .. } | AuthError::Credential(_) | AuthError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            error!(error = %self, "Request failed with internal error");
        } else {
            debug!(error = %self, "Request rejected");
        }

        (status, Json(ApiResponse::failure(message))).into_response()
    }
}
