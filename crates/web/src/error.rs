//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. Route handlers return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::accounts::SyncOutcome;
use crate::services::auth::AuthError;
use crate::services::orders::OrderError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Account or authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Order operation failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Session store failure.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_)
                | AuthError::InvalidHandle(_)
                | AuthError::IncorrectPassword
                | AuthError::WeakPassword(_)
                | AuthError::PasswordMismatch => StatusCode::BAD_REQUEST,
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::AccountInactive => StatusCode::FORBIDDEN,
                AuthError::AlreadyActive | AuthError::AlreadyExists | AuthError::EmailInUse => {
                    StatusCode::CONFLICT
                }
                AuthError::NotFound => StatusCode::NOT_FOUND,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Order(err) => match err {
                OrderError::Empty
                | OrderError::InvalidQuantity
                | OrderError::UnknownItem(_)
                | OrderError::Unavailable(_) => StatusCode::BAD_REQUEST,
                OrderError::NotFound => StatusCode::NOT_FOUND,
                OrderError::InvalidTransition { .. } => StatusCode::CONFLICT,
                OrderError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message shown to the client.
    fn public_message(&self) -> String {
        match self {
            Self::Auth(AuthError::InvalidEmail(_)) => "Invalid email address.".to_string(),
            Self::Auth(AuthError::InvalidHandle(e)) => format!("Invalid username: {e}."),
            Self::Auth(AuthError::NotFound) => "User not found.".to_string(),
            Self::Auth(err) => err.to_string(),
            Self::Order(OrderError::NotFound) => "Order not found.".to_string(),
            Self::Order(err) => err.to_string(),
            Self::NotFound(what) => format!("{what} not found."),
            Self::BadRequest(msg) => msg.clone(),
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = ErrorBody {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Body of every mutating response: what happened, plus a warning when the
/// identity broker could not be updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageResponse {
    pub message: String,
    pub warning: Option<String>,
}

impl MessageResponse {
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            warning: None,
        }
    }

    /// Attach `warning` when the broker sync failed.
    #[must_use]
    pub fn with_outcome(message: impl Into<String>, outcome: SyncOutcome, warning: &str) -> Self {
        Self {
            message: message.into(),
            warning: outcome.is_failed().then(|| warning.to_owned()),
        }
    }

    /// Pick `synced` when the broker accepted the change and `done` otherwise.
    #[must_use]
    pub fn for_sync(
        outcome: SyncOutcome,
        synced: impl Into<String>,
        done: impl Into<String>,
        warning: &str,
    ) -> Self {
        let message = if outcome == SyncOutcome::Synced {
            synced.into()
        } else {
            done.into()
        };
        Self::with_outcome(message, outcome, warning)
    }
}

impl IntoResponse for MessageResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use foodi_core::{OrderStatus, PermissionTier};

    use super::*;

    fn status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_auth_status_codes() {
        assert_eq!(status(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::AccountInactive), StatusCode::FORBIDDEN);
        assert_eq!(status(AuthError::AlreadyExists), StatusCode::CONFLICT);
        assert_eq!(status(AuthError::AlreadyActive), StatusCode::CONFLICT);
        assert_eq!(status(AuthError::PasswordMismatch), StatusCode::BAD_REQUEST);
        assert_eq!(status(AuthError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status(AuthError::Repository(RepositoryError::NotFound)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_order_status_codes() {
        assert_eq!(status(OrderError::Empty), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(OrderError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Pending,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(AppError::NotFound("Menu item".to_string())),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let response = AppError::Internal("pool exhausted".to_string()).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
    }

    #[test]
    fn test_warning_only_on_failed_sync() {
        let warn = "Profile updated but could not sync with Keycloak.";
        assert_eq!(
            MessageResponse::with_outcome("Profile updated.", SyncOutcome::Failed, warn).warning,
            Some(warn.to_string())
        );
        assert_eq!(
            MessageResponse::with_outcome("Profile updated.", SyncOutcome::NotLinked, warn)
                .warning,
            None
        );
        let msg = format!("User alice role updated to {}.", PermissionTier::Admin.info().display_name);
        assert_eq!(MessageResponse::ok(msg).warning, None);
    }

    #[test]
    fn test_for_sync_picks_message() {
        let pick = |outcome| {
            MessageResponse::for_sync(outcome, "done and synced", "done", "not synced")
        };

        assert_eq!(pick(SyncOutcome::Synced).message, "done and synced");
        assert_eq!(pick(SyncOutcome::Synced).warning, None);
        assert_eq!(pick(SyncOutcome::NotLinked).message, "done");
        assert_eq!(pick(SyncOutcome::Failed).message, "done");
        assert_eq!(pick(SyncOutcome::Failed).warning.as_deref(), Some("not synced"));
    }
}
