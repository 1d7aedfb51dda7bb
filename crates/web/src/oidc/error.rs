//! OAuth 2.0 / OIDC protocol errors.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use oxide_auth::endpoint::OAuthError;
use oxide_auth_axum::WebError;
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;

/// Protocol error rendered as an RFC 6749 error body.
#[derive(Debug, Error)]
pub enum OidcError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("client authentication failed")]
    InvalidClient,

    #[error("{0}")]
    InvalidGrant(String),

    #[error("grant type is not supported")]
    UnsupportedGrantType,

    /// Bearer token missing, malformed, expired or for an inactive account.
    #[error("{0}")]
    InvalidToken(String),

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("provider configuration: {0}")]
    Configuration(String),

    #[error("token engine: {0}")]
    Engine(String),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Requests the engine refuses to answer, or cannot parse, are the caller's
/// fault. Everything else is ours.
impl From<WebError> for OidcError {
    fn from(err: WebError) -> Self {
        match err {
            WebError::Endpoint(OAuthError::DenySilently) => {
                Self::InvalidRequest("unknown client or redirect_uri".into())
            }
            WebError::Endpoint(OAuthError::BadRequest)
            | WebError::Query
            | WebError::Body
            | WebError::Form
            | WebError::Encoding
            | WebError::Authorization => Self::InvalidRequest(err.to_string()),
            other => Self::Engine(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    error_description: &'a str,
}

impl OidcError {
    /// The RFC 6749 `error` code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidToken(_) => "invalid_token",
            Self::Signing(_) | Self::Configuration(_) | Self::Engine(_) | Self::Repository(_) => {
                "server_error"
            }
        }
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidClient | Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Self::Signing(_) | Self::Configuration(_) | Self::Engine(_) | Self::Repository(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for OidcError {
    fn into_response(self) -> Response {
        let status = self.status();
        let description = if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(error = %self, sentry_event_id = %event_id, "OIDC server error");
            "internal error".to_string()
        } else {
            tracing::debug!(error = %self, code = self.code(), "OIDC request rejected");
            self.to_string()
        };

        let mut response = (
            status,
            Json(ErrorBody {
                error: self.code(),
                error_description: &description,
            }),
        )
            .into_response();

        match self {
            Self::InvalidToken(_) => {
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Bearer error=\"invalid_token\""),
                );
            }
            Self::InvalidClient => {
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Basic realm=\"foodi\""),
                );
            }
            _ => {}
        }
        response
    }
}
