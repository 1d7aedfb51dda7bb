//! Authentication middleware and extractors.
//!
//! Provides extractors for requiring a signed-in account, optionally at a
//! minimum permission tier, in route handlers.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{Method, StatusCode, header, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use tower_sessions::cookie::time::{Duration, OffsetDateTime};
use tower_sessions::{Expiry, Session};

use foodi_core::PermissionTier;

use super::session::LOGIN_LIFETIME_SECONDS;
use crate::models::{CurrentAccount, session_keys};

/// Extractor that requires a signed-in account.
///
/// Browser navigations without a login are redirected to the login page;
/// other requests get 401.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(account): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", account.handle)
/// }
/// ```
pub struct RequireAuth(pub CurrentAccount);

/// Error returned when a request lacks the required login or tier.
#[derive(Debug)]
pub enum AuthRejection {
    /// Redirect to login, returning to the given path afterwards.
    RedirectToLogin(String),
    /// Unauthorized response (for API requests).
    Unauthorized,
    /// Signed in, but the tier is too low.
    Forbidden(PermissionTier),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(return_url) => Redirect::to(&format!(
                "/account/login?return_url={}",
                urlencoding::encode(&return_url)
            ))
            .into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden(required) => (
                StatusCode::FORBIDDEN,
                format!("This page requires the {} tier or above.", required.info().display_name),
            )
                .into_response(),
        }
    }
}

/// Rejection for an anonymous request: browsers are sent to the login page.
///
/// The return URL is the full request path, including any prefix a nested
/// router stripped from `parts.uri`.
fn anonymous(parts: &Parts) -> AuthRejection {
    let wants_html = parts
        .headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/html"));

    if parts.method == Method::GET && wants_html {
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map_or(&parts.uri, |original| &original.0);
        let return_url = uri
            .path_and_query()
            .map_or_else(|| "/".to_owned(), ToString::to_string);
        AuthRejection::RedirectToLogin(return_url)
    } else {
        AuthRejection::Unauthorized
    }
}

/// The signed-in account, if the login has not expired.
///
/// An expired login is removed from the session.
pub async fn current_account(session: &Session) -> Option<CurrentAccount> {
    let account: CurrentAccount = session
        .get(session_keys::CURRENT_ACCOUNT)
        .await
        .ok()
        .flatten()?;

    let expires_at: i64 = session
        .get(session_keys::LOGIN_EXPIRES_AT)
        .await
        .ok()
        .flatten()
        .unwrap_or(0);
    if Utc::now().timestamp() >= expires_at {
        tracing::debug!(account_id = %account.id, "Login expired");
        if let Err(err) = clear_current_account(session).await {
            tracing::debug!(error = %err, "Failed to clear expired login");
        }
        return None;
    }

    Some(account)
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AuthRejection::Unauthorized)?;

        current_account(session)
            .await
            .map(Self)
            .ok_or_else(|| anonymous(parts))
    }
}

/// Extractor that optionally gets the current account.
///
/// Unlike `RequireAuth`, this does not reject anonymous requests.
pub struct OptionalAuth(pub Option<CurrentAccount>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let account = match parts.extensions.get::<Session>() {
            Some(session) => current_account(session).await,
            None => None,
        };

        Ok(Self(account))
    }
}

/// Define an extractor requiring a minimum tier.
macro_rules! tier_extractor {
    ($(#[$meta:meta])* $name:ident, $tier:expr) => {
        $(#[$meta])*
        pub struct $name(pub CurrentAccount);

        impl $name {
            /// The minimum tier this extractor admits.
            pub const REQUIRED: PermissionTier = $tier;
        }

        impl<S> FromRequestParts<S> for $name
        where
            S: Send + Sync,
        {
            type Rejection = AuthRejection;

            async fn from_request_parts(
                parts: &mut Parts,
                state: &S,
            ) -> Result<Self, Self::Rejection> {
                let RequireAuth(account) = RequireAuth::from_request_parts(parts, state).await?;
                if !account.has_tier(Self::REQUIRED) {
                    tracing::warn!(
                        account_id = %account.id,
                        required = %Self::REQUIRED,
                        "Tier check failed"
                    );
                    return Err(AuthRejection::Forbidden(Self::REQUIRED));
                }
                Ok(Self(account))
            }
        }
    };
}

tier_extractor!(
    /// Requires the Lead tier or above.
    RequireLead,
    PermissionTier::Lead
);
tier_extractor!(
    /// Requires the Admin tier or above.
    RequireAdmin,
    PermissionTier::Admin
);
tier_extractor!(
    /// Requires the Head tier.
    RequireHead,
    PermissionTier::Head
);

/// Store the signed-in account in the session.
///
/// The session id is cycled to prevent fixation. The login is valid for 24
/// hours; with `remember_me` the cookie also outlives the browser session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_account(
    session: &Session,
    account: &CurrentAccount,
    remember_me: bool,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_ACCOUNT, account).await?;
    session
        .insert(
            session_keys::LOGIN_EXPIRES_AT,
            Utc::now().timestamp() + LOGIN_LIFETIME_SECONDS,
        )
        .await?;

    if remember_me {
        let until = OffsetDateTime::now_utc() + Duration::seconds(LOGIN_LIFETIME_SECONDS);
        session.set_expiry(Some(Expiry::AtDateTime(until)));
    } else {
        session.set_expiry(Some(Expiry::OnSessionEnd));
    }
    Ok(())
}

/// Clear the signed-in account from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_account(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentAccount>(session_keys::CURRENT_ACCOUNT)
        .await?;
    session.remove::<i64>(session_keys::LOGIN_EXPIRES_AT).await?;
    Ok(())
}
