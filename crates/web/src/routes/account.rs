//! Account route handlers.
//!
//! Login, registration and logout are public; everything else requires a
//! signed-in account.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Deserializer};
use tower_sessions::Session;
use tracing::instrument;
use url::Url;

use crate::error::{AppError, MessageResponse, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_account, set_current_account};
use crate::models::Account;
use crate::routes::Input;
use crate::services::accounts::{AccountService, PasswordChange, ProfileForm, Registration};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    /// Handle or email.
    pub login: String,
    pub password: String,
    #[serde(default, deserialize_with = "checkbox")]
    pub remember_me: bool,
    pub return_url: Option<String>,
}

/// Reactivation form data.
#[derive(Debug, Deserialize)]
pub struct ReactivateForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub return_url: Option<String>,
}

/// Accept a JSON boolean or an HTML checkbox value.
fn checkbox<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Value {
        Flag(bool),
        Text(String),
    }

    Ok(match Value::deserialize(deserializer)? {
        Value::Flag(flag) => flag,
        Value::Text(text) => matches!(text.as_str(), "on" | "true" | "1" | "yes"),
    })
}

/// Whether `url` is a path on the site served at `base_url`.
///
/// Browsers drop tabs and newlines inside URLs and read `\` as `/`, so
/// either makes the path unsafe before it is resolved.
fn is_local_url(base_url: &str, url: &str) -> bool {
    if !url.starts_with('/')
        || url
            .chars()
            .any(|c| c.is_control() || c.is_whitespace() || c == '\\')
    {
        return false;
    }
    let Ok(base) = Url::parse(base_url) else {
        return false;
    };
    base.join(url)
        .is_ok_and(|resolved| resolved.origin() == base.origin())
}

// =============================================================================
// Templates
// =============================================================================

/// Login page, the landing page of the federated authorize flow.
#[derive(Template, WebTemplate)]
#[template(path = "account/login.html")]
pub struct LoginTemplate {
    pub return_url: String,
}

// =============================================================================
// Login / Logout
// =============================================================================

/// Display the login page.
pub async fn login_page(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> LoginTemplate {
    let return_url = query
        .return_url
        .filter(|url| is_local_url(&state.config().base_url, url))
        .unwrap_or_else(|| "/".to_owned());

    LoginTemplate { return_url }
}

/// Handle login form submission.
///
/// With a `return_url` the client is redirected there (only local paths are
/// honored); otherwise the response is JSON.
#[instrument(skip(state, session, form), fields(login = %form.login))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Input(form): Input<LoginForm>,
) -> Result<Response> {
    let account = AccountService::new(state.accounts(), state.broker())
        .login(&form.login, &form.password)
        .await?;

    set_current_account(&session, &account, form.remember_me).await?;
    set_sentry_user(&account.id, Some(account.email.as_str()));

    Ok(match form.return_url {
        Some(url) if is_local_url(&state.config().base_url, &url) => {
            Redirect::to(&url).into_response()
        }
        Some(_) => Redirect::to("/").into_response(),
        None => MessageResponse::ok(format!("Welcome back, {}!", account.handle)).into_response(),
    })
}

/// Handle logout.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<MessageResponse> {
    clear_current_account(&session).await?;
    clear_sentry_user();
    Ok(MessageResponse::ok("You have been signed out."))
}

// =============================================================================
// Registration
// =============================================================================

/// Register a new account at the base tier.
#[instrument(skip(state, form))]
pub async fn register(
    State(state): State<AppState>,
    Input(form): Input<Registration>,
) -> Result<(StatusCode, MessageResponse)> {
    let (account, outcome) = AccountService::new(state.accounts(), state.broker())
        .register(&form)
        .await?;

    let display = account.tier.info().display_name;
    let body = MessageResponse::for_sync(
        outcome,
        format!("Account created successfully as {display} and synced with Keycloak!"),
        format!("Account created successfully as {display}."),
        "Account created but could not sync with Keycloak. You can still use Foodi.",
    );
    Ok((StatusCode::CREATED, body))
}

// =============================================================================
// Profile
// =============================================================================

/// Current account profile.
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<Account>> {
    let account = AccountService::new(state.accounts(), state.broker())
        .profile(current.id)
        .await?;
    Ok(Json(account))
}

/// Update email and names.
///
/// The session principal is refreshed so the new details show up at once.
#[instrument(skip(state, session, current, form), fields(account_id = %current.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
    Input(form): Input<ProfileForm>,
) -> Result<MessageResponse> {
    let (account, outcome) = AccountService::new(state.accounts(), state.broker())
        .update_profile(current.id, &form)
        .await?;

    let mut principal = current;
    principal.email = account.email.clone();
    principal.first_name.clone_from(&account.first_name);
    principal.last_name.clone_from(&account.last_name);
    session
        .insert(crate::models::session_keys::CURRENT_ACCOUNT, &principal)
        .await?;

    Ok(MessageResponse::for_sync(
        outcome,
        "Profile updated successfully and synced with Keycloak!",
        "Profile updated successfully!",
        "Profile updated but could not sync with Keycloak.",
    ))
}

/// Change the password.
#[instrument(skip(state, current, form), fields(account_id = %current.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Input(form): Input<PasswordChange>,
) -> Result<MessageResponse> {
    let outcome = AccountService::new(state.accounts(), state.broker())
        .change_password(current.id, &form)
        .await?;

    Ok(MessageResponse::for_sync(
        outcome,
        "Password changed successfully and synced with Keycloak!",
        "Password changed successfully!",
        "Password changed but could not sync with Keycloak.",
    ))
}

// =============================================================================
// Deactivation
// =============================================================================

/// Deactivate the signed-in account and sign it out.
#[instrument(skip(state, session, current), fields(account_id = %current.id))]
pub async fn deactivate(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
) -> Result<MessageResponse> {
    let (_, outcome) = AccountService::new(state.accounts(), state.broker())
        .deactivate(current.id)
        .await?;

    clear_current_account(&session).await?;
    clear_sentry_user();

    Ok(MessageResponse::with_outcome(
        "Your account has been deactivated.",
        outcome,
        "Account deactivated but could not sync with Keycloak.",
    ))
}

/// Reactivate a deactivated account by email and password.
#[instrument(skip(state, form))]
pub async fn reactivate(
    State(state): State<AppState>,
    Input(form): Input<ReactivateForm>,
) -> Result<MessageResponse> {
    let (_, outcome) = AccountService::new(state.accounts(), state.broker())
        .reactivate(&form.email, &form.password)
        .await?;

    Ok(MessageResponse::with_outcome(
        "Your account has been reactivated!",
        outcome,
        "Account reactivated but could not sync with Keycloak.",
    ))
}

// =============================================================================
// Broker single sign-on
// =============================================================================

/// Send the signed-in user to the broker's account console, hinting that
/// the broker should log them in through this site.
pub async fn go_to_broker(
    State(state): State<AppState>,
    RequireAuth(_): RequireAuth,
) -> Result<Redirect> {
    let keycloak = &state.config().keycloak;
    let realm_url = format!("{}/realms/{}", keycloak.base_url, keycloak.realm);

    let mut url = Url::parse(&format!("{realm_url}/protocol/openid-connect/auth"))
        .map_err(|e| AppError::Internal(format!("invalid broker URL: {e}")))?;
    url.query_pairs_mut()
        .append_pair("client_id", "account")
        .append_pair("redirect_uri", &format!("{realm_url}/account"))
        .append_pair("response_type", "code")
        .append_pair("scope", "openid")
        .append_pair("kc_idp_hint", &keycloak.idp_alias);

    Ok(Redirect::to(url.as_str()))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, header};

    use super::*;
    use crate::routes::tests::send;

    const BASE: &str = "http://localhost:5000";

    #[test]
    fn test_local_url_check() {
        assert!(is_local_url(BASE, "/connect/authorize?client_id=keycloak"));
        assert!(is_local_url(BASE, "/orders"));
        assert!(!is_local_url(BASE, "https://evil.example"));
        assert!(!is_local_url(BASE, "//evil.example"));
        assert!(!is_local_url(BASE, "/\\evil.example"));
    }

    #[test]
    fn test_local_url_rejects_stripped_characters() {
        assert!(!is_local_url(BASE, "/\t/evil.example"));
        assert!(!is_local_url(BASE, "/\n/evil.example"));
        assert!(!is_local_url(BASE, "/\r\n/evil.example"));
        assert!(!is_local_url(BASE, "/ /evil.example"));
        assert!(!is_local_url(BASE, "/\u{0}/evil.example"));
        assert!(!is_local_url("not a url", "/orders"));
    }

    #[test]
    fn test_checkbox_values() {
        let form: LoginForm =
            serde_json::from_str(r#"{"login":"a","password":"b","remember_me":true}"#).unwrap();
        assert!(form.remember_me);

        let form: LoginForm =
            serde_json::from_str(r#"{"login":"a","password":"b","remember_me":"on"}"#).unwrap();
        assert!(form.remember_me);

        let form: LoginForm = serde_json::from_str(r#"{"login":"a","password":"b"}"#).unwrap();
        assert!(!form.remember_me);
    }

    #[tokio::test]
    async fn test_login_page_escapes_return_url() {
        let request = Request::get("/account/login?return_url=%2Fx%22%3E%3Cscript%3E")
            .body(Body::empty())
            .unwrap();
        let response = send(request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains(r#"value="/x&#34;&#62;&#60;script&#62;""#));
        assert!(!html.contains("<script>"));
    }

    #[tokio::test]
    async fn test_login_page_drops_foreign_return_url() {
        let request = Request::get("/account/login?return_url=https%3A%2F%2Fevil.example")
            .body(Body::empty())
            .unwrap();
        let body = axum::body::to_bytes(send(request).await.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains(r#"name="return_url" value="/""#));
    }

    #[tokio::test]
    async fn test_logout_without_session_is_fine() {
        let request = Request::post("/account/logout")
            .header(header::ACCEPT, "application/json")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(request).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_broker_redirect_requires_login() {
        let response = send(crate::routes::tests::get_json("/sso/broker")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
