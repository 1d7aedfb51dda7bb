//! OpenID Connect provider endpoints.
//!
//! The identity broker is the only registered client. Errors follow RFC 6749:
//! JSON bodies from the token and userinfo endpoints, redirects back to the
//! client from the authorize endpoint once the redirect URI is trusted.

use axum::{
    Form, Json,
    body::{Body, Bytes},
    extract::{FromRequest, OriginalUri, Query, Request, State},
    http::{self, HeaderMap, header},
    response::{IntoResponse, Redirect, Response},
};
use openidconnect::core::CoreJsonWebKeySet;
use oxide_auth_axum::{OAuthRequest, OAuthResource, WebError};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use url::form_urlencoded;

use crate::error::clear_sentry_user;
use crate::middleware::OptionalAuth;
use crate::models::CurrentAccount;
use crate::oidc::{ClientCredentials, DiscoveryDocument, OidcError, TokenGrant, discovery};
use crate::state::AppState;

const AUTHORIZE_PATH: &str = "/connect/authorize";

/// RP-initiated logout parameters.
#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    pub post_logout_redirect_uri: Option<String>,
    pub state: Option<String>,
    pub id_token_hint: Option<String>,
}

/// `GET /.well-known/openid-configuration`
pub async fn discovery(State(state): State<AppState>) -> Result<Json<DiscoveryDocument>, OidcError> {
    state.oidc().discovery().map(Json)
}

/// `GET /.well-known/jwks.json`
pub async fn jwks() -> Json<CoreJsonWebKeySet> {
    Json(discovery::key_set())
}

// =============================================================================
// Authorization
// =============================================================================

pub async fn authorize_get(
    State(state): State<AppState>,
    OptionalAuth(account): OptionalAuth,
    OriginalUri(uri): OriginalUri,
    request: Request,
) -> Response {
    let return_url = uri
        .path_and_query()
        .map_or(AUTHORIZE_PATH, |pq| pq.as_str())
        .to_owned();
    authorize(&state, account, request, &return_url).await
}

/// Form-posted requests are replayed as the equivalent `GET`, which is also
/// what the login page returns to.
pub async fn authorize_post(
    State(state): State<AppState>,
    OptionalAuth(account): OptionalAuth,
    body: Bytes,
) -> Response {
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(form_urlencoded::parse(&body))
        .finish();
    let return_url = format!("{AUTHORIZE_PATH}?{query}");

    match http::Request::get(return_url.as_str()).body(Body::empty()) {
        Ok(request) => authorize(&state, account, request, &return_url).await,
        Err(err) => OidcError::InvalidRequest(err.to_string()).into_response(),
    }
}

#[instrument(skip_all, fields(signed_in = account.is_some()))]
async fn authorize(
    state: &AppState,
    account: Option<CurrentAccount>,
    request: Request,
    return_url: &str,
) -> Response {
    match OAuthRequest::from_request(request, &()).await {
        Ok(request) => {
            state
                .oidc()
                .authorize(request, account.map(|a| a.id), return_url)
                .await
        }
        Err(err) => OidcError::from(err).into_response(),
    }
}

// =============================================================================
// Token and userinfo
// =============================================================================

/// `POST /connect/token`
///
/// Client credentials come from the `Authorization: Basic` header, or else
/// from the form body. Either way the engine sees them in the header.
pub async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, OidcError> {
    let mut params: Vec<(String, String)> = form_urlencoded::parse(&body).into_owned().collect();
    let field = |name: &str| {
        params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    };

    let credentials = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(ClientCredentials::from_basic)
        .or_else(|| ClientCredentials::from_form(field("client_id"), field("client_secret")))
        .ok_or(OidcError::InvalidClient)?;

    let required = |name: &str| {
        field(name)
            .map(str::to_owned)
            .ok_or_else(|| OidcError::InvalidRequest(format!("{name} is required")))
    };
    let grant = match field("grant_type") {
        Some("authorization_code") => TokenGrant::AuthorizationCode(required("code")?),
        Some("refresh_token") => TokenGrant::RefreshToken(required("refresh_token")?),
        _ => return Err(OidcError::UnsupportedGrantType),
    };

    params.retain(|(key, _)| key != "client_id" && key != "client_secret");
    let body = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(&params)
        .finish();
    let request = http::Request::post("/connect/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::AUTHORIZATION, credentials.to_basic())
        .body(Body::from(body))
        .map_err(|e| OidcError::InvalidRequest(e.to_string()))?;
    let request = OAuthRequest::from_request(request, &()).await?;

    state.oidc().token(state.accounts(), request, grant).await
}

/// `GET|POST /connect/userinfo`
pub async fn userinfo(
    State(state): State<AppState>,
    resource: Result<OAuthResource, WebError>,
) -> Result<Response, OidcError> {
    state.oidc().userinfo(state.accounts(), resource?).await
}

// =============================================================================
// Logout
// =============================================================================

pub async fn logout_get(
    State(state): State<AppState>,
    session: Session,
    Query(request): Query<LogoutRequest>,
) -> Response {
    logout(&state, &session, &request).await
}

pub async fn logout_post(
    State(state): State<AppState>,
    session: Session,
    Form(request): Form<LogoutRequest>,
) -> Response {
    logout(&state, &session, &request).await
}

/// Drop the local session and return to the client when it asked for it.
async fn logout(state: &AppState, session: &Session, request: &LogoutRequest) -> Response {
    if let Err(err) = session.flush().await {
        tracing::error!(error = %err, "Failed to flush session on logout");
    }
    clear_sentry_user();

    let location = state.oidc().logout_location(
        request.post_logout_redirect_uri.as_deref(),
        request.state.as_deref(),
    );
    Redirect::to(&location).into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::{Request, StatusCode};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde_json::Value;
    use url::Url;

    use super::*;
    use crate::routes::tests::{get_json, send};

    const REDIRECT: &str = "http://localhost:8080/realms/foodi/broker/foodi/endpoint";

    fn authorize_query(response_type: &str) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", "keycloak-client")
            .append_pair("redirect_uri", REDIRECT)
            .append_pair("response_type", response_type)
            .append_pair("scope", "openid email")
            .append_pair("state", "xyz")
            .finish()
    }

    async fn json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn location(response: &Response) -> String {
        response.headers()[header::LOCATION]
            .to_str()
            .unwrap()
            .to_string()
    }

    fn token_request(body: &'static str, basic: Option<&str>) -> Request<Body> {
        let mut request = Request::post("/connect/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(basic) = basic {
            request = request.header(header::AUTHORIZATION, format!("Basic {}", STANDARD.encode(basic)));
        }
        request.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_discovery_document() {
        let response = send(get_json("/.well-known/openid-configuration")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["issuer"], "http://localhost:5000");
        assert_eq!(json["token_endpoint"], "http://localhost:5000/connect/token");
        assert_eq!(json["jwks_uri"], "http://localhost:5000/.well-known/jwks.json");
    }

    #[tokio::test]
    async fn test_key_set_is_published() {
        let response = send(get_json("/.well-known/jwks.json")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["keys"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_authorize_unknown_client_is_answered_directly() {
        let response = send(get_json(
            "/connect/authorize?client_id=other&response_type=code&scope=openid",
        ))
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "invalid_request");
    }

    #[tokio::test]
    async fn test_authorize_error_goes_back_to_client() {
        let uri = format!("/connect/authorize?{}", authorize_query("token"));
        let response = send(get_json(&uri)).await;
        assert!(response.status().is_redirection());

        let location = location(&response);
        assert!(location.starts_with(REDIRECT));
        assert!(location.contains("error=unsupported_response_type"));
        assert!(location.contains("state=xyz"));
    }

    #[tokio::test]
    async fn test_anonymous_authorize_goes_to_login() {
        let uri = format!("/connect/authorize?{}", authorize_query("code"));
        let response = send(get_json(&uri)).await;
        assert!(response.status().is_redirection());

        let location = Url::parse(&location(&response)).unwrap();
        assert_eq!(location.origin().ascii_serialization(), "http://localhost:5000");
        assert_eq!(location.path(), "/account/login");
        let (name, return_url) = location.query_pairs().next().unwrap();
        assert_eq!(name, "return_url");
        assert_eq!(return_url, uri);
    }

    #[tokio::test]
    async fn test_posted_authorize_returns_to_equivalent_get() {
        let request = Request::post("/connect/authorize")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(authorize_query("code")))
            .unwrap();
        let response = send(request).await;
        assert!(response.status().is_redirection());

        let location = Url::parse(&location(&response)).unwrap();
        let (_, return_url) = location.query_pairs().next().unwrap();
        assert_eq!(
            return_url,
            format!("/connect/authorize?{}", authorize_query("code"))
        );
    }

    #[tokio::test]
    async fn test_token_requires_client_authentication() {
        let response = send(token_request("grant_type=authorization_code&code=abc", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "invalid_client");

        let response = send(token_request(
            "grant_type=authorization_code&code=abc&redirect_uri=x",
            Some("keycloak-client:wrong"),
        ))
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_rejects_unknown_code() {
        let request = token_request(
            "grant_type=authorization_code&code=abc\
             &redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Frealms%2Ffoodi%2Fbroker%2Ffoodi%2Fendpoint\
             &client_id=keycloak-client&client_secret=rp-client-credential-0123456789",
            None,
        );
        let response = send(request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_token_rejects_unknown_grant_type() {
        let response = send(token_request(
            "grant_type=password",
            Some("keycloak-client:rp-client-credential-0123456789"),
        ))
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "unsupported_grant_type");
    }

    #[tokio::test]
    async fn test_userinfo_requires_bearer() {
        let response = send(get_json("/connect/userinfo")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn test_logout_redirects() {
        let response = send(get_json("/connect/logout")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let response = send(get_json(
            "/connect/logout?post_logout_redirect_uri=http%3A%2F%2Flocalhost%3A8080%2F&state=s1",
        ))
        .await;
        assert_eq!(location(&response), "http://localhost:8080/?state=s1");

        let response = send(get_json(
            "/connect/logout?post_logout_redirect_uri=https%3A%2F%2Fevil.example%2F",
        ))
        .await;
        assert_eq!(location(&response), "/");
    }
}
