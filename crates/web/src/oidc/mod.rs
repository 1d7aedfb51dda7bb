//! OpenID Connect provider used by the identity broker to federate logins.
//!
//! Protocol mechanics run on the `oxide-auth` engine: redirect matching,
//! authorization codes, PKCE, client authentication, refresh and bearer
//! checks. This module supplies what the engine does not know about: who is
//! signed in, the ID token, and the userinfo document.
//!
//! Access and refresh tokens are HS256 JWTs signed with the provider's token
//! key. ID tokens are signed with the client secret.
//!
//! # Modules
//!
//! - [`claims`] - claim population, destination policy, userinfo scope gating
//! - [`clients`] - the registered client and its authentication
//! - [`grants`] - authorization codes and what the engine's grant leaves out
//! - [`tokens`] - token signing and verification
//! - [`discovery`] - the discovery document and key set

pub mod claims;
pub mod clients;
pub mod discovery;
pub mod error;
pub mod grants;
pub mod tokens;

use std::sync::Arc;

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{TimeDelta, Utc};
use openidconnect::core::{CoreHmacKey, CoreIdToken, CoreIdTokenClaims, CoreJwsSigningAlgorithm};
use openidconnect::{AccessToken, Audience, EmptyAdditionalClaims, IssuerUrl, Nonce};
use oxide_auth::endpoint::{
    AccessTokenFlow, AuthorizationFlow, OwnerConsent, OwnerSolicitor, QueryParameter, RefreshFlow,
    ResourceFlow, Scope, Solicitation, WebResponse,
};
use oxide_auth::frontends::simple::endpoint::{Generic, Vacant};
use oxide_auth::frontends::simple::extensions::{AddonList, Extended, Pkce};
use oxide_auth_axum::{OAuthRequest, OAuthResource, OAuthResponse, WebError};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use url::Url;

use foodi_core::AccountId;

use crate::config::AppConfig;
use crate::db::AccountStore;
use crate::models::Account;

pub use claims::Scopes;
pub use clients::{ClientCredentials, ClientRegistry};
pub use discovery::DiscoveryDocument;
pub use error::OidcError;
pub use grants::{CodeBinding, CodeBindings, CodeStore};
pub use tokens::{TokenIssuer, TokenUse};

/// Upper bound on a token response produced by the engine.
const ENGINE_BODY_LIMIT: usize = 64 * 1024;

/// Grant presented at the token endpoint.
#[derive(Debug, Clone)]
pub enum TokenGrant {
    AuthorizationCode(String),
    RefreshToken(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// The parts of the engine's token response we pass on.
#[derive(Deserialize)]
struct EngineToken {
    access_token: String,
    refresh_token: Option<String>,
}

/// The provider: client registry, code store and token issuer.
#[derive(Clone)]
pub struct OidcProvider {
    inner: Arc<Inner>,
}

struct Inner {
    client_id: String,
    clients: ClientRegistry,
    codes: CodeStore,
    bindings: CodeBindings,
    tokens: TokenIssuer,
    id_token_key: CoreHmacKey,
    login_url: Url,
    resource_scopes: Vec<Scope>,
}

/// Approves the request for the signed-in account, or sends the browser to
/// the login page first.
struct SessionOwner {
    account: Option<AccountId>,
    login: Url,
}

impl OwnerSolicitor<OAuthRequest> for SessionOwner {
    fn check_consent(
        &mut self,
        _: &mut OAuthRequest,
        _: Solicitation,
    ) -> OwnerConsent<OAuthResponse> {
        if let Some(account) = self.account {
            return OwnerConsent::Authorized(account.to_string());
        }

        let mut response = OAuthResponse::default();
        match response.redirect(self.login.clone()) {
            Ok(()) => OwnerConsent::InProgress(response),
            Err(err) => OwnerConsent::Error(err),
        }
    }
}

/// PKCE is optional; `plain` is accepted for clients that cannot hash.
fn pkce() -> AddonList {
    let mut pkce = Pkce::optional();
    pkce.allow_plain();
    let mut addons = AddonList::new();
    addons.push_code(pkce);
    addons
}

impl OidcProvider {
    /// # Errors
    ///
    /// Returns `OidcError::Configuration` for an unusable base URL or client
    /// registration.
    pub fn new(config: &AppConfig) -> Result<Self, OidcError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| OidcError::Configuration(format!("base URL: {e}")))?;
        let login_url = base_url
            .join("/account/login")
            .map_err(|e| OidcError::Configuration(format!("login URL: {e}")))?;
        let openid: Scope = claims::SCOPE_OPENID
            .parse()
            .map_err(|_| OidcError::Configuration("invalid resource scope".into()))?;

        let oidc = &config.oidc;
        Ok(Self {
            inner: Arc::new(Inner {
                client_id: oidc.client_id.clone(),
                clients: ClientRegistry::from_config(oidc)?,
                codes: CodeStore::default(),
                bindings: CodeBindings::default(),
                tokens: TokenIssuer::new(
                    base_url,
                    oidc.client_id.clone(),
                    oidc.token_secret.clone(),
                    oidc.access_token_ttl,
                    oidc.refresh_token_ttl,
                ),
                id_token_key: CoreHmacKey::new(oidc.client_secret.expose_secret().as_bytes()),
                login_url,
                resource_scopes: vec![openid],
            }),
        })
    }

    /// # Errors
    ///
    /// Returns `OidcError::Configuration` if the issuer is not a valid URL.
    pub fn discovery(&self) -> Result<DiscoveryDocument, OidcError> {
        discovery::document(self.inner.tokens.issuer())
    }

    /// Authorization endpoint.
    ///
    /// `return_url` is where the login page sends the browser back to; it
    /// must reproduce this request.
    #[instrument(skip_all, fields(signed_in = account.is_some()))]
    pub async fn authorize(
        &self,
        request: OAuthRequest,
        account: Option<AccountId>,
        return_url: &str,
    ) -> Response {
        let nonce = request
            .query()
            .and_then(|query| query.unique_value("nonce"))
            .map(|nonce| nonce.into_owned());

        let mut login = self.inner.login_url.clone();
        login.query_pairs_mut().append_pair("return_url", return_url);

        let endpoint = Extended::extend_with(
            Generic {
                registrar: self.inner.clients.clone(),
                authorizer: self.inner.codes.clone(),
                issuer: Vacant,
                solicitor: SessionOwner { account, login },
                scopes: Vacant,
                response: Vacant,
            },
            pkce(),
        );
        let result = AuthorizationFlow::<_, OAuthRequest>::prepare(endpoint)
            .and_then(|mut flow| flow.execute(request));
        let response = match result {
            Ok(response) => response.into_response(),
            Err(err) => return OidcError::from(WebError::from(err)).into_response(),
        };

        if let (Some(account_id), Some(code)) = (account, issued_code(&response)) {
            self.inner
                .bindings
                .bind(code, CodeBinding { account_id, nonce })
                .await;
            info!(%account_id, "Authorization code issued");
        }
        response
    }

    /// Token endpoint.
    ///
    /// The engine authenticates the client and validates the grant; on success
    /// the response is re-shaped to carry the ID token.
    ///
    /// # Errors
    ///
    /// Returns `OidcError::InvalidGrant` when the account behind the grant is
    /// gone or deactivated. Rejections from the engine are returned as `Ok`
    /// responses carrying its RFC 6749 error body.
    #[instrument(skip_all)]
    pub async fn token<S: AccountStore>(
        &self,
        accounts: &S,
        request: OAuthRequest,
        grant: TokenGrant,
    ) -> Result<Response, OidcError> {
        let (account_id, nonce) = match &grant {
            TokenGrant::AuthorizationCode(code) => match self.inner.bindings.get(code).await {
                Some(binding) => (Some(binding.account_id), binding.nonce.clone()),
                None => (None, None),
            },
            TokenGrant::RefreshToken(token) => (
                self.inner
                    .tokens
                    .verify(token, TokenUse::Refresh)
                    .ok()
                    .and_then(|claims| parse_subject(&claims.sub)),
                None,
            ),
        };
        let account = match account_id {
            Some(id) => accounts.find_by_id(id).await?,
            None => None,
        };

        let issuer = self.inner.tokens.for_account(account.as_ref());
        let result = match &grant {
            TokenGrant::AuthorizationCode(_) => {
                let endpoint = Extended::extend_with(
                    Generic {
                        registrar: self.inner.clients.clone(),
                        authorizer: self.inner.codes.clone(),
                        issuer,
                        solicitor: Vacant,
                        scopes: Vacant,
                        response: Vacant,
                    },
                    pkce(),
                );
                AccessTokenFlow::<_, OAuthRequest>::prepare(endpoint)
                    .and_then(|mut flow| flow.execute(request))
            }
            TokenGrant::RefreshToken(_) => {
                let endpoint = Generic {
                    registrar: self.inner.clients.clone(),
                    authorizer: Vacant,
                    issuer,
                    solicitor: Vacant,
                    scopes: Vacant,
                    response: Vacant,
                };
                RefreshFlow::<_, OAuthRequest>::prepare(endpoint)
                    .and_then(|mut flow| flow.execute(request))
            }
        };
        let response = result.map_err(WebError::from)?.into_response();
        if response.status() != StatusCode::OK {
            return Ok(response);
        }
        if let TokenGrant::AuthorizationCode(code) = &grant {
            self.inner.bindings.release(code).await;
        }

        let body = axum::body::to_bytes(response.into_body(), ENGINE_BODY_LIMIT)
            .await
            .map_err(|e| OidcError::Engine(e.to_string()))?;
        let issued: EngineToken =
            serde_json::from_slice(&body).map_err(|e| OidcError::Engine(e.to_string()))?;

        let account = match account {
            Some(account) if account.is_active => account,
            Some(_) => return Err(OidcError::InvalidGrant("account is deactivated".into())),
            None => return Err(OidcError::InvalidGrant("account no longer exists".into())),
        };
        let scopes = self
            .inner
            .tokens
            .verify(&issued.access_token, TokenUse::Access)?
            .scopes();
        let id_token = if scopes.contains(claims::SCOPE_OPENID) {
            Some(self.id_token(&account, &issued.access_token, nonce)?)
        } else {
            None
        };

        info!(account_id = %account.id, scope = %scopes, "Tokens issued");
        let body = TokenResponse {
            access_token: issued.access_token,
            token_type: "Bearer",
            expires_in: self.inner.tokens.access_ttl().as_secs(),
            scope: scopes.to_string(),
            id_token,
            refresh_token: issued.refresh_token,
        };
        Ok((
            [
                (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
                (header::PRAGMA, HeaderValue::from_static("no-cache")),
            ],
            Json(body),
        )
            .into_response())
    }

    fn id_token(
        &self,
        account: &Account,
        access_token: &str,
        nonce: Option<String>,
    ) -> Result<String, OidcError> {
        let now = Utc::now();
        let ttl = TimeDelta::from_std(self.inner.tokens.access_ttl()).unwrap_or(TimeDelta::hours(1));
        let issuer = IssuerUrl::new(self.inner.tokens.issuer().to_owned())
            .map_err(|e| OidcError::Configuration(format!("issuer URL: {e}")))?;

        let claims = CoreIdTokenClaims::new(
            issuer,
            vec![Audience::new(self.inner.client_id.clone())],
            now.checked_add_signed(ttl).unwrap_or(now),
            now,
            claims::identity_claims(account),
            EmptyAdditionalClaims {},
        )
        .set_nonce(nonce.map(Nonce::new));

        CoreIdToken::new(
            claims,
            &self.inner.id_token_key,
            CoreJwsSigningAlgorithm::HmacSha256,
            Some(&AccessToken::new(access_token.to_owned())),
            None,
        )
        .map(|token| token.to_string())
        .map_err(|e| OidcError::Signing(e.to_string()))
    }

    /// Userinfo endpoint.
    ///
    /// A missing or invalid bearer token is answered by the engine with a 401
    /// and a `WWW-Authenticate` challenge.
    ///
    /// # Errors
    ///
    /// Returns `OidcError::InvalidToken` if the account behind a valid token is
    /// gone or deactivated.
    pub async fn userinfo<S: AccountStore>(
        &self,
        accounts: &S,
        resource: OAuthResource,
    ) -> Result<Response, OidcError> {
        let endpoint = Generic {
            registrar: Vacant,
            authorizer: Vacant,
            issuer: self.inner.tokens.clone(),
            solicitor: Vacant,
            scopes: self.inner.resource_scopes.clone(),
            response: Vacant,
        };
        let mut flow = ResourceFlow::<_, OAuthRequest>::prepare(endpoint).map_err(WebError::from)?;
        let grant = match flow.execute(resource.into()) {
            Ok(grant) => grant,
            Err(Ok(response)) => return Ok(response.into_response()),
            Err(Err(err)) => return Err(WebError::from(err).into()),
        };

        let account_id = parse_subject(&grant.owner_id)
            .ok_or_else(|| OidcError::InvalidToken("token subject is malformed".into()))?;
        let account = active_account(accounts, account_id, OidcError::InvalidToken).await?;
        let scopes = Scopes::parse(&grant.scope.to_string());

        Ok(Json(claims::userinfo(&account, &scopes)).into_response())
    }

    /// Where to send the browser after logout.
    #[must_use]
    pub fn logout_location(&self, post_logout_redirect_uri: Option<&str>, state: Option<&str>) -> String {
        let Some(uri) = post_logout_redirect_uri
            .filter(|uri| self.inner.clients.allows_post_logout_redirect(uri))
        else {
            return "/".to_owned();
        };

        let pairs: Vec<(&str, &str)> = state.map(|s| ("state", s)).into_iter().collect();
        with_query(uri, &pairs).unwrap_or_else(|_| "/".to_owned())
    }
}

/// The `code` of a successful authorization redirect.
fn issued_code(response: &Response) -> Option<String> {
    let location = response.headers().get(header::LOCATION)?.to_str().ok()?;
    Url::parse(location)
        .ok()?
        .query_pairs()
        .find(|(name, _)| name == "code")
        .map(|(_, code)| code.into_owned())
}

async fn active_account<S: AccountStore>(
    accounts: &S,
    id: AccountId,
    reject: fn(String) -> OidcError,
) -> Result<Account, OidcError> {
    match accounts.find_by_id(id).await? {
        Some(account) if account.is_active => Ok(account),
        Some(_) => Err(reject("account is deactivated".into())),
        None => Err(reject("account no longer exists".into())),
    }
}

fn parse_subject(sub: &str) -> Option<AccountId> {
    sub.parse::<i32>().ok().map(AccountId::new)
}

fn with_query(base: &str, pairs: &[(&str, &str)]) -> Result<String, OidcError> {
    let mut url = Url::parse(base)
        .map_err(|e| OidcError::InvalidRequest(format!("invalid redirect URI: {e}")))?;
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::extract::{FromRequest, FromRequestParts};
    use axum::http::Request;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::Value;
    use sha2::{Digest, Sha256};
    use url::form_urlencoded;

    use foodi_core::{Email, Handle, PermissionTier};

    use super::*;
    use crate::config::tests::test_config;
    use crate::models::NewAccount;
    use crate::services::testing::MemoryAccountStore;

    const REDIRECT: &str = "http://localhost:8080/realms/foodi/broker/foodi/endpoint";

    fn provider() -> OidcProvider {
        OidcProvider::new(&test_config()).unwrap()
    }

    async fn store_with_alice() -> (MemoryAccountStore, AccountId) {
        let store = MemoryAccountStore::default();
        let account = store
            .create(NewAccount {
                handle: Handle::parse("alice").unwrap(),
                email: Email::parse("a@x.com").unwrap(),
                password_hash: String::new(),
                first_name: "Alice".to_string(),
                last_name: "Liddell".to_string(),
                tier: PermissionTier::Agent,
            })
            .await
            .unwrap();
        (store, account.id)
    }

    fn authorize_query(scope: &str, extra: &[(&str, &str)]) -> String {
        authorize_query_to(REDIRECT, scope, extra)
    }

    fn authorize_query_to(redirect_uri: &str, scope: &str, extra: &[(&str, &str)]) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("client_id", "keycloak-client")
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", scope)
            .append_pair("state", "xyz")
            .append_pair("nonce", "n-1");
        query.extend_pairs(extra);
        format!("/connect/authorize?{}", query.finish())
    }

    async fn authorize(
        provider: &OidcProvider,
        account: Option<AccountId>,
        uri: &str,
    ) -> Response {
        let request = Request::get(uri).body(Body::empty()).unwrap();
        let request = OAuthRequest::from_request(request, &()).await.unwrap();
        provider.authorize(request, account, uri).await
    }

    async fn code_for(provider: &OidcProvider, account: AccountId, uri: &str) -> String {
        issued_code(&authorize(provider, Some(account), uri).await).unwrap()
    }

    async fn token(
        provider: &OidcProvider,
        store: &MemoryAccountStore,
        grant: TokenGrant,
        pairs: &[(&str, &str)],
    ) -> Result<Response, OidcError> {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        let credentials = ClientCredentials::from_form(
            Some("keycloak-client"),
            Some("rp-client-credential-0123456789"),
        )
        .unwrap();
        let request = Request::post("/connect/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::AUTHORIZATION, credentials.to_basic())
            .body(Body::from(body))
            .unwrap();
        let request = OAuthRequest::from_request(request, &()).await.unwrap();
        provider.token(store, request, grant).await
    }

    async fn redeem(
        provider: &OidcProvider,
        store: &MemoryAccountStore,
        code: &str,
        verifier: Option<&str>,
    ) -> Result<Response, OidcError> {
        let mut pairs = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", REDIRECT),
        ];
        pairs.extend(verifier.map(|v| ("code_verifier", v)));
        token(
            provider,
            store,
            TokenGrant::AuthorizationCode(code.to_string()),
            &pairs,
        )
        .await
    }

    async fn refresh(
        provider: &OidcProvider,
        store: &MemoryAccountStore,
        refresh_token: &str,
        scope: Option<&str>,
    ) -> Response {
        let mut pairs = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        pairs.extend(scope.map(|s| ("scope", s)));
        token(
            provider,
            store,
            TokenGrant::RefreshToken(refresh_token.to_string()),
            &pairs,
        )
        .await
        .unwrap()
    }

    async fn userinfo(
        provider: &OidcProvider,
        store: &MemoryAccountStore,
        access_token: Option<&str>,
    ) -> Result<Response, OidcError> {
        let mut request = Request::get("/connect/userinfo");
        if let Some(token) = access_token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let (mut parts, ()) = request.body(()).unwrap().into_parts();
        let resource = OAuthResource::from_request_parts(&mut parts, &()).await.unwrap();
        provider.userinfo(store, resource).await
    }

    async fn json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn location(response: &Response) -> Url {
        Url::parse(response.headers()[header::LOCATION].to_str().unwrap()).unwrap()
    }

    fn id_token_payload(id_token: &str) -> Value {
        let payload = id_token.split('.').nth(1).unwrap();
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_untrusted_redirect_is_answered_directly() {
        let provider = provider();
        let (_, id) = store_with_alice().await;

        let uri = authorize_query_to("http://evil.test/cb", "openid", &[]);
        let response = authorize(&provider, Some(id), &uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"], "invalid_request");
    }

    #[tokio::test]
    async fn test_missing_openid_is_redirected() {
        let provider = provider();
        let (_, id) = store_with_alice().await;

        let response = authorize(&provider, Some(id), &authorize_query("email", &[])).await;
        assert!(response.status().is_redirection());

        let location = location(&response);
        assert!(location.as_str().starts_with(REDIRECT));
        let pairs: Vec<_> = location.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("error".to_string(), "invalid_scope".to_string())));
        assert!(pairs.contains(&("state".to_string(), "xyz".to_string())));
    }

    #[tokio::test]
    async fn test_anonymous_browser_is_sent_to_login() {
        let provider = provider();
        let uri = authorize_query("openid", &[]);

        let response = authorize(&provider, None, &uri).await;
        assert!(response.status().is_redirection());

        let location = location(&response);
        assert_eq!(location.path(), "/account/login");
        let (_, return_url) = location.query_pairs().next().unwrap();
        assert_eq!(return_url, uri);
    }

    #[tokio::test]
    async fn test_code_flow_issues_tokens_once() {
        let provider = provider();
        let (store, id) = store_with_alice().await;

        let uri = authorize_query("openid profile", &[]);
        let response = authorize(&provider, Some(id), &uri).await;
        let pairs: Vec<_> = location(&response).query_pairs().into_owned().collect();
        assert!(pairs.contains(&("state".to_string(), "xyz".to_string())));
        let code = issued_code(&response).unwrap();

        let response = redeem(&provider, &store, &code, None).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");

        let body = json(response).await;
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["scope"], "openid profile");
        assert!(body.get("refresh_token").is_none());

        let id_token = id_token_payload(body["id_token"].as_str().unwrap());
        assert_eq!(id_token["nonce"], "n-1");
        assert_eq!(id_token["aud"], "keycloak-client");
        assert_eq!(id_token["sub"], id.to_string());
        assert!(id_token.get("at_hash").is_some());

        let replay = redeem(&provider, &store, &code, None).await.unwrap();
        assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
        assert!(json(replay).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_pkce_is_enforced() {
        let provider = provider();
        let (store, id) = store_with_alice().await;
        let verifier = "a-verifier-with-plenty-of-entropy-0123456789";
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier));
        let uri = authorize_query(
            "openid",
            &[
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        );

        let code = code_for(&provider, id, &uri).await;
        let wrong = redeem(&provider, &store, &code, Some("nope")).await.unwrap();
        assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);

        let code = code_for(&provider, id, &uri).await;
        let missing = redeem(&provider, &store, &code, None).await.unwrap();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let code = code_for(&provider, id, &uri).await;
        let ok = redeem(&provider, &store, &code, Some(verifier)).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_narrowed_refresh_can_be_widened_again() {
        let provider = provider();
        let (store, id) = store_with_alice().await;

        let code = code_for(&provider, id, &authorize_query("openid email offline_access", &[])).await;
        let first = json(redeem(&provider, &store, &code, None).await.unwrap()).await;
        let refresh_token = first["refresh_token"].as_str().unwrap();

        let info = json(
            userinfo(&provider, &store, first["access_token"].as_str())
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(info["email"], "a@x.com");
        assert!(info.get("given_name").is_none());

        let narrowed = json(refresh(&provider, &store, refresh_token, Some("openid")).await).await;
        assert_eq!(narrowed["scope"], "openid");
        let rotated = narrowed["refresh_token"].as_str().unwrap();

        let restored = json(refresh(&provider, &store, rotated, None).await).await;
        assert_eq!(restored["scope"], "email offline_access openid");

        let widened = refresh(&provider, &store, rotated, Some("openid profile")).await;
        assert_eq!(widened.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(widened).await["error"], "invalid_scope");
    }

    #[tokio::test]
    async fn test_deactivated_account_loses_access() {
        let provider = provider();
        let (store, id) = store_with_alice().await;

        let code = code_for(&provider, id, &authorize_query("openid", &[])).await;
        let tokens = json(redeem(&provider, &store, &code, None).await.unwrap()).await;

        store.set_active(id, false).await.unwrap();
        assert!(matches!(
            userinfo(&provider, &store, tokens["access_token"].as_str()).await,
            Err(OidcError::InvalidToken(_))
        ));

        let code = code_for(&provider, id, &authorize_query("openid", &[])).await;
        assert!(matches!(
            redeem(&provider, &store, &code, None).await,
            Err(OidcError::InvalidGrant(_))
        ));
    }

    #[tokio::test]
    async fn test_userinfo_without_bearer_is_challenged() {
        let provider = provider();
        let (store, _) = store_with_alice().await;

        let response = userinfo(&provider, &store, None).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[test]
    fn test_logout_location() {
        let provider = provider();
        assert_eq!(
            provider.logout_location(Some("http://localhost:8080/"), Some("s1")),
            "http://localhost:8080/?state=s1"
        );
        assert_eq!(provider.logout_location(Some("http://evil.test/"), None), "/");
        assert_eq!(provider.logout_location(None, None), "/");
    }
}
