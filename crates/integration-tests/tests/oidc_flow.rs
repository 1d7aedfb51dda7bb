//! Integration tests for the OpenID Connect provider.
//!
//! These tests play the identity broker: they need the server's client id,
//! client secret and first redirect URI in the environment.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use foodi_integration_tests::{base_url, client, signed_in};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use sha2::{Digest, Sha256};
use url::Url;

struct Rp {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl Rp {
    fn from_env() -> Self {
        let redirect_uris = std::env::var("OIDC_REDIRECT_URIS").expect("OIDC_REDIRECT_URIS not set");
        Self {
            client_id: std::env::var("OIDC_CLIENT_ID")
                .unwrap_or_else(|_| "keycloak-client".to_string()),
            client_secret: std::env::var("OIDC_CLIENT_SECRET").expect("OIDC_CLIENT_SECRET not set"),
            redirect_uri: redirect_uris
                .split(',')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string(),
        }
    }

    fn authorize_url(&self, scope: &str, challenge: &str) -> Url {
        let mut url = Url::parse(&format!("{}/connect/authorize", base_url())).unwrap();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", scope)
            .append_pair("state", "st-1")
            .append_pair("nonce", "n-1")
            .append_pair("code_challenge", challenge)
            .append_pair("code_challenge_method", "S256");
        url
    }

    async fn token(&self, client: &Client, form: &[(&str, &str)]) -> reqwest::Response {
        client
            .post(format!("{}/connect/token", base_url()))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await
            .expect("Failed to call token endpoint")
    }
}

fn challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Run the authorize step for a signed-in client and return the code.
async fn authorize(client: &Client, rp: &Rp, scope: &str, verifier: &str) -> String {
    let resp = client
        .get(rp.authorize_url(scope, &challenge(verifier)))
        .send()
        .await
        .expect("Failed to authorize");
    assert!(resp.status().is_redirection());

    let location = Url::parse(resp.headers()["location"].to_str().unwrap()).unwrap();
    assert!(location.as_str().starts_with(&rp.redirect_uri));
    let param = |name: &str| {
        location
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };
    assert_eq!(param("state").as_deref(), Some("st-1"));
    param("code").expect("redirect carries a code")
}

#[tokio::test]
#[ignore = "Requires running web server, database and OIDC client settings"]
async fn test_code_flow_with_pkce() {
    let rp = Rp::from_env();
    let (browser, account) = signed_in().await;
    let verifier = "a-long-enough-code-verifier-for-the-integration-test";
    let code = authorize(&browser, &rp, "openid email profile offline_access", verifier).await;

    let backchannel = client();
    let redirect_uri = rp.redirect_uri.clone();
    let resp = rp
        .token(
            &backchannel,
            &[
                ("grant_type", "authorization_code"),
                ("code", &code),
                ("redirect_uri", &redirect_uri),
                ("code_verifier", verifier),
            ],
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["cache-control"], "no-store");

    let tokens: Value = resp.json().await.expect("Failed to read tokens");
    assert_eq!(tokens["token_type"], "Bearer");
    assert!(tokens["id_token"].is_string());
    let refresh = tokens["refresh_token"].as_str().expect("offline_access grants a refresh token");

    // The code is single use
    let resp = rp
        .token(
            &backchannel,
            &[
                ("grant_type", "authorization_code"),
                ("code", &code),
                ("redirect_uri", &redirect_uri),
                ("code_verifier", verifier),
            ],
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let info: Value = backchannel
        .get(format!("{}/connect/userinfo", base_url()))
        .bearer_auth(tokens["access_token"].as_str().unwrap_or_default())
        .send()
        .await
        .expect("Failed to call userinfo")
        .json()
        .await
        .expect("Failed to read userinfo");
    assert_eq!(info["email"], account.email.as_str());
    assert_eq!(info["preferred_username"], account.handle.as_str());

    // Refresh may narrow the scopes, never widen them
    let resp = rp
        .token(
            &backchannel,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh),
                ("scope", "openid email"),
            ],
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let narrowed: Value = resp.json().await.expect("Failed to read tokens");
    assert_eq!(narrowed["scope"], "email openid");

    let resp = rp
        .token(
            &backchannel,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", narrowed["refresh_token"].as_str().unwrap_or_default()),
                ("scope", "openid email profile"),
            ],
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running web server, database and OIDC client settings"]
async fn test_wrong_verifier_is_rejected() {
    let rp = Rp::from_env();
    let (browser, _) = signed_in().await;
    let code = authorize(&browser, &rp, "openid", "verifier-one-verifier-one-verifier-one").await;

    let redirect_uri = rp.redirect_uri.clone();
    let resp = rp
        .token(
            &client(),
            &[
                ("grant_type", "authorization_code"),
                ("code", &code),
                ("redirect_uri", &redirect_uri),
                ("code_verifier", "verifier-two-verifier-two-verifier-two"),
            ],
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("Failed to read error");
    assert!(body["error"].is_string());
}

#[tokio::test]
#[ignore = "Requires running web server, database and OIDC client settings"]
async fn test_anonymous_authorize_lands_on_login_page() {
    let rp = Rp::from_env();
    let browser = client();

    let resp = browser
        .get(rp.authorize_url("openid", &challenge("whatever-verifier-value-123456789")))
        .send()
        .await
        .expect("Failed to authorize");
    assert!(resp.status().is_redirection());

    let location = Url::parse(resp.headers()["location"].to_str().unwrap()).unwrap();
    assert_eq!(location.path(), "/account/login");
    assert!(location.query_pairs().any(|(k, _)| k == "return_url"));

    let page = browser
        .get(location)
        .send()
        .await
        .expect("Failed to load login page")
        .text()
        .await
        .expect("Failed to read login page");
    assert!(page.contains("/connect/authorize?"));
}
