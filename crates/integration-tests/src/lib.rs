//! Integration tests for Foodi.
//!
//! The tests drive a running web server over HTTP and are ignored by default.
//!
//! # Running Tests
//!
//! ```bash
//! cargo run -p foodi-cli -- migrate
//! cargo run -p foodi-cli -- seed menu
//! cargo run -p foodi-web &
//! cargo test -p foodi-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `FOODI_TEST_BASE_URL` - server under test (default `http://localhost:5000`)
//! - `OIDC_CLIENT_ID`, `OIDC_CLIENT_SECRET`, `OIDC_REDIRECT_URIS` - the same
//!   values the server was started with, for the provider flow tests

use reqwest::{Client, StatusCode, redirect};
use serde_json::{Value, json};
use uuid::Uuid;

/// Password used for every account the tests register.
pub const PASSWORD: &str = "correct-horse-42";

/// Base URL of the server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("FOODI_TEST_BASE_URL").unwrap_or_else(|_| "http://localhost:5000".to_string())
}

/// HTTP client with a cookie jar that does not follow redirects, so tests
/// can inspect `Location` headers.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// A freshly registered account.
#[derive(Debug, Clone)]
pub struct TestAccount {
    pub handle: String,
    pub email: String,
}

impl TestAccount {
    /// Unique handle and email for one test run.
    #[must_use]
    pub fn unique() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        let suffix = suffix.get(..12).unwrap_or(&suffix).to_owned();
        Self {
            handle: format!("it-{suffix}"),
            email: format!("it-{suffix}@example.com"),
        }
    }
}

/// Register a new account and return it with the response body.
///
/// # Panics
///
/// Panics if the request fails or registration is rejected.
pub async fn register(client: &Client) -> (TestAccount, Value) {
    let account = TestAccount::unique();
    let resp = client
        .post(format!("{}/account/register", base_url()))
        .json(&json!({
            "handle": account.handle,
            "email": account.email,
            "first_name": "Integration",
            "last_name": "Tester",
            "password": PASSWORD,
            "confirm_password": PASSWORD,
        }))
        .send()
        .await
        .expect("Failed to register");

    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = resp.json().await.expect("Failed to read registration body");
    (account, body)
}

/// Sign in with a JSON body, leaving the session cookie in the client's jar.
///
/// # Panics
///
/// Panics if the request fails.
pub async fn login(client: &Client, login: &str, password: &str) -> StatusCode {
    client
        .post(format!("{}/account/login", base_url()))
        .json(&json!({ "login": login, "password": password }))
        .send()
        .await
        .expect("Failed to log in")
        .status()
}

/// Register a new account and sign in as it.
///
/// # Panics
///
/// Panics if registration or login fails.
pub async fn signed_in() -> (Client, TestAccount) {
    let client = client();
    let (account, _) = register(&client).await;
    assert_eq!(login(&client, &account.handle, PASSWORD).await, StatusCode::OK);
    (client, account)
}
